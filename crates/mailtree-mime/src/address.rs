//! Email address parsing.
//!
//! Header values in the wild rarely follow RFC 5322 to the letter, so the
//! parsers here look for something usable rather than validate.

use crate::content_type::strip_comments;
use crate::encoding::decode_rfc2047;
use std::fmt;

/// Mailbox: display name plus address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Address {
    /// Display name, RFC 2047 decoded. Empty when absent.
    pub name: String,
    /// Address in `local@domain` form.
    pub email: String,
}

impl Address {
    /// Creates an address.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Returns the display name if one is set.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        (!self.name.is_empty()).then_some(self.name.as_str())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}>", self.email)
        } else {
            write!(f, "\"{}\" <{}>", self.name.replace('"', "\\\""), self.email)
        }
    }
}

/// Parses a header value holding one mailbox.
///
/// The address is the last `<...>` section outside quotes, or failing
/// that the first bare token containing `@`. Everything else, with stray
/// quotes removed, is the display name. Returns `None` when no token
/// contains `@`.
///
/// ```
/// use mailtree_mime::parse_address;
///
/// let address = parse_address("\"Display Name <with Chevrons>\" <Chevrons@displayname.de>").unwrap();
/// assert_eq!(address.name, "Display Name <with Chevrons>");
/// assert_eq!(address.email, "Chevrons@displayname.de");
/// ```
#[must_use]
pub fn parse_address(input: &str) -> Option<Address> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let angle = find_angle_address(input, true).or_else(|| find_angle_address(input, false));
    if let Some((start, end)) = angle {
        let email = clean_email(&input[start + 1..end]);
        if email.contains('@') {
            let mut name = String::with_capacity(input.len());
            name.push_str(&input[..start]);
            name.push(' ');
            name.push_str(&input[end + 1..]);
            return Some(Address::new(clean_name(&name), email));
        }
    }

    let token = input
        .split_whitespace()
        .find(|token| token.contains('@'))?;
    let email = clean_email(token);
    if !email.contains('@') || email.starts_with('@') {
        tracing::trace!(input, "No usable address in header value");
        return None;
    }

    let name = input.replacen(token, " ", 1);
    Some(Address::new(clean_name(&name), email))
}

/// Parses a comma-separated address list.
///
/// Commas inside quotes, angle brackets or comments do not split. Group
/// syntax (`team: a@x, b@y;`) is flattened. Entries without a usable
/// address are dropped.
#[must_use]
pub fn parse_address_list(input: &str) -> Vec<Address> {
    split_address_list(input)
        .iter()
        .filter_map(|entry| parse_address(entry))
        .collect()
}

/// Splits an address list into mailbox strings.
fn split_address_list(input: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = 0usize;
    let mut comment = 0usize;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                current.push(ch);
            }
            '"' if comment == 0 => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '(' if !in_quotes => {
                comment += 1;
                current.push(ch);
            }
            ')' if !in_quotes && comment > 0 => {
                comment -= 1;
                current.push(ch);
            }
            '<' if !in_quotes && comment == 0 => {
                angle += 1;
                current.push(ch);
            }
            '>' if !in_quotes && comment == 0 && angle > 0 => {
                angle -= 1;
                current.push(ch);
            }
            ',' | ';' if !in_quotes && comment == 0 && angle == 0 => {
                entries.push(std::mem::take(&mut current));
            }
            // Group display name ends at the colon
            ':' if !in_quotes && comment == 0 && angle == 0 && !current.contains('@') => {
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    entries.push(current);

    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Locates the last `<...>` pair, skipping quoted text when asked to.
fn find_angle_address(input: &str, respect_quotes: bool) -> Option<(usize, usize)> {
    let mut in_quotes = false;
    let mut escaped = false;
    let mut open = None;
    let mut found = None;

    for (i, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' if respect_quotes => in_quotes = !in_quotes,
            '<' if !in_quotes => open = Some(i),
            '>' if !in_quotes => {
                if let Some(start) = open.take() {
                    found = Some((start, i));
                }
            }
            _ => {}
        }
    }

    found
}

fn clean_email(raw: &str) -> String {
    let stripped = strip_comments(raw);
    stripped
        .trim()
        .trim_matches(|c: char| {
            matches!(c, '"' | '\'' | '<' | '>' | ',' | ';') || c.is_whitespace()
        })
        .replace('"', "")
        .trim()
        .to_string()
}

fn clean_name(raw: &str) -> String {
    let raw = raw.trim();
    // `addr@example.com (Real Name)`
    let raw = raw
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .map_or(raw, str::trim);

    let simple_quoted = raw.len() >= 2
        && raw.starts_with('"')
        && raw.ends_with('"')
        && !raw[1..raw.len() - 1].contains('"');

    let unquoted = if simple_quoted {
        raw[1..raw.len() - 1].to_string()
    } else if let Some(inner) = quoted_section(raw) {
        inner
    } else {
        raw.replace('"', "")
    };

    let unescaped = unquoted.replace("\\\"", "\"").replace("\\\\", "\\");
    let decoded = decode_rfc2047(unescaped.trim());
    decoded
        .trim()
        .trim_matches(|c: char| c == '\'' || c.is_whitespace())
        .to_string()
}

/// Returns the text of a properly terminated quoted section, when the
/// whole name is one quoted string possibly surrounded by whitespace.
fn quoted_section(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?;
    let mut out = String::new();
    let mut escaped = false;
    for (i, ch) in inner.char_indices() {
        if escaped {
            out.push('\\');
            out.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => return inner[i + 1..].trim().is_empty().then_some(out),
            _ => out.push(ch),
        }
    }
    None
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_address() {
        let address = parse_address("here@there.com").unwrap();
        assert_eq!(address.email, "here@there.com");
        assert_eq!(address.name, "");
    }

    #[test]
    fn test_quoted_address() {
        let address = parse_address("<\"here@there.com\">").unwrap();
        assert_eq!(address.email, "here@there.com");
        assert_eq!(address.name, "");
    }

    #[test]
    fn test_quoted_display_name() {
        let address = parse_address("\"Display Name\" <display@name.de>").unwrap();
        assert_eq!(address.email, "display@name.de");
        assert_eq!(address.name, "Display Name");
    }

    #[test]
    fn test_non_quoted_display_name() {
        let address = parse_address("DisplayName <display@name.de>").unwrap();
        assert_eq!(address.email, "display@name.de");
        assert_eq!(address.name, "DisplayName");
    }

    #[test]
    fn test_chevrons_in_display_name() {
        let address =
            parse_address("\"Display Name <with Chevrons>\" <Chevrons@displayname.de>").unwrap();
        assert_eq!(address.email, "Chevrons@displayname.de");
        assert_eq!(address.name, "Display Name <with Chevrons>");
    }

    #[test]
    fn test_no_closing_quote_after_display_name() {
        let address =
            parse_address("\"Display Name only one quote <Chevrons@displayname.de>").unwrap();
        assert_eq!(address.email, "Chevrons@displayname.de");
        assert_eq!(address.name, "Display Name only one quote");
    }

    #[test]
    fn test_invalid_empty_quote() {
        let address = parse_address("\"\" Invoice@dymak.nl\"").unwrap();
        assert_eq!(address.email, "Invoice@dymak.nl");
        assert_eq!(address.name, "");
    }

    #[test]
    fn test_encoded_display_name() {
        let address = parse_address("=?utf-8?Q?Andr=C3=A9?= <andre@example.com>").unwrap();
        assert_eq!(address.name, "André");
        assert_eq!(address.email, "andre@example.com");
    }

    #[test]
    fn test_escaped_quote_in_display_name() {
        let address = parse_address(r#""Joe \"JJ\" Smith" <joe@example.com>"#).unwrap();
        assert_eq!(address.name, "Joe \"JJ\" Smith");
    }

    #[test]
    fn test_trailing_comment_name() {
        let address = parse_address("joe@example.com (Joe Smith)").unwrap();
        assert_eq!(address.email, "joe@example.com");
        assert_eq!(address.name, "Joe Smith");
    }

    #[test]
    fn test_no_address() {
        assert!(parse_address("").is_none());
        assert!(parse_address("Bob").is_none());
        assert!(parse_address("<>").is_none());
        assert!(parse_address("Name <not-an-address>").is_none());
        assert!(parse_address("@").is_none());
    }

    #[test]
    fn test_address_list() {
        let list = parse_address_list(
            "\"Doe, John\" <john@example.com>, jane@example.com; Bob <bob@example.com>",
        );
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].name, "Doe, John");
        assert_eq!(list[0].email, "john@example.com");
        assert_eq!(list[1].email, "jane@example.com");
        assert_eq!(list[2].name, "Bob");
    }

    #[test]
    fn test_address_list_group_syntax() {
        let list = parse_address_list("Team: a@example.com, b@example.com;, c@example.com");
        let emails: Vec<&str> = list.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[test]
    fn test_address_list_drops_unusable_entries() {
        assert!(parse_address_list("undisclosed-recipients:;").is_empty());
        assert!(parse_address_list("").is_empty());
        let list = parse_address_list("nobody, someone@example.com");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_address_display() {
        assert_eq!(Address::new("", "a@b.c").to_string(), "<a@b.c>");
        assert_eq!(Address::new("A B", "a@b.c").to_string(), "\"A B\" <a@b.c>");
        assert_eq!(Address::new("A B", "a@b.c").display_name(), Some("A B"));
    }
}
