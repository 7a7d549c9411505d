//! MIME content type and content disposition handling.

use crate::header::split_parameters;
use crate::rfc2184::{ContentParameterParser, Parameters};
use std::fmt;

/// Top-level media types this crate knows how to classify.
const KNOWN_MAIN_TYPES: &[&str] = &[
    "text",
    "image",
    "audio",
    "video",
    "application",
    "multipart",
    "message",
    "font",
    "model",
];

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg"), defaulted when the
    /// header omits it.
    pub sub_type: String,
    /// Media token exactly as declared, lower-cased (e.g., "text" when
    /// the subtype was missing).
    pub mime_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: Parameters,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        let main_type = main_type.into().to_lowercase();
        let sub_type = sub_type.into().to_lowercase();
        Self {
            mime_type: format!("{main_type}/{sub_type}"),
            main_type,
            sub_type,
            parameters: Parameters::new(),
        }
    }

    /// Creates the implicit `text/plain` type of a part without header.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Creates the implicit `message/rfc822` type of a digest entry.
    #[must_use]
    pub fn message_rfc822() -> Self {
        Self::new("message", "rfc822")
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset")
    }

    /// Returns the boundary parameter if present and non-empty.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").filter(|b| !b.is_empty())
    }

    /// Returns the decoded `name` parameter.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.parameters
            .decoded("name")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type == "multipart"
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type == "text"
    }

    /// Checks `type/subtype` equality.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type) && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Checks whether the main type is a registered top-level type.
    #[must_use]
    pub fn is_recognized(&self) -> bool {
        KNOWN_MAIN_TYPES.contains(&self.main_type.as_str())
    }

    /// Parses a content type header value.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`. Never fails: a
    /// missing subtype is defaulted from the main type (`text` becomes
    /// `text/plain`), and an empty value becomes `text/plain`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (media, lines) = split_parameters(s);
        let parameters = ContentParameterParser::from_lines(lines).parse();

        let media = strip_comments(&media).trim().trim_matches('"').trim().to_lowercase();
        let (main_type, sub_type) = match media.split_once('/') {
            Some((main, sub)) => (main.trim(), sub.trim()),
            None => (media.as_str(), ""),
        };
        let (main_type, sub_type) = default_subtype(main_type, sub_type);

        Self {
            mime_type: if media.is_empty() {
                format!("{main_type}/{sub_type}")
            } else {
                media.clone()
            },
            main_type,
            sub_type,
            parameters,
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::text_plain()
    }
}

fn default_subtype(main: &str, sub: &str) -> (String, String) {
    let (main, sub) = match (main, sub) {
        ("" | "text" | "plain", "") | ("", "plain") => ("text", "plain"),
        ("html", "") | ("", "html") => ("text", "html"),
        ("multipart", "") => ("multipart", "mixed"),
        ("message", "") => ("message", "rfc822"),
        ("image" | "audio" | "video" | "application" | "font" | "model", "") => (main, "octet-stream"),
        _ => (main, sub),
    };
    (main.to_string(), sub.to_string())
}

/// Removes RFC 5322 parenthesised comments.
pub(crate) fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    let mut escaped = false;
    let mut in_quotes = false;

    for ch in s.chars() {
        if escaped {
            escaped = false;
            if depth == 0 {
                out.push(ch);
            }
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                if depth == 0 {
                    out.push(ch);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes && depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;
        write_parameters(f, &self.parameters)
    }
}

fn write_parameters(f: &mut fmt::Formatter<'_>, parameters: &Parameters) -> fmt::Result {
    for (key, value) in parameters.iter() {
        let Some(value) = value else {
            write!(f, "; {key}")?;
            continue;
        };
        // Quote value if it contains special characters
        if value.is_empty() || value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
            write!(f, "; {key}=\"{value}\"")?;
        } else {
            write!(f, "; {key}={value}")?;
        }
    }
    Ok(())
}

/// Disposition type of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DispositionKind {
    /// Displayed as part of the message.
    Inline,
    /// Offered as a separate file.
    Attachment,
    /// Any other token, lower-cased.
    Other(String),
}

impl DispositionKind {
    fn parse(token: &str) -> Self {
        match token.trim().trim_matches('"').to_lowercase().as_str() {
            "inline" => Self::Inline,
            "attachment" => Self::Attachment,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DispositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::Attachment => write!(f, "attachment"),
            Self::Other(token) => write!(f, "{token}"),
        }
    }
}

/// Parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ContentDisposition {
    /// Disposition type.
    pub kind: DispositionKind,
    /// Parameters (e.g., filename, size).
    pub parameters: Parameters,
}

impl ContentDisposition {
    /// Parses a content disposition header value. Never fails.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (token, lines) = split_parameters(s);
        Self {
            kind: DispositionKind::parse(&token),
            parameters: ContentParameterParser::from_lines(lines).parse(),
        }
    }

    /// Checks for `inline`.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.kind == DispositionKind::Inline
    }

    /// Checks for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == DispositionKind::Attachment
    }

    /// Returns the decoded `filename` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameters
            .decoded("filename")
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        write_parameters(f, &self.parameters)
    }
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
    fn test_content_type_new() {
        let ct = ContentType::new("Text", "Plain");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.mime_type, "text/plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("text/plain; charset=utf-8");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.mime_type, "text/plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert!(ct.is_text());
    }

    #[test]
    fn test_content_type_parse_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part_123\"");
        assert!(ct.is_multipart());
        assert_eq!(ct.sub_type, "mixed");
        assert_eq!(ct.boundary(), Some("----=_Part_123"));
    }

    #[test]
    fn test_content_type_missing_subtype() {
        let ct = ContentType::parse("text; charset=\"iso-8859-1\"");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.mime_type, "text");
        assert_eq!(ct.charset(), Some("iso-8859-1"));
    }

    #[test]
    fn test_content_type_missing_main_type() {
        let ct = ContentType::parse("html");
        assert!(ct.is("text", "html"));
        let ct = ContentType::parse("/plain");
        assert!(ct.is("text", "plain"));
    }

    #[test]
    fn test_content_type_empty() {
        let ct = ContentType::parse("");
        assert!(ct.is("text", "plain"));
        assert_eq!(ct.mime_type, "text/plain");
    }

    #[test]
    fn test_content_type_unrecognized() {
        let ct = ContentType::parse("bogus");
        assert_eq!(ct.main_type, "bogus");
        assert_eq!(ct.sub_type, "");
        assert!(!ct.is_recognized());
        assert!(ContentType::parse("image").is("image", "octet-stream"));
    }

    #[test]
    fn test_content_type_with_comment() {
        let ct = ContentType::parse("text/html (generated); charset=utf-8");
        assert!(ct.is("text", "html"));
        assert_eq!(ct.charset(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_continued_name() {
        let ct = ContentType::parse(
            "application/pdf; name*0=\"annual-\"; name*1=\"report.pdf\"",
        );
        assert_eq!(ct.name().as_deref(), Some("annual-report.pdf"));
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::parse("Text/Plain; charset=utf-8");
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");

        let ct = ContentType::parse("multipart/mixed; boundary=\"a b\"");
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"a b\"");
    }

    #[test]
    fn test_disposition_parse() {
        let cd = ContentDisposition::parse("attachment; filename=\"report.pdf\"; size=1024");
        assert!(cd.is_attachment());
        assert_eq!(cd.filename().as_deref(), Some("report.pdf"));
        assert_eq!(cd.parameters.get("size"), Some("1024"));
    }

    #[test]
    fn test_disposition_extended_filename() {
        let cd = ContentDisposition::parse(
            "attachment; filename*=iso-8859-1'fr'r%E9sum%E9.txt",
        );
        assert_eq!(cd.filename().as_deref(), Some("résumé.txt"));
    }

    #[test]
    fn test_disposition_inline_and_other() {
        assert!(ContentDisposition::parse("INLINE").is_inline());
        let cd = ContentDisposition::parse("form-data; name=field");
        assert_eq!(cd.kind, DispositionKind::Other("form-data".to_string()));
        assert!(cd.filename().is_none());
        assert_eq!(cd.to_string(), "form-data; name=field");
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("a (b (c)) d"), "a  d");
        assert_eq!(strip_comments("\"(kept)\" x"), "\"(kept)\" x");
        assert_eq!(strip_comments("(noise\\)still)after"), "after");
    }
}
