//! Single parameter line decoding.

/// One decoded `name[*idx][*]=value` parameter line.
///
/// Decoding never fails. A line without `=` yields an item with a name
/// and no value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterItem {
    /// Lower-cased parameter name without any `*` markers.
    pub name: String,
    /// Continuation index, `0` when absent or unparsable.
    pub index: u32,
    /// `false` when the name carried a `*N` continuation marker.
    pub single_line: bool,
    /// `true` when the name ended in `*` (extended value syntax).
    pub extended: bool,
    /// Charset from a `charset'language'value` triple.
    pub charset: Option<String>,
    /// Language from a `charset'language'value` triple.
    pub language: Option<String>,
    /// Value with quotes and a trailing `;` removed. Percent escapes are
    /// left as they are.
    pub value: Option<String>,
}

impl ParameterItem {
    /// Decodes one raw parameter line.
    ///
    /// The line is split at the first `=`; the left side is the name
    /// segment and the right side the value segment.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let (name_segment, value_segment) = match line.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (line, None),
        };

        let mut item = Self::from_name_segment(name_segment);
        if let Some(raw) = value_segment {
            item.read_value(raw);
        }
        item
    }

    /// Reads `name`, `name*`, `name*N` or `name*N*`.
    fn from_name_segment(segment: &str) -> Self {
        let lowered = segment.trim().to_lowercase();

        let (rest, extended) = match lowered.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (lowered.as_str(), false),
        };

        let (name, index, single_line) = match rest.split_once('*') {
            Some((name, marker)) => {
                let digits: String = marker.chars().filter(|&c| c != '*').collect();
                (name.trim(), digits.trim().parse().unwrap_or(0), false)
            }
            None => (rest.trim(), 0, true),
        };

        Self {
            name: name.to_string(),
            index,
            single_line,
            extended,
            ..Self::default()
        }
    }

    fn read_value(&mut self, raw: &str) {
        let unquoted: String = raw.chars().filter(|&c| c != '"').collect();
        let unquoted = unquoted.trim_matches(['\r', '\n']);
        if unquoted.trim().is_empty() {
            return;
        }

        let mut value = unquoted.trim();
        if value.len() > 1 {
            value = value.strip_suffix(';').unwrap_or(value);
        }

        if self.extended && value.contains('\'') {
            let mut segments = value.split('\'');
            if let (Some(charset), Some(language), Some(text)) =
                (segments.next(), segments.next(), segments.next())
            {
                self.charset = non_empty(charset);
                self.language = non_empty(language);
                self.value = Some(text.to_string());
                return;
            }
        }

        self.value = Some(value.trim().to_string());
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
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
    fn test_simple_line() {
        let item = ParameterItem::parse("URL=\"ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"");
        assert_eq!(item.name, "url");
        assert_eq!(item.index, 0);
        assert!(item.single_line);
        assert!(!item.extended);
        assert!(item.charset.is_none());
        assert!(item.language.is_none());
        assert_eq!(
            item.value.as_deref(),
            Some("ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar")
        );
    }

    #[test]
    fn test_simple_line_without_quotes() {
        let item = ParameterItem::parse("URL=ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar");
        assert_eq!(item.name, "url");
        assert!(item.single_line);
        assert!(item.charset.is_none());
        assert_eq!(
            item.value.as_deref(),
            Some("ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar")
        );
    }

    #[test]
    fn test_simple_line_with_language() {
        let item = ParameterItem::parse("title*=us-ascii'en-us'This%20is%20%2A%2A%2Afun%2A%2A%2A");
        assert_eq!(item.name, "title");
        assert_eq!(item.index, 0);
        assert!(item.single_line);
        assert!(item.extended);
        assert_eq!(item.charset.as_deref(), Some("us-ascii"));
        assert_eq!(item.language.as_deref(), Some("en-us"));
        assert_eq!(item.value.as_deref(), Some("This%20is%20%2A%2A%2Afun%2A%2A%2A"));
    }

    #[test]
    fn test_continuation_lines() {
        let first = ParameterItem::parse("URL*0=\"ftp://\";");
        assert_eq!(first.name, "url");
        assert_eq!(first.index, 0);
        assert!(!first.single_line);
        assert!(!first.extended);
        assert_eq!(first.value.as_deref(), Some("ftp://"));

        let second = ParameterItem::parse("URL*1=\"cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"");
        assert_eq!(second.name, "url");
        assert_eq!(second.index, 1);
        assert!(!second.single_line);
        assert_eq!(
            second.value.as_deref(),
            Some("cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar")
        );
    }

    #[test]
    fn test_continuation_with_charset_and_language() {
        let first = ParameterItem::parse("title*1*=us-ascii'en'This%20is%20even%20more%20");
        assert_eq!(first.name, "title");
        assert_eq!(first.index, 1);
        assert!(!first.single_line);
        assert!(first.extended);
        assert_eq!(first.charset.as_deref(), Some("us-ascii"));
        assert_eq!(first.language.as_deref(), Some("en"));
        assert_eq!(first.value.as_deref(), Some("This%20is%20even%20more%20"));

        let second = ParameterItem::parse("title*2*=%2A%2A%2Afun%2A%2A%2A%20");
        assert_eq!(second.index, 2);
        assert!(second.extended);
        assert!(second.charset.is_none());
        assert!(second.language.is_none());
        assert_eq!(second.value.as_deref(), Some("%2A%2A%2Afun%2A%2A%2A%20"));

        let third = ParameterItem::parse("title*3=\"isn't it!\"");
        assert_eq!(third.index, 3);
        assert!(!third.extended);
        assert!(third.charset.is_none());
        assert_eq!(third.value.as_deref(), Some("isn't it!"));
    }

    #[test]
    fn test_extended_value_with_single_apostrophe_keeps_whole_value() {
        let item = ParameterItem::parse("title*=it's");
        assert!(item.charset.is_none());
        assert!(item.language.is_none());
        assert_eq!(item.value.as_deref(), Some("it's"));
    }

    #[test]
    fn test_extended_value_drops_segments_past_the_triple() {
        let item = ParameterItem::parse("title*=utf-8'en'first'second");
        assert_eq!(item.charset.as_deref(), Some("utf-8"));
        assert_eq!(item.value.as_deref(), Some("first"));
    }

    #[test]
    fn test_extended_value_with_empty_charset() {
        let item = ParameterItem::parse("filename*=''report.pdf");
        assert!(item.charset.is_none());
        assert!(item.language.is_none());
        assert_eq!(item.value.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_value_trailing_line_break_and_semicolon() {
        let item = ParameterItem::parse("charset=utf-8;\r\n");
        assert_eq!(item.value.as_deref(), Some("utf-8"));
        let lone = ParameterItem::parse("x=;");
        assert_eq!(lone.value.as_deref(), Some(";"));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let item = ParameterItem::parse("name=\"\"");
        assert_eq!(item.name, "name");
        assert!(item.value.is_none());
        assert!(ParameterItem::parse("name=   ").value.is_none());
    }

    #[test]
    fn test_missing_equals_keeps_name() {
        let item = ParameterItem::parse("  Inline ");
        assert_eq!(item.name, "inline");
        assert!(item.single_line);
        assert!(item.value.is_none());
    }

    #[test]
    fn test_unparsable_index_defaults_to_zero() {
        let item = ParameterItem::parse("name*x=abc");
        assert_eq!(item.name, "name");
        assert_eq!(item.index, 0);
        assert!(!item.single_line);
    }

    #[test]
    fn test_value_splits_on_first_equals_only() {
        let item = ParameterItem::parse("boundary=\"----=_Part_123\"");
        assert_eq!(item.name, "boundary");
        assert_eq!(item.value.as_deref(), Some("----=_Part_123"));
    }
}
