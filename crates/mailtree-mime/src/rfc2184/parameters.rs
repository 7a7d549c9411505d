//! Parameter reassembly for one structured header.

use super::item::ParameterItem;
use crate::config::DEFAULT_FALLBACK_CHARSET;
use crate::encoding::{decode_charset, decode_percent, decode_rfc2047};

/// One piece of a parameter value, as found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fragment {
    text: String,
    extended: bool,
}

/// A reassembled parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: Option<String>,
    charset: Option<String>,
    language: Option<String>,
    fragments: Vec<Fragment>,
}

impl Parameter {
    fn from_single(item: ParameterItem) -> Self {
        let fragments = item
            .value
            .iter()
            .map(|text| Fragment {
                text: text.clone(),
                extended: item.extended,
            })
            .collect();
        Self {
            fragments,
            name: item.name,
            value: item.value,
            charset: item.charset,
            language: item.language,
        }
    }

    /// Builds a parameter from continuation items already in index order.
    fn from_continuation(name: String, items: Vec<ParameterItem>) -> Self {
        let mut parameter = Self {
            name,
            value: None,
            charset: None,
            language: None,
            fragments: Vec::with_capacity(items.len()),
        };

        for item in items {
            if parameter.charset.is_none() {
                parameter.charset = item.charset;
                parameter.language = item.language;
            }
            if let Some(text) = item.value {
                parameter
                    .value
                    .get_or_insert_with(String::new)
                    .push_str(&text);
                parameter.fragments.push(Fragment {
                    text,
                    extended: item.extended,
                });
            }
        }

        parameter
    }

    /// Lower-cased parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concatenated value, percent escapes untouched. `None` when no
    /// fragment carried a value.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Declared charset of an extended value.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Declared language of an extended value.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Checks whether any fragment used the extended `name*=` syntax.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.fragments.iter().any(|f| f.extended)
    }

    /// Fully decoded value.
    ///
    /// Extended fragments are percent-decoded, the octets transcoded with
    /// the declared charset (or `fallback`), and any RFC 2047 encoded
    /// words that non-conforming mailers put in quoted values are decoded
    /// last.
    #[must_use]
    pub fn decoded(&self, fallback: &str) -> Option<String> {
        let value = self.value.as_deref()?;
        if !self.is_extended() {
            return Some(decode_rfc2047(value));
        }

        let mut bytes = Vec::with_capacity(value.len());
        for fragment in &self.fragments {
            if fragment.extended {
                bytes.extend(decode_percent(&fragment.text));
            } else {
                bytes.extend_from_slice(fragment.text.as_bytes());
            }
        }
        Some(decode_rfc2047(&decode_charset(&bytes, self.charset(), fallback)))
    }
}

/// Name to value mapping with unique, lower-cased keys.
///
/// Iteration follows insertion order: single-line parameters as they
/// were encountered, then continuation parameters by first fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<Parameter>,
}

impl Parameters {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value by name, ignoring ASCII case.
    ///
    /// A name written without a value (`format`, `name=""`) yields
    /// `None`; [`Parameters::contains`] still reports it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameter(name).and_then(Parameter::value)
    }

    /// Gets the full parameter by name, ignoring ASCII case.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Gets a fully decoded value by name. See [`Parameter::decoded`].
    #[must_use]
    pub fn decoded(&self, name: &str) -> Option<String> {
        self.decoded_with(name, DEFAULT_FALLBACK_CHARSET)
    }

    /// Like [`Parameters::decoded`] with an explicit fallback charset.
    #[must_use]
    pub fn decoded_with(&self, name: &str, fallback: &str) -> Option<String> {
        self.parameter(name).and_then(|p| p.decoded(fallback))
    }

    /// Checks whether a name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|p| (p.name(), p.value()))
    }

    /// Inserts a plain value unless the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let item = ParameterItem {
            name: name.into().to_lowercase(),
            single_line: true,
            value: Some(value.into()),
            ..ParameterItem::default()
        };
        self.insert_first(Parameter::from_single(item))
    }

    fn insert_first(&mut self, parameter: Parameter) -> bool {
        if self.contains(&parameter.name) {
            return false;
        }
        self.entries.push(parameter);
        true
    }

    fn upsert(&mut self, parameter: Parameter) {
        match self.entries.iter_mut().find(|p| p.name == parameter.name) {
            Some(existing) => *existing = parameter,
            None => self.entries.push(parameter),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Parameters {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

/// Collects the raw parameter lines of one header and reassembles them.
///
/// ```
/// use mailtree_mime::ContentParameterParser;
///
/// let mut parser = ContentParameterParser::new();
/// parser.add("URL*0=\"ftp://\";");
/// parser.add("URL*1=\"cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"");
/// let parameters = parser.parse();
///
/// assert_eq!(
///     parameters.get("url"),
///     Some("ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar")
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContentParameterParser {
    lines: Vec<String>,
}

impl ContentParameterParser {
    /// Creates a parser with no lines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser over existing lines.
    #[must_use]
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds one raw parameter line, in header order.
    pub fn add(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Decodes every line and builds the parameter mapping.
    ///
    /// The first single-line occurrence of a name wins. Continuation
    /// fragments are grouped by name, ordered by index (stable for equal
    /// indices) and concatenated; an assembled continuation value
    /// replaces a single-line value of the same name.
    #[must_use]
    pub fn parse(&self) -> Parameters {
        let mut parameters = Parameters::new();
        let mut groups: Vec<(String, Vec<ParameterItem>)> = Vec::new();

        for item in self.lines.iter().map(|line| ParameterItem::parse(line)) {
            if item.name.is_empty() {
                tracing::trace!(value = ?item.value, "Dropping parameter without a name");
                continue;
            }

            if item.single_line {
                let name = item.name.clone();
                if !parameters.insert_first(Parameter::from_single(item)) {
                    tracing::trace!(name, "Ignoring duplicate parameter");
                }
                continue;
            }

            match groups.iter_mut().find(|(name, _)| *name == item.name) {
                Some((_, group)) => group.push(item),
                None => groups.push((item.name.clone(), vec![item])),
            }
        }

        for (name, mut group) in groups {
            group.sort_by_key(|item| item.index);
            parameters.upsert(Parameter::from_continuation(name, group));
        }

        parameters
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
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    const URL: &str = "ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar";

    #[test]
    fn test_simple_parameters() {
        let mut parser = ContentParameterParser::new();
        parser.add("URL=\"ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"");
        parser.add("title*=us-ascii'en-us'This%20is%20%2A%2A%2Afun%2A%2A%2A");
        let parameters = parser.parse();

        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters.get("url"), Some(URL));
        assert_eq!(parameters.get("title"), Some("This%20is%20%2A%2A%2Afun%2A%2A%2A"));
    }

    #[test]
    fn test_multiline_parameters() {
        let mut parser = ContentParameterParser::new();
        parser.add("URL*0=\"ftp://\";");
        parser.add("URL*1=\"cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"");
        parser.add("title*=us-ascii'en-us'This%20is%20%2A%2A%2Afun%2A%2A%2A");
        let parameters = parser.parse();

        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters.get("url"), Some(URL));
        assert_eq!(parameters.get("title"), Some("This%20is%20%2A%2A%2Afun%2A%2A%2A"));
    }

    #[test]
    fn test_multiline_parameters_with_charset() {
        let parser = ContentParameterParser::from_lines([
            "URL*0=\"ftp://\";",
            "URL*1=\"cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"",
            "title*1*=us-ascii'en'This%20is%20even%20more%20",
            "title*2*=%2A%2A%2Afun%2A%2A%2A%20",
            "title*3=\"isn't it!\"",
        ]);
        let parameters = parser.parse();

        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters.get("url"), Some(URL));
        assert_eq!(
            parameters.get("title"),
            Some("This%20is%20even%20more%20%2A%2A%2Afun%2A%2A%2A%20isn't it!")
        );

        let title = parameters.parameter("TITLE").unwrap();
        assert_eq!(title.charset(), Some("us-ascii"));
        assert_eq!(title.language(), Some("en"));
        assert_eq!(
            parameters.decoded("title").as_deref(),
            Some("This is even more ***fun*** isn't it!")
        );
    }

    #[test]
    fn test_out_of_order_fragments() {
        let parser = ContentParameterParser::from_lines(["name*2=c", "name*0=a", "name*1=b"]);
        assert_eq!(parser.parse().get("name"), Some("abc"));
    }

    #[test]
    fn test_first_single_line_wins() {
        let parser = ContentParameterParser::from_lines(["charset=utf-8", "CHARSET=latin1"]);
        let parameters = parser.parse();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters.get("charset"), Some("utf-8"));
    }

    #[test]
    fn test_continuation_replaces_single_line() {
        let parser = ContentParameterParser::from_lines([
            "filename=fallback.txt",
            "filename*0=real",
            "filename*1=.txt",
        ]);
        let parameters = parser.parse();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters.get("filename"), Some("real.txt"));
    }

    #[test]
    fn test_decoded_utf8_filename() {
        let parser = ContentParameterParser::from_lines([
            "filename*=utf-8''%E5%A4%A7%E9%98%AA%E7%93%A6%E6%96%AF9532.pdf",
        ]);
        assert_eq!(
            parser.parse().decoded("filename").as_deref(),
            Some("大阪瓦斯9532.pdf")
        );
    }

    #[test]
    fn test_decoded_rfc2047_in_quoted_value() {
        let parser = ContentParameterParser::from_lines(["name=\"=?utf-8?B?cmVwb3J0LnBkZg==?=\""]);
        assert_eq!(parser.parse().decoded("name").as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_malformed_lines_do_not_abort() {
        let parser = ContentParameterParser::from_lines(["=orphan", "lonely", "charset=\"utf-8"]);
        let parameters = parser.parse();
        assert!(parameters.contains("lonely"));
        assert_eq!(parameters.get("lonely"), None);
        assert_eq!(parameters.parameter("lonely").unwrap().value(), None);
        assert_eq!(parameters.decoded("lonely"), None);
        assert_eq!(parameters.get("charset"), Some("utf-8"));
        assert_eq!(parameters.len(), 2);
    }

    #[test]
    fn test_unset_values_stay_unset() {
        let parameters =
            ContentParameterParser::from_lines(["empty=\"\"", "bare", "charset=utf-8"]).parse();
        assert_eq!(parameters.len(), 3);
        assert!(parameters.contains("empty"));
        assert!(parameters.contains("bare"));
        assert_eq!(parameters.get("empty"), None);
        assert_eq!(parameters.get("bare"), None);
        assert_eq!(parameters.decoded("bare"), None);

        let content_type = crate::ContentType::parse("text/plain; format; charset=utf-8");
        assert_eq!(content_type.to_string(), "text/plain; format; charset=utf-8");
    }

    #[test]
    fn test_insert_keeps_first() {
        let mut parameters = Parameters::new();
        assert!(parameters.insert("Charset", "utf-8"));
        assert!(!parameters.insert("charset", "latin1"));
        assert_eq!(parameters.get("CHARSET"), Some("utf-8"));
    }

    #[test]
    fn test_empty_parser() {
        assert!(ContentParameterParser::new().parse().is_empty());
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,10}"
    }

    fn value_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9./:_-]{1,20}"
    }

    proptest! {
        #[test]
        fn prop_single_line_count_matches_distinct_names(
            entries in proptest::collection::btree_map(name_strategy(), value_strategy(), 0..8)
        ) {
            let parser = ContentParameterParser::from_lines(
                entries.iter().map(|(name, value)| format!("{name}=\"{value}\";")),
            );
            let parameters = parser.parse();

            prop_assert_eq!(parameters.len(), entries.len());
            for (name, value) in &entries {
                prop_assert_eq!(parameters.get(name), Some(value.as_str()));
            }
        }

        #[test]
        fn prop_continuations_concatenate_in_index_order(
            name in name_strategy(),
            fragments in proptest::collection::vec(value_strategy(), 1..6),
        ) {
            let mut lines: Vec<String> = fragments
                .iter()
                .enumerate()
                .map(|(i, fragment)| format!("{name}*{i}=\"{fragment}\""))
                .collect();
            lines.reverse();
            let parameters = ContentParameterParser::from_lines(lines).parse();

            prop_assert_eq!(parameters.len(), 1);
            let expected = fragments.concat();
            prop_assert_eq!(parameters.get(&name), Some(expected.as_str()));
        }

        #[test]
        fn prop_reparsing_decoded_set_is_idempotent(
            entries in proptest::collection::btree_map(name_strategy(), value_strategy(), 0..8)
        ) {
            let first = ContentParameterParser::from_lines(
                entries.iter().map(|(name, value)| format!("{name}={value}")),
            )
            .parse();
            let second = ContentParameterParser::from_lines(
                first.iter().map(|(name, value)| format!("{name}={}", value.unwrap_or_default())),
            )
            .parse();

            let first: BTreeMap<_, _> = first.iter().collect();
            let second: BTreeMap<_, _> = second.iter().collect();
            prop_assert_eq!(first, second);
        }
    }
}
