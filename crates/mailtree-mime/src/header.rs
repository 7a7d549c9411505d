//! Header block parsing.
//!
//! Raw header octets are split into [`HeaderField`]s in encounter order.
//! Line breaks may be `\r\n`, bare `\n` or bare `\r`; all three are
//! treated alike everywhere in this module.

use crate::encoding::decode_header_bytes;
use std::fmt;

/// One physical line inside a byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line {
    /// Offset of the first byte of the line.
    pub start: usize,
    /// Offset just past the line content, before the terminator.
    pub end: usize,
    /// Offset of the next line (past the terminator).
    pub next: usize,
}

/// Iterator over the lines of a byte buffer, for any line-break convention.
#[derive(Debug, Clone)]
pub(crate) struct Lines<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    pub(crate) const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl Iterator for Lines<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.pos >= self.data.len() {
            return None;
        }

        let start = self.pos;
        let line = match memchr::memchr2(b'\r', b'\n', &self.data[start..]) {
            Some(offset) => {
                let end = start + offset;
                let next = if self.data[end] == b'\r' && self.data.get(end + 1) == Some(&b'\n') {
                    end + 2
                } else {
                    end + 1
                };
                Line { start, end, next }
            }
            None => Line {
                start,
                end: self.data.len(),
                next: self.data.len(),
            },
        };

        self.pos = line.next;
        Some(line)
    }
}

/// A single header field as read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    /// Field name as written.
    pub name: String,
    /// Unfolded value, not yet RFC 2047 decoded.
    pub value: String,
    /// Folded continuation lines, trimmed, in order.
    pub continuations: Vec<String>,
}

impl HeaderField {
    /// Creates a single-line header field.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            continuations: Vec::new(),
        }
    }

    /// Checks the field name, ignoring ASCII case.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn push_continuation(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if !self.value.is_empty() {
            self.value.push(' ');
        }
        self.value.push_str(line);
        self.continuations.push(line.to_string());
    }
}

/// Ordered collection of header fields with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<HeaderField>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.is(name))
            .map(|field| field.value.as_str())
    }

    /// Gets the first field for a header.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&HeaderField> {
        self.fields.iter().find(|field| field.is(name))
    }

    /// Gets all values for a header, in encounter order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|field| field.is(name))
            .map(|field| field.value.as_str())
            .collect()
    }

    /// Checks whether a header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.is(name))
    }

    /// Number of fields, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Checks whether no field was read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all fields in encounter order.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    /// Parses the header block at the start of `data`.
    ///
    /// Returns the headers and the offset at which the body starts. The
    /// block ends at the first empty line. A line that is neither a field
    /// nor a continuation also ends the block, and is left to the body.
    /// A leading mbox `From ` separator line is skipped.
    #[must_use]
    pub fn parse(data: &[u8]) -> (Self, usize) {
        let mut headers = Self::new();
        let mut current: Option<HeaderField> = None;

        for (index, line) in Lines::new(data).enumerate() {
            let bytes = &data[line.start..line.end];

            if bytes.trim_ascii().is_empty() {
                headers.fields.extend(current.take());
                return (headers, line.next);
            }

            if starts_with_wsp(bytes) {
                match current.as_mut() {
                    Some(field) => field.push_continuation(&decode_header_bytes(bytes)),
                    None if headers.is_empty() && index == 0 => return (headers, 0),
                    None => {}
                }
                continue;
            }

            headers.fields.extend(current.take());

            if index == 0 && bytes.starts_with(b"From ") {
                continue;
            }

            match split_field(bytes) {
                Some(field) => current = Some(field),
                None => {
                    tracing::trace!(offset = line.start, "Header block ended by non-field line");
                    return (headers, line.start);
                }
            }
        }

        headers.fields.extend(current);
        (headers, data.len())
    }
}

const fn starts_with_wsp(bytes: &[u8]) -> bool {
    matches!(bytes.first(), Some(b' ' | b'\t'))
}

/// Splits `Name: value`, requiring a printable name without whitespace.
fn split_field(bytes: &[u8]) -> Option<HeaderField> {
    let colon = memchr::memchr(b':', bytes)?;
    let name = bytes[..colon].trim_ascii_end();
    if name.is_empty() || !name.iter().all(|b| b.is_ascii_graphic()) {
        return None;
    }
    let name = String::from_utf8_lossy(name).into_owned();
    let value = decode_header_bytes(&bytes[colon + 1..]).trim().to_string();
    Some(HeaderField::new(name, value))
}

/// Splits a structured header value on `;` outside double quotes.
///
/// The first element is the leading token (media type or disposition
/// type); the rest are raw parameter lines suitable for
/// [`crate::ContentParameterParser::add`].
#[must_use]
pub fn split_parameters(value: &str) -> (String, Vec<String>) {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in value.chars() {
        match ch {
            _ if escaped => {
                current.push(ch);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    segments.push(current);

    let mut segments = segments.into_iter();
    let head = segments.next().unwrap_or_default().trim().to_string();
    let params = segments
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (head, params)
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            writeln!(f, "{}: {}", field.name, field.value)?;
        }
        Ok(())
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
    fn test_lines_mixed_breaks() {
        let data = b"a\r\nb\nc\rd";
        let lines: Vec<&[u8]> = Lines::new(data).map(|l| &data[l.start..l.end]).collect();
        assert_eq!(lines, vec![&b"a"[..], b"b", b"c", b"d"]);
    }

    #[test]
    fn test_lines_offsets() {
        let data = b"ab\r\n\r\ncd";
        let lines: Vec<Line> = Lines::new(data).collect();
        assert_eq!(lines[0], Line { start: 0, end: 2, next: 4 });
        assert_eq!(lines[1], Line { start: 4, end: 4, next: 6 });
        assert_eq!(lines[2], Line { start: 6, end: 8, next: 8 });
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
        assert!(!headers.contains("Subject"));
    }

    #[test]
    fn test_headers_duplicates_keep_order() {
        let mut headers = Headers::new();
        headers.add("Received", "first");
        headers.add("To", "alice@example.com");
        headers.add("received", "second");
        assert_eq!(headers.get_all("Received"), vec!["first", "second"]);
        assert_eq!(headers.get("Received"), Some("first"));
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body"
        );

        let (headers, offset) = Headers::parse(text.as_bytes());
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("To"), Some("recipient@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain; charset=utf-8"));
        assert_eq!(&text.as_bytes()[offset..], b"Body");

        let field = headers.field("content-type").unwrap();
        assert_eq!(field.continuations, vec!["charset=utf-8"]);
    }

    #[test]
    fn test_headers_parse_bare_line_feeds() {
        let text = b"Subject: hi\nX-Folded: one\n\ttwo\n\nBody\n";
        let (headers, offset) = Headers::parse(text);
        assert_eq!(headers.get("subject"), Some("hi"));
        assert_eq!(headers.get("x-folded"), Some("one two"));
        assert_eq!(&text[offset..], b"Body\n");
    }

    #[test]
    fn test_headers_parse_bare_carriage_returns() {
        let text = b"Subject: hi\rContent-Type: text/html\r\rBody";
        let (headers, offset) = Headers::parse(text);
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(&text[offset..], b"Body");
    }

    #[test]
    fn test_headers_parse_without_body() {
        let text = b"Subject: only headers\r\n";
        let (headers, offset) = Headers::parse(text);
        assert_eq!(headers.get("subject"), Some("only headers"));
        assert_eq!(offset, text.len());
    }

    #[test]
    fn test_headers_parse_body_without_headers() {
        let text = b"just some text\r\nand more";
        let (headers, offset) = Headers::parse(text);
        assert!(headers.is_empty());
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_headers_parse_leading_blank_line() {
        let text = b"\r\nbody";
        let (headers, offset) = Headers::parse(text);
        assert!(headers.is_empty());
        assert_eq!(&text[offset..], b"body");
    }

    #[test]
    fn test_headers_parse_skips_mbox_separator() {
        let text = b"From someone@example.com Mon Jun 24 10:37:36 2013\nSubject: x\n\nbody";
        let (headers, offset) = Headers::parse(text);
        assert_eq!(headers.get("subject"), Some("x"));
        assert_eq!(&text[offset..], b"body");
    }

    #[test]
    fn test_headers_parse_latin1_value() {
        let text = b"Subject: S\xe3o Paulo\r\n\r\n";
        let (headers, _) = Headers::parse(text);
        assert_eq!(headers.get("subject"), Some("São Paulo"));
    }

    #[test]
    fn test_split_parameters() {
        let (head, params) =
            split_parameters("attachment; filename=\"a;b.txt\"; size=10;");
        assert_eq!(head, "attachment");
        assert_eq!(params, vec!["filename=\"a;b.txt\"", "size=10"]);
    }

    #[test]
    fn test_split_parameters_escaped_quote() {
        let (head, params) = split_parameters(r#"text/plain; name="say \"hi\"; ok""#);
        assert_eq!(head, "text/plain");
        assert_eq!(params, vec![r#"name="say \"hi\"; ok""#]);
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");

        let s = headers.to_string();
        assert_eq!(s, "From: sender@example.com\nTo: recipient@example.com\n");
    }
}
