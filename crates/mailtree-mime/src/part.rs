//! MIME part tree.

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64_body, decode_charset, decode_quoted_printable};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value.
    ///
    /// Unknown tokens (`x-uuencode`, typos) are read as 7bit so the body
    /// passes through untouched.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().trim_matches('"').to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }

    /// Undoes this encoding. Never fails; damaged input decodes as far
    /// as possible.
    #[must_use]
    pub fn decode(self, body: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => decode_base64_body(body),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary => body.to_vec(),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// One node of a message tree.
///
/// Multipart nodes carry their children in declaration order; every other
/// node is a leaf whose `body` holds the still transfer-encoded octets.
#[derive(Debug, Clone, Default)]
pub struct MimePart {
    /// Part headers in source order.
    pub headers: Headers,
    /// Effective content type.
    pub content_type: ContentType,
    /// Declared transfer encoding.
    pub transfer_encoding: TransferEncoding,
    /// Parsed `Content-Disposition`, if present.
    pub disposition: Option<ContentDisposition>,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// Raw body octets of a leaf. Empty for multipart nodes.
    pub body: Vec<u8>,
    /// Child parts of a multipart node.
    pub children: Vec<MimePart>,
    /// Text before the first boundary of a multipart node.
    pub preamble: Vec<u8>,
    /// Text after the closing boundary of a multipart node.
    pub epilogue: Vec<u8>,
}

impl MimePart {
    /// Returns `true` for nodes without children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Transfer-decoded body octets.
    #[must_use]
    pub fn decoded_body(&self) -> Vec<u8> {
        self.transfer_encoding.decode(&self.body)
    }

    /// Decoded body transcoded with the declared charset, or `fallback`
    /// when none is usable.
    #[must_use]
    pub fn text(&self, fallback: &str) -> String {
        decode_charset(&self.decoded_body(), self.content_type.charset(), fallback)
    }

    /// Filename from `Content-Disposition`, else the Content-Type `name`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.disposition
            .as_ref()
            .and_then(ContentDisposition::filename)
            .or_else(|| self.content_type.name())
    }

    /// Checks for an explicit `attachment` disposition.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_ref()
            .is_some_and(ContentDisposition::is_attachment)
    }

    /// Checks for an explicit `inline` disposition.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition
            .as_ref()
            .is_some_and(ContentDisposition::is_inline)
    }

    /// Iterates over the leaves below this node, depth first.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Depth-first iterator over leaf parts. See [`MimePart::walk`].
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    stack: Vec<&'a MimePart>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a MimePart;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(part) = self.stack.pop() {
            if part.is_leaf() {
                return Some(part);
            }
            self.stack.extend(part.children.iter().rev());
        }
        None
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

    fn leaf(content_type: &str, encoding: TransferEncoding, body: &[u8]) -> MimePart {
        MimePart {
            content_type: ContentType::parse(content_type),
            transfer_encoding: encoding,
            body: body.to_vec(),
            ..MimePart::default()
        }
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("8BIT"), TransferEncoding::EightBit);
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_transfer_encoding_display() {
        assert_eq!(TransferEncoding::QuotedPrintable.to_string(), "quoted-printable");
        assert_eq!(TransferEncoding::Binary.to_string(), "binary");
    }

    #[test]
    fn test_decoded_body_base64() {
        let part = leaf("text/plain", TransferEncoding::Base64, b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n");
        assert_eq!(part.decoded_body(), b"Hello, World!");
    }

    #[test]
    fn test_text_uses_declared_charset() {
        let part = leaf(
            "text/plain; charset=iso-8859-1",
            TransferEncoding::QuotedPrintable,
            b"caf=E9",
        );
        assert_eq!(part.text("utf-8"), "café");
    }

    #[test]
    fn test_text_falls_back_without_charset() {
        let part = leaf("text/plain", TransferEncoding::EightBit, b"na\xefve");
        assert_eq!(part.text("windows-1252"), "naïve");
    }

    #[test]
    fn test_filename_prefers_disposition() {
        let mut part = leaf("application/pdf; name=\"a.pdf\"", TransferEncoding::Base64, b"");
        assert_eq!(part.filename().as_deref(), Some("a.pdf"));

        part.disposition = Some(ContentDisposition::parse("attachment; filename=b.pdf"));
        assert_eq!(part.filename().as_deref(), Some("b.pdf"));
        assert!(part.is_attachment());
        assert!(!part.is_inline());
    }

    #[test]
    fn test_walk_visits_leaves_in_order() {
        let inner = MimePart {
            content_type: ContentType::parse("multipart/alternative"),
            children: vec![
                leaf("text/plain", TransferEncoding::SevenBit, b"b"),
                leaf("text/html", TransferEncoding::SevenBit, b"c"),
            ],
            ..MimePart::default()
        };
        let root = MimePart {
            content_type: ContentType::parse("multipart/mixed"),
            children: vec![
                leaf("text/plain", TransferEncoding::SevenBit, b"a"),
                inner,
                leaf("image/png", TransferEncoding::SevenBit, b"d"),
            ],
            ..MimePart::default()
        };

        let bodies: Vec<&[u8]> = root.walk().map(|p| p.body.as_slice()).collect();
        assert_eq!(bodies, vec![&b"a"[..], b"b", b"c", b"d"]);
        assert!(!root.is_leaf());
    }

    #[test]
    fn test_walk_on_leaf_yields_itself() {
        let part = leaf("text/plain", TransferEncoding::SevenBit, b"x");
        assert_eq!(part.walk().count(), 1);
    }
}
