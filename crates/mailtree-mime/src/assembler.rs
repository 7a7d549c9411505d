//! Multipart assembly.
//!
//! [`MultipartAssembler`] turns raw message octets into a [`MimePart`]
//! tree by recursive descent over boundary-delimited bodies, then sorts
//! the leaves into the bodies, embedded objects and attachments of a
//! [`crate::Message`].
//!
//! Structural damage degrades rather than fails: a multipart without a
//! usable boundary becomes a `text/plain` leaf, and a missing closing
//! delimiter lets the last part run to the end of the body. Only nesting
//! deeper than [`ParserConfig::max_depth`] or more than
//! [`ParserConfig::max_parts`] parts abort the parse.

use crate::config::ParserConfig;
use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::decode_percent;
use crate::error::{Error, Result};
use crate::header::{Headers, Lines};
use crate::message::{Attachment, TextBody};
use crate::part::{MimePart, TransferEncoding};

/// Builds and classifies the part tree of one message.
///
/// An assembler counts the parts it has built, so use a fresh one per
/// message.
#[derive(Debug)]
pub struct MultipartAssembler<'a> {
    config: &'a ParserConfig,
    parts: usize,
}

/// Leaves of a tree sorted into the message view.
#[derive(Debug, Default)]
pub(crate) struct Classified {
    pub body_text: TextBody,
    pub body_html: TextBody,
    pub attachments: Vec<Attachment>,
    pub embedded_objects: Vec<Attachment>,
}

/// Body slices of one multipart node.
struct Split<'b> {
    preamble: &'b [u8],
    parts: Vec<&'b [u8]>,
    epilogue: &'b [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

impl<'a> MultipartAssembler<'a> {
    /// Creates an assembler bound to `config`.
    #[must_use]
    pub const fn new(config: &'a ParserConfig) -> Self {
        Self { config, parts: 0 }
    }

    /// Number of parts built so far, containers included.
    #[must_use]
    pub const fn part_count(&self) -> usize {
        self.parts
    }

    /// Builds the part tree of a complete message (headers and body).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DepthExceeded`] or [`Error::TooManyParts`] when the
    /// input goes past the configured limits.
    pub fn assemble(&mut self, raw: &[u8]) -> Result<MimePart> {
        self.parse_part(raw, 0, false)
    }

    fn parse_part(&mut self, raw: &[u8], depth: usize, in_digest: bool) -> Result<MimePart> {
        self.parts += 1;
        if self.parts > self.config.max_parts {
            tracing::warn!(limit = self.config.max_parts, "Too many MIME parts");
            return Err(Error::TooManyParts {
                limit: self.config.max_parts,
            });
        }

        let (headers, offset) = Headers::parse(raw);
        let body = &raw[offset..];
        let mut part = read_part_headers(headers, in_digest);

        if part.content_type.is_multipart() {
            if depth >= self.config.max_depth {
                tracing::warn!(limit = self.config.max_depth, "Multipart nesting too deep");
                return Err(Error::DepthExceeded {
                    limit: self.config.max_depth,
                });
            }

            let split = match part.content_type.boundary() {
                Some(boundary) => split_multipart(body, boundary),
                None => {
                    tracing::debug!(mime_type = %part.content_type.mime_type, "Multipart without boundary");
                    None
                }
            };

            if let Some(split) = split {
                let digest = part.content_type.sub_type == "digest";
                part.preamble = split.preamble.to_vec();
                part.epilogue = split.epilogue.to_vec();
                for child in split.parts {
                    let child = self.parse_part(child, depth + 1, digest)?;
                    part.children.push(child);
                }
                return Ok(part);
            }

            part.content_type = as_text_plain(part.content_type);
        } else if !part.content_type.is_recognized()
            && !part.headers.contains("content-transfer-encoding")
            && part.filename().is_none()
        {
            tracing::debug!(mime_type = %part.content_type.mime_type, "Unrecognized content type read as text/plain");
            part.content_type = as_text_plain(part.content_type);
        }

        part.body = body.to_vec();
        Ok(part)
    }

    /// Sorts the leaves of `root` into bodies, embedded objects and
    /// attachments.
    ///
    /// Inline or undispositioned `text/plain` and `text/html` leaves
    /// without a filename are appended, in document order, to the text
    /// and HTML bodies. Remaining leaves with a `Content-ID` that are not
    /// explicit attachments become embedded objects when the HTML body
    /// references them, they sit inside `multipart/related`, or they are
    /// `inline`. Everything else is an attachment.
    pub(crate) fn classify(&self, root: &MimePart) -> Classified {
        let fallback = self.config.fallback_charset.as_str();
        let mut leaves = Vec::new();
        collect_leaves(root, false, &mut leaves);

        let mut classified = Classified::default();
        let mut rest = Vec::new();
        for (part, in_related) in leaves {
            if is_body(part, "plain") {
                classified
                    .body_text
                    .append(&part.text(fallback), part.content_type.charset());
            } else if is_body(part, "html") {
                classified
                    .body_html
                    .append(&part.text(fallback), part.content_type.charset());
            } else {
                rest.push((part, in_related));
            }
        }

        let references = cid_references(&classified.body_html.text);
        for (part, in_related) in rest {
            let embedded = part.content_id.as_deref().is_some_and(|cid| {
                !part.is_attachment()
                    && (in_related
                        || part.is_inline()
                        || references.iter().any(|r| r.eq_ignore_ascii_case(cid)))
            });

            if embedded {
                let index = classified.embedded_objects.len() + 1;
                classified
                    .embedded_objects
                    .push(Attachment::from_part(part, "embedded", index));
            } else {
                let index = classified.attachments.len() + 1;
                classified
                    .attachments
                    .push(Attachment::from_part(part, "attachment", index));
            }
        }

        classified
    }
}

fn read_part_headers(headers: Headers, in_digest: bool) -> MimePart {
    let content_type = headers.get("content-type").map_or_else(
        || {
            if in_digest {
                ContentType::message_rfc822()
            } else {
                ContentType::text_plain()
            }
        },
        ContentType::parse,
    );
    let transfer_encoding = headers
        .get("content-transfer-encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);
    let disposition = headers
        .get("content-disposition")
        .map(ContentDisposition::parse);
    let content_id = headers.get("content-id").and_then(strip_brackets);

    MimePart {
        headers,
        content_type,
        transfer_encoding,
        disposition,
        content_id,
        ..MimePart::default()
    }
}

/// Removes whitespace and one pair of angle brackets around an id.
pub(crate) fn strip_brackets(id: &str) -> Option<String> {
    let id = id.trim();
    let id = id
        .strip_prefix('<')
        .map_or(id, |rest| rest.strip_suffix('>').unwrap_or(rest))
        .trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn as_text_plain(declared: ContentType) -> ContentType {
    ContentType {
        main_type: "text".to_string(),
        sub_type: "plain".to_string(),
        ..declared
    }
}

/// Splits a multipart body on `--boundary` lines.
///
/// Returns `None` when the boundary never occurs. Each part keeps the
/// line break that precedes the next delimiter.
fn split_multipart<'b>(body: &'b [u8], boundary: &str) -> Option<Split<'b>> {
    let mut preamble: Option<&[u8]> = None;
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;

    for line in Lines::new(body) {
        let Some(kind) = delimiter(&body[line.start..line.end], boundary) else {
            continue;
        };

        match start {
            Some(from) => parts.push(&body[from..line.start.max(from)]),
            None => preamble = Some(&body[..line.start]),
        }

        if kind == Delimiter::Close {
            return Some(Split {
                preamble: preamble.unwrap_or_default(),
                parts,
                epilogue: &body[line.next..],
            });
        }

        start = Some(line.next);
    }

    let from = start?;
    tracing::debug!(boundary, "Missing closing delimiter");
    parts.push(&body[from..]);
    Some(Split {
        preamble: preamble.unwrap_or_default(),
        parts,
        epilogue: &[],
    })
}

fn delimiter(line: &[u8], boundary: &str) -> Option<Delimiter> {
    let rest = line.strip_prefix(b"--")?.strip_prefix(boundary.as_bytes())?;
    let rest = rest.trim_ascii();
    if rest.is_empty() {
        Some(Delimiter::Open)
    } else if rest == b"--" {
        Some(Delimiter::Close)
    } else {
        None
    }
}

fn collect_leaves<'p>(part: &'p MimePart, in_related: bool, out: &mut Vec<(&'p MimePart, bool)>) {
    if part.is_leaf() {
        // An empty multipart has nothing to classify
        if !part.content_type.is_multipart() {
            out.push((part, in_related));
        }
        return;
    }
    let related = in_related || part.content_type.is("multipart", "related");
    for child in &part.children {
        collect_leaves(child, related, out);
    }
}

fn is_body(part: &MimePart, sub_type: &str) -> bool {
    if !part.content_type.is("text", sub_type) || part.is_attachment() {
        return false;
    }
    part.is_inline() || part.filename().is_none()
}

/// Collects the targets of `cid:` URLs in an HTML body.
fn cid_references(html: &str) -> Vec<String> {
    let lowered = html.to_ascii_lowercase();
    lowered
        .match_indices("cid:")
        .filter_map(|(index, _)| {
            let tail = &html[index + 4..];
            let end = tail
                .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | ')'))
                .unwrap_or(tail.len());
            let target = String::from_utf8_lossy(&decode_percent(&tail[..end])).into_owned();
            (!target.is_empty()).then_some(target)
        })
        .collect()
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

    fn assemble(raw: &str) -> MimePart {
        let config = ParserConfig::default();
        MultipartAssembler::new(&config)
            .assemble(raw.as_bytes())
            .unwrap()
    }

    fn classify(raw: &str) -> Classified {
        let config = ParserConfig::default();
        let mut assembler = MultipartAssembler::new(&config);
        let root = assembler.assemble(raw.as_bytes()).unwrap();
        assembler.classify(&root)
    }

    #[test]
    fn test_single_part() {
        let root = assemble("Content-Type: text/plain\r\n\r\nHello");
        assert!(root.is_leaf());
        assert_eq!(root.body, b"Hello");
        assert!(root.content_type.is("text", "plain"));
    }

    #[test]
    fn test_split_parts_keep_line_breaks() {
        let root = assemble(
            "Content-Type: multipart/mixed; boundary=\"xyz\"\r\n\r\n\
             preamble\r\n\
             --xyz\r\n\
             Content-Type: text/plain\r\n\r\n\
             first\r\n\
             --xyz\r\n\
             \r\n\
             second\r\n\r\n\
             --xyz--\r\n\
             epilogue\r\n",
        );
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].body, b"first\r\n");
        assert_eq!(root.children[1].body, b"second\r\n\r\n");
        assert_eq!(root.preamble, b"preamble\r\n");
        assert_eq!(root.epilogue, b"epilogue\r\n");
    }

    #[test]
    fn test_bare_cr_line_breaks() {
        let root = assemble(
            "Content-Type: multipart/mixed; boundary=b\r\r--b\rContent-Type: text/html\r\r<p>x</p>\r--b--\r",
        );
        assert_eq!(root.children.len(), 1);
        assert!(root.children[0].content_type.is("text", "html"));
        assert_eq!(root.children[0].body, b"<p>x</p>\r");
    }

    #[test]
    fn test_missing_close_delimiter_runs_to_end() {
        let root = assemble("Content-Type: multipart/mixed; boundary=b\n\n--b\n\nA\n--b\n\nB\n");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].body, b"A\n");
        assert_eq!(root.children[1].body, b"B\n");
        assert!(root.epilogue.is_empty());
    }

    #[test]
    fn test_boundary_prefix_does_not_split() {
        let root = assemble(
            "Content-Type: multipart/mixed; boundary=b\n\n--b\n\nA\n--bb\nstill A\n--b--\n",
        );
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].body, b"A\n--bb\nstill A\n");
    }

    #[test]
    fn test_multipart_with_only_close_delimiter() {
        let raw = "Content-Type: multipart/mixed; boundary=b\n\nnothing here\n--b--\n";
        let root = assemble(raw);
        assert!(root.children.is_empty());
        assert_eq!(root.preamble, b"nothing here\n");

        let classified = classify(raw);
        assert!(classified.attachments.is_empty());
        assert!(classified.body_text.is_empty());
    }

    #[test]
    fn test_empty_part_between_delimiters() {
        let root = assemble("Content-Type: multipart/mixed; boundary=b\n\n--b\n--b\n\nB\n--b--\n");
        assert_eq!(root.children.len(), 2);
        assert!(root.children[0].body.is_empty());
        assert_eq!(root.children[1].body, b"B\n");
    }

    #[test]
    fn test_missing_boundary_degrades_to_text() {
        let root = assemble("Content-Type: multipart/mixed\n\nplain body\n");
        assert!(root.is_leaf());
        assert!(root.content_type.is("text", "plain"));
        assert_eq!(root.content_type.mime_type, "multipart/mixed");
        assert_eq!(root.body, b"plain body\n");
    }

    #[test]
    fn test_unfound_boundary_degrades_to_text() {
        let root = assemble("Content-Type: multipart/mixed; boundary=nope\n\nplain body\n");
        assert!(root.is_leaf());
        assert!(root.content_type.is("text", "plain"));
    }

    #[test]
    fn test_unrecognized_type_without_encoding_is_text() {
        let root = assemble("Content-Type: foo\n\nhello\n");
        assert!(root.content_type.is("text", "plain"));

        let root = assemble("Content-Type: foo/bar\nContent-Transfer-Encoding: base64\n\naGVsbG8=\n");
        assert!(root.content_type.is("foo", "bar"));
    }

    #[test]
    fn test_digest_children_default_to_rfc822() {
        let root = assemble(
            "Content-Type: multipart/digest; boundary=d\n\n--d\n\nFrom: a@b.c\nSubject: x\n\nbody\n--d--\n",
        );
        assert!(root.children[0].content_type.is("message", "rfc822"));
        assert!(root.children[0].is_leaf());
    }

    #[test]
    fn test_depth_limit_fails_closed() {
        let config = ParserConfig::builder().max_depth(1).build();
        let raw = "Content-Type: multipart/mixed; boundary=a\n\n--a\n\
                   Content-Type: multipart/mixed; boundary=b\n\n--b\n\nx\n--b--\n--a--\n";
        let err = MultipartAssembler::new(&config)
            .assemble(raw.as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { limit: 1 }));
    }

    #[test]
    fn test_part_limit_fails_closed() {
        let config = ParserConfig::builder().max_parts(2).build();
        let raw = "Content-Type: multipart/mixed; boundary=a\n\n--a\n\nx\n--a\n\ny\n--a--\n";
        let mut assembler = MultipartAssembler::new(&config);
        let err = assembler.assemble(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::TooManyParts { limit: 2 }));
        assert_eq!(assembler.part_count(), 3);
    }

    #[test]
    fn test_content_id_brackets_removed() {
        let root = assemble("Content-Type: image/png\nContent-ID: < img1@local >\n\n");
        assert_eq!(root.content_id.as_deref(), Some("img1@local"));
        assert_eq!(strip_brackets("<>"), None);
        assert_eq!(strip_brackets("plain"), Some("plain".to_string()));
    }

    #[test]
    fn test_classify_alternative_with_related_image() {
        let classified = classify(
            "Content-Type: multipart/alternative; boundary=alt\n\n\
             --alt\nContent-Type: text/plain\n\nplain\n\
             --alt\nContent-Type: multipart/related; boundary=rel\n\n\
             --rel\nContent-Type: text/html\n\n<img src=\"cid:logo\">\n\
             --rel\nContent-Type: image/png\nContent-ID: <logo>\nContent-Transfer-Encoding: base64\n\niVBORw==\n\
             --rel--\n--alt--\n",
        );
        assert_eq!(classified.body_text.text, "plain\n");
        assert_eq!(classified.body_html.text, "<img src=\"cid:logo\">\n");
        assert_eq!(classified.embedded_objects.len(), 1);
        assert!(classified.attachments.is_empty());
        assert_eq!(classified.embedded_objects[0].content_id.as_deref(), Some("logo"));
        assert_eq!(classified.embedded_objects[0].binary_content, b"\x89PNG");
    }

    #[test]
    fn test_classify_referenced_cid_outside_related() {
        let classified = classify(
            "Content-Type: multipart/mixed; boundary=m\n\n\
             --m\nContent-Type: text/html\n\n<img src='CID:Pic%401'>\n\
             --m\nContent-Type: image/gif\nContent-ID: <pic@1>\n\nGIF\n\
             --m--\n",
        );
        assert_eq!(classified.embedded_objects.len(), 1);
        assert!(classified.attachments.is_empty());
    }

    #[test]
    fn test_classify_explicit_attachment_with_cid() {
        let classified = classify(
            "Content-Type: multipart/related; boundary=r\n\n\
             --r\nContent-Type: text/html\n\n<p>hi</p>\n\
             --r\nContent-Type: image/gif\nContent-ID: <a>\nContent-Disposition: attachment\n\nGIF\n\
             --r--\n",
        );
        assert!(classified.embedded_objects.is_empty());
        assert_eq!(classified.attachments.len(), 1);
        assert_eq!(classified.attachments[0].filename, "attachment-1.gif");
    }

    #[test]
    fn test_classify_text_attachments() {
        let classified = classify(
            "Content-Type: multipart/mixed; boundary=m\n\n\
             --m\nContent-Type: text/plain\n\nbody\n\
             --m\nContent-Type: text/plain; name=notes.txt\n\nnotes\n\
             --m\nContent-Type: text/html\nContent-Disposition: attachment\n\n<p>page</p>\n\
             --m--\n",
        );
        assert_eq!(classified.body_text.text, "body\n");
        assert!(classified.body_html.text.is_empty());
        assert_eq!(classified.attachments.len(), 2);
        assert_eq!(classified.attachments[0].filename, "notes.txt");
        assert_eq!(classified.attachments[1].filename, "attachment-2.html");
    }

    #[test]
    fn test_classify_inline_html_parts_append() {
        let classified = classify(
            "Content-Type: multipart/mixed; boundary=m\n\n\
             --m\nContent-Type: text/html\nContent-Disposition: inline\n\n<p>one</p>\n\
             --m\nContent-Type: text/html\nContent-Disposition: inline; filename=disclaimer.html\n\n<p>two</p>\n\
             --m--\n",
        );
        assert_eq!(classified.body_html.text, "<p>one</p>\n<p>two</p>\n");
    }

    #[test]
    fn test_cid_references() {
        let refs = cid_references("<img src=\"cid:a@b\"><td background=cid:c>url(cid:d)");
        assert_eq!(refs, vec!["a@b", "c", "d"]);
        assert!(cid_references("<p>cid:</p>").is_empty());
    }
}
