//! Decoded message view.

use crate::address::{Address, parse_address, parse_address_list};
use crate::assembler::{MultipartAssembler, strip_brackets};
use crate::config::ParserConfig;
use crate::content_type::{ContentDisposition, ContentType};
use crate::date::parse_date;
use crate::encoding::{decode_charset, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::part::MimePart;
use chrono::{DateTime, Utc};

/// Headers checked for a read-confirmation address, in order.
const CONFIRM_READ_HEADERS: &[&str] = &[
    "disposition-notification-to",
    "confirm-reading-to",
    "x-confirm-reading-to",
];

/// Aggregated text of all body parts of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TextBody {
    /// Decoded text. Empty when the message has no such body.
    pub text: String,
    /// Charset declared by the first contributing part.
    pub charset: Option<String>,
}

impl TextBody {
    /// Checks whether no text was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn append(&mut self, text: &str, charset: Option<&str>) {
        if self.text.is_empty() && self.charset.is_none() {
            self.charset = charset.map(str::to_string);
        }
        self.text.push_str(text);
    }
}

/// Attachment or embedded object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Attachment {
    /// Content type of the part.
    pub content_type: ContentType,
    /// `Content-Disposition`, if the part had one.
    pub disposition: Option<ContentDisposition>,
    /// Decoded Content-Type `name` parameter.
    pub content_name: Option<String>,
    /// Filename: declared, else `content_name`, else generated.
    pub filename: String,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// Transfer-decoded content.
    pub binary_content: Vec<u8>,
}

impl Attachment {
    /// Builds the view of one leaf. `index` numbers generated filenames.
    pub(crate) fn from_part(part: &MimePart, prefix: &str, index: usize) -> Self {
        let content_name = part.content_type.name();
        let filename = part
            .disposition
            .as_ref()
            .and_then(ContentDisposition::filename)
            .or_else(|| content_name.clone())
            .unwrap_or_else(|| {
                let filename = format!("{prefix}-{index}.{}", extension(&part.content_type));
                tracing::debug!(%filename, mime_type = %part.content_type.mime_type, "Generated filename");
                filename
            });

        Self {
            content_type: part.content_type.clone(),
            disposition: part.disposition.clone(),
            content_name,
            filename,
            content_id: part.content_id.clone(),
            binary_content: part.decoded_body(),
        }
    }

    /// Content length in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.binary_content.len()
    }

    /// Content transcoded with the declared charset, or `fallback`.
    #[must_use]
    pub fn text(&self, fallback: &str) -> String {
        decode_charset(&self.binary_content, self.content_type.charset(), fallback)
    }
}

/// File extension for a generated filename.
fn extension(content_type: &ContentType) -> String {
    let ext = match (content_type.main_type.as_str(), content_type.sub_type.as_str()) {
        ("message", "rfc822") => "eml",
        ("text", "plain") => "txt",
        ("text", "calendar") => "ics",
        ("image", "jpeg" | "pjpeg") => "jpg",
        ("application", "octet-stream") => "bin",
        ("application", "msword") => "doc",
        (_, sub) => {
            // vnd.ms-excel, svg+xml, x-zip-compressed
            let sub = sub.rsplit('.').next().unwrap_or_default();
            let sub = sub.split('+').next().unwrap_or_default();
            let sub = sub.strip_prefix("x-").unwrap_or(sub);
            let clean: String = sub.chars().filter(char::is_ascii_alphanumeric).collect();
            return if clean.is_empty() { "bin".to_string() } else { clean };
        }
    };
    ext.to_string()
}

/// A decoded message.
///
/// Built once by [`Message::parse`] and immutable afterwards.
///
/// ```
/// use mailtree_mime::Message;
///
/// let raw = "From: Alice <alice@example.com>\r\n\
///            To: bob@example.com, \"Carol\" <carol@example.com>\r\n\
///            Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\
///            Message-ID: <1234@example.com>\r\n\
///            \r\n\
///            Hello!\r\n";
///
/// let message = Message::parse(raw).unwrap();
/// assert_eq!(message.subject(), Some("Café"));
/// assert_eq!(message.message_id(), Some("1234@example.com"));
/// assert_eq!(message.recipients().len(), 2);
/// assert_eq!(message.body_text().text, "Hello!\r\n");
/// ```
#[derive(Debug, Clone)]
pub struct Message {
    root: MimePart,
    subject: Option<String>,
    message_id: Option<String>,
    date: Option<DateTime<Utc>>,
    from: Option<Address>,
    sender: Option<Address>,
    reply_to: Vec<Address>,
    to: Vec<Address>,
    cc: Vec<Address>,
    bcc: Vec<Address>,
    confirm_read: Option<Address>,
    return_receipt: Option<Address>,
    body_text: TextBody,
    body_html: TextBody,
    attachments: Vec<Attachment>,
    embedded_objects: Vec<Attachment>,
}

impl Message {
    /// Decodes a message with the default [`ParserConfig`].
    ///
    /// # Errors
    ///
    /// See [`Message::parse_with_config`].
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self> {
        Self::parse_with_config(raw, &ParserConfig::default())
    }

    /// Decodes a message.
    ///
    /// Malformed content degrades to best-effort values instead of
    /// failing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyMessage`] for empty or whitespace-only input,
    /// and [`Error::DepthExceeded`] or [`Error::TooManyParts`] when the
    /// part tree exceeds the configured limits.
    pub fn parse_with_config(raw: impl AsRef<[u8]>, config: &ParserConfig) -> Result<Self> {
        let raw = raw.as_ref();
        if raw.trim_ascii().is_empty() {
            return Err(Error::EmptyMessage);
        }

        let mut assembler = MultipartAssembler::new(config);
        let root = assembler.assemble(raw)?;
        let classified = assembler.classify(&root);
        let headers = &root.headers;

        let date = headers.get("date").and_then(|value| {
            parse_date(value)
                .inspect_err(|e| tracing::debug!(?e, "Ignoring Date header"))
                .ok()
        });

        let message = Self {
            subject: headers.get("subject").map(|s| decode_rfc2047(s).trim().to_string()),
            message_id: headers.get("message-id").and_then(strip_brackets),
            date,
            from: headers.get("from").and_then(parse_address),
            sender: headers.get("sender").and_then(parse_address),
            reply_to: address_list(headers, "reply-to"),
            to: address_list(headers, "to"),
            cc: address_list(headers, "cc"),
            bcc: address_list(headers, "bcc"),
            confirm_read: CONFIRM_READ_HEADERS
                .iter()
                .find_map(|name| headers.get(name))
                .and_then(parse_address),
            return_receipt: headers.get("return-receipt-to").and_then(parse_address),
            body_text: classified.body_text,
            body_html: classified.body_html,
            attachments: classified.attachments,
            embedded_objects: classified.embedded_objects,
            root,
        };

        tracing::debug!(
            parts = assembler.part_count(),
            attachments = message.attachments.len(),
            embedded = message.embedded_objects.len(),
            "Decoded message"
        );
        Ok(message)
    }

    /// Top-level headers in source order.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Root of the part tree.
    #[must_use]
    pub const fn root(&self) -> &MimePart {
        &self.root
    }

    /// Top-level content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.root.content_type
    }

    /// Decoded `Subject`.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// `Message-ID` without angle brackets.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// `Date` converted to UTC, `None` when absent or unparsable.
    #[must_use]
    pub const fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    /// `From` mailbox.
    #[must_use]
    pub const fn from(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    /// `Sender` mailbox.
    #[must_use]
    pub const fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// `Reply-To` addresses.
    #[must_use]
    pub fn reply_to(&self) -> &[Address] {
        &self.reply_to
    }

    /// `To` addresses.
    #[must_use]
    pub fn to(&self) -> &[Address] {
        &self.to
    }

    /// `Cc` addresses.
    #[must_use]
    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    /// `Bcc` addresses.
    #[must_use]
    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    /// All `To`, `Cc` and `Bcc` addresses, in that order.
    #[must_use]
    pub fn recipients(&self) -> Vec<&Address> {
        self.to.iter().chain(&self.cc).chain(&self.bcc).collect()
    }

    /// Read-confirmation address (`Disposition-Notification-To`).
    #[must_use]
    pub const fn confirm_read(&self) -> Option<&Address> {
        self.confirm_read.as_ref()
    }

    /// `Return-Receipt-To` address.
    #[must_use]
    pub const fn return_receipt(&self) -> Option<&Address> {
        self.return_receipt.as_ref()
    }

    /// Concatenated plain-text body.
    #[must_use]
    pub const fn body_text(&self) -> &TextBody {
        &self.body_text
    }

    /// Concatenated HTML body.
    #[must_use]
    pub const fn body_html(&self) -> &TextBody {
        &self.body_html
    }

    /// Attachments in document order.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Inline objects referenced from the body, in document order.
    #[must_use]
    pub fn embedded_objects(&self) -> &[Attachment] {
        &self.embedded_objects
    }
}

fn address_list(headers: &Headers, name: &str) -> Vec<Address> {
    headers
        .get_all(name)
        .into_iter()
        .flat_map(parse_address_list)
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
    use chrono::TimeZone;

    #[test]
    fn test_empty_message() {
        assert!(matches!(Message::parse(""), Err(Error::EmptyMessage)));
        assert!(matches!(Message::parse(" \r\n\t\r\n"), Err(Error::EmptyMessage)));
    }

    #[test]
    fn test_single_part_headers() {
        let message = Message::parse(
            "From: \"Alice\" <alice@example.com>\n\
             Sender: list@example.com\n\
             To: bob@example.com\n\
             To: dave@example.com\n\
             Cc: Carol <carol@example.com>\n\
             Bcc: eve@example.com\n\
             Reply-To: replies@example.com\n\
             Subject: Status\n\
             Date: Mon, 24 Jun 2013 10:37:36 +0100\n\
             Message-ID:   <abc@example.com>  \n\
             \n\
             Body\n",
        )
        .unwrap();

        assert_eq!(message.from().unwrap().name, "Alice");
        assert_eq!(message.sender().unwrap().email, "list@example.com");
        assert_eq!(message.to().len(), 2);
        assert_eq!(message.cc()[0].name, "Carol");
        assert_eq!(message.bcc().len(), 1);
        assert_eq!(message.reply_to()[0].email, "replies@example.com");
        let emails: Vec<&str> = message.recipients().iter().map(|a| a.email.as_str()).collect();
        assert_eq!(
            emails,
            vec!["bob@example.com", "dave@example.com", "carol@example.com", "eve@example.com"]
        );
        assert_eq!(message.subject(), Some("Status"));
        assert_eq!(message.message_id(), Some("abc@example.com"));
        assert_eq!(
            message.date(),
            Some(Utc.with_ymd_and_hms(2013, 6, 24, 9, 37, 36).unwrap())
        );
        assert_eq!(message.body_text().text, "Body\n");
        assert!(message.body_html().is_empty());
        assert!(message.content_type().is("text", "plain"));
        assert_eq!(message.headers().len(), 10);
    }

    #[test]
    fn test_missing_optional_headers() {
        let message = Message::parse("X-Test: 1\n\nbody").unwrap();
        assert!(message.subject().is_none());
        assert!(message.message_id().is_none());
        assert!(message.date().is_none());
        assert!(message.from().is_none());
        assert!(message.recipients().is_empty());
        assert!(message.confirm_read().is_none());
    }

    #[test]
    fn test_unparsable_date_is_none() {
        let message = Message::parse("Date: someday\n\nbody").unwrap();
        assert!(message.date().is_none());
    }

    #[test]
    fn test_receipt_headers() {
        let message = Message::parse(
            "Disposition-Notification-To: <read@example.com>\n\
             Return-Receipt-To: Receipts <receipt@example.com>\n\n",
        )
        .unwrap();
        assert_eq!(message.confirm_read().unwrap().email, "read@example.com");
        assert_eq!(message.return_receipt().unwrap().name, "Receipts");

        let message = Message::parse("X-Confirm-Reading-To: old@example.com\n\nbody").unwrap();
        assert_eq!(message.confirm_read().unwrap().email, "old@example.com");
    }

    #[test]
    fn test_invalid_receipt_headers() {
        let message = Message::parse(
            "Disposition-Notification-To: nobody\n\
             Return-Receipt-To: \"\"\n\n\
             body",
        )
        .unwrap();
        assert!(message.confirm_read().is_none());
        assert!(message.return_receipt().is_none());
        assert!(message.recipients().is_empty());
    }

    #[test]
    fn test_text_body_keeps_first_charset() {
        let mut body = TextBody::default();
        body.append("a", Some("utf-8"));
        body.append("b", Some("iso-8859-1"));
        assert_eq!(body.text, "ab");
        assert_eq!(body.charset.as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_attachment_filenames() {
        let message = Message::parse(
            "Content-Type: multipart/mixed; boundary=m\n\n\
             --m\nContent-Type: application/pdf; name=\"named.pdf\"\n\nA\n\
             --m\nContent-Type: application/pdf\nContent-Disposition: attachment;\n filename*=utf-8''r%C3%A9sum%C3%A9.pdf\n\nB\n\
             --m\nContent-Type: application/vnd.ms-excel\n\nC\n\
             --m\nContent-Type: message/rfc822\n\nSubject: inner\n\ninner body\n\
             --m--\n",
        )
        .unwrap();

        let names: Vec<&str> = message.attachments().iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["named.pdf", "résumé.pdf", "attachment-3.msexcel", "attachment-4.eml"]);
        assert_eq!(message.attachments()[0].content_name.as_deref(), Some("named.pdf"));
        assert!(message.attachments()[1].content_name.is_none());
        assert_eq!(message.attachments()[0].size(), 2);

        let inner = Message::parse(&message.attachments()[3].binary_content).unwrap();
        assert_eq!(inner.subject(), Some("inner"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension(&ContentType::parse("image/jpeg")), "jpg");
        assert_eq!(extension(&ContentType::parse("image/svg+xml")), "svg");
        assert_eq!(extension(&ContentType::parse("application/x-zip")), "zip");
        assert_eq!(extension(&ContentType::parse("application")), "bin");
        assert_eq!(extension(&ContentType::parse("text/html")), "html");
    }

    #[test]
    fn test_attachment_text() {
        let message = Message::parse(
            "Content-Type: multipart/mixed; boundary=m\n\n\
             --m\nContent-Type: text/csv; charset=iso-8859-1\nContent-Disposition: attachment\nContent-Transfer-Encoding: quoted-printable\n\na;=E9\n\
             --m--\n",
        )
        .unwrap();
        assert_eq!(message.attachments()[0].text("utf-8"), "a;é\n");
        assert_eq!(message.attachments()[0].filename, "attachment-1.csv");
    }
}
