//! Integration tests for the message decoder.
//!
//! Each fixture under `tests/fixtures/` is a complete message as it would
//! be handed over by a mail store or retrieval client.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use mailtree_mime::{Error, Message, ParserConfig};

fn fixture(bytes: &[u8]) -> Message {
    Message::parse(bytes).unwrap()
}

#[test]
fn test_inline_html_parts_are_appended() {
    let message = fixture(include_bytes!("fixtures/inline_html_parts.eml"));

    assert_eq!(
        message.body_html().text,
        "<html><body><p>Thank you for your order.</p></body></html>\r\n\
         <p>This e-mail is confidential.</p>\r\n"
    );
    assert!(message.body_text().is_empty());
    assert_eq!(message.attachments().len(), 1);
    assert_eq!(message.attachments()[0].filename, "invoice.pdf");
    assert_eq!(message.attachments()[0].binary_content, b"%PDF-1.4\n");
    assert_eq!(message.message_id(), Some("order-4711@example.com"));
    assert_eq!(
        message.date(),
        Some(Utc.with_ymd_and_hms(2013, 6, 25, 12, 2, 11).unwrap())
    );
    assert!(
        String::from_utf8_lossy(&message.root().preamble).starts_with("This is a multi-part")
    );
}

#[test]
fn test_japanese_content_name() {
    let message = fixture(include_bytes!("fixtures/japanese_attachment.eml"));

    assert_eq!(message.attachments().len(), 1);
    let attachment = &message.attachments()[0];
    assert_eq!(attachment.content_name.as_deref(), Some("大阪瓦斯9532.pdf"));
    assert_eq!(attachment.filename, "大阪瓦斯9532.pdf");
    assert_eq!(message.subject(), Some("大阪瓦斯 9532"));
    assert_eq!(message.from().unwrap().name, "大阪瓦斯");
    assert_eq!(message.body_text().text, "See attachment.\r\n");
}

#[test]
fn test_notepad_line_breaks() {
    let message = fixture(include_bytes!("fixtures/notepad_line_breaks.eml"));

    assert!(message.body_html().text.trim().is_empty());
    assert!(message.body_text().text.starts_with("First line\rSecond line"));
    assert_eq!(message.subject(), Some("Saved from Notepad"));
    assert_eq!(message.to().len(), 1);
}

#[test]
fn test_inline_text_parts_keep_their_line_breaks() {
    let message = fixture(include_bytes!("fixtures/text_multipart_disclaimer.eml"));

    assert_eq!(
        message.body_text().text,
        "Good morning,\r\nThis is the body of the message.\r\n\r\nThis is the attached disclamer\r\n"
    );
    assert!(message.body_html().is_empty());
    assert!(message.attachments().is_empty());
}

#[test]
fn test_quoted_printable_notepad_part() {
    let message = fixture(include_bytes!("fixtures/qp_notepad_multipart.eml"));

    assert_eq!(
        message.body_text().text,
        "Alatur,\r\rFoi criada uma nova solicitação para TESTE SOLICITANTE.\r\r\
         Cliente: TESTE HOTEL\rPagamento.: FATURADO\r\r\
         EMAIL AUTOMÁTICO, NÃO RESPONDA ESSA MENSAGEM\r\n"
    );
    assert_eq!(message.body_html().text, "");
    assert_eq!(message.body_text().charset.as_deref(), Some("iso-8859-1"));
}

#[test]
fn test_attachment_without_filename() {
    let message = fixture(include_bytes!("fixtures/attachment_without_filename.eml"));

    assert_eq!(message.attachments().len(), 2);
    let names: Vec<&str> = message.attachments().iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["attachment-1.bin", "attachment-2.jpg"]);
    assert!(message.attachments().iter().all(|a| a.content_name.is_none()));
    assert_eq!(message.attachments()[0].binary_content, [0, 1, 2, 3, 4]);
    assert!(message.attachments()[1].binary_content.starts_with(&[0xFF, 0xD8]));
    assert_eq!(message.body_text().text, "Body text.\r\n");
}

#[test]
fn test_invalid_confirm_read_and_return_receipt() {
    let message = fixture(include_bytes!("fixtures/invalid_receipts.eml"));

    assert!(message.confirm_read().is_none());
    assert!(message.return_receipt().is_none());
    assert_eq!(message.recipients().len(), 0);
    assert_eq!(message.body_text().text, "Body text.\r\n");
}

#[test]
fn test_images_as_embedded_objects() {
    let message = fixture(include_bytes!("fixtures/embedded_images.eml"));

    assert_eq!(message.message_id(), Some("pics.123@example.com"));
    assert_eq!(message.to().len(), 1);
    assert_eq!(message.to()[0].name, "Reader");
    assert_eq!(message.embedded_objects().len(), 2);
    assert_eq!(message.attachments().len(), 0);

    let ids: Vec<_> = message
        .embedded_objects()
        .iter()
        .map(|e| e.content_id.as_deref().unwrap())
        .collect();
    assert_eq!(ids, vec!["image001.png@01CE70D8", "image002.gif@01CE70D8"]);
    assert!(message.embedded_objects()[0].binary_content.starts_with(b"\x89PNG"));
    assert_eq!(message.embedded_objects()[1].filename, "image002.gif");
    assert!(message.content_type().is("multipart", "related"));
}

#[test]
fn test_content_type_without_subtype() {
    let message = fixture(include_bytes!("fixtures/no_subtype.eml"));

    assert!(!message.body_text().text.trim().is_empty());
    assert!(message.body_html().text.trim().is_empty());
    assert_eq!(message.content_type().main_type, "text");
    assert_eq!(message.content_type().sub_type, "plain");
    assert_eq!(message.content_type().mime_type, "text");
}

#[test]
fn test_windows_1252_eight_bit_body() {
    let message = fixture(include_bytes!("fixtures/windows_1252.eml"));

    assert_eq!(message.body_text().text, "Café crème: 3 €\r\n");
    assert_eq!(message.body_text().charset.as_deref(), Some("windows-1252"));
}

#[test]
fn test_iphone_multilevel_related() {
    let message = fixture(include_bytes!("fixtures/iphone_related.eml"));

    assert_eq!(message.message_id(), Some("C0FFEE-1@example.com"));
    assert_eq!(message.body_text().text, "Look at this\r\n\r\nSent from my iPhone\r\n");
    assert!(message.body_html().text.contains("cid:photo-1@example.com"));
    assert!(message.body_html().text.ends_with("Sent from my iPhone</body></html>\r\n"));
    assert_eq!(message.embedded_objects().len(), 1);
    assert_eq!(message.embedded_objects()[0].filename, "photo.jpg");
    assert!(message.attachments().is_empty());

    let root = message.root();
    assert!(root.content_type.is("multipart", "alternative"));
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[1].children.len(), 3);
    assert_eq!(root.walk().count(), 4);
}

#[test]
fn test_rfc2231_continued_filename() {
    let message = fixture(include_bytes!("fixtures/rfc2231_filename.eml"));

    let attachment = &message.attachments()[0];
    assert_eq!(attachment.filename, "Quarterly Report — Q3.pdf");
    let disposition = attachment.disposition.as_ref().unwrap();
    assert_eq!(
        disposition.parameters.get("filename"),
        Some("Quarterly%20Report%20%E2%80%94%20Q3.pdf")
    );
    assert_eq!(message.body_text().text, "See attached.\n");
}

#[test]
fn test_nested_multipart_depth_limit() {
    let mut raw = String::from("Subject: deep\r\n");
    for level in 0..40 {
        raw.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=level{level}\r\n\r\n--level{level}\r\n"
        ));
    }
    raw.push_str("\r\ninnermost\r\n");

    assert!(matches!(
        Message::parse(&raw),
        Err(Error::DepthExceeded { limit: 32 })
    ));

    let config = ParserConfig::builder().max_depth(64).build();
    let message = Message::parse_with_config(&raw, &config).unwrap();
    assert_eq!(message.body_text().text, "innermost\r\n");
}

#[test]
fn test_empty_input() {
    assert!(matches!(Message::parse(b""), Err(Error::EmptyMessage)));
}
