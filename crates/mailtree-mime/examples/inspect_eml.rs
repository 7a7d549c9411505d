#![allow(clippy::uninlined_format_args)]
//! Example: Decode an `.eml` file and print what was found
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=mailtree_mime=debug cargo run --package mailtree-mime --example inspect_eml -- message.eml
//! ```

use anyhow::Context;
use mailtree_mime::{Message, MimePart, ParserConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: inspect_eml <file.eml>")?;
    let raw = std::fs::read(&path).with_context(|| format!("reading {path}"))?;

    let config = ParserConfig::default();
    let message = Message::parse_with_config(&raw, &config)?;

    println!("Subject:    {}", message.subject().unwrap_or("(none)"));
    println!("Message-ID: {}", message.message_id().unwrap_or("(none)"));
    if let Some(from) = message.from() {
        println!("From:       {}", from);
    }
    for recipient in message.recipients() {
        println!("Recipient:  {}", recipient);
    }
    if let Some(date) = message.date() {
        println!("Date:       {}", date.to_rfc3339());
    }
    if let Some(address) = message.confirm_read() {
        println!("Read receipt requested by {}", address);
    }
    println!("Type:       {}", message.content_type().mime_type);

    println!("\nPart tree:");
    print_tree(message.root(), 1);

    println!("\nText body: {} chars", message.body_text().text.chars().count());
    println!("HTML body: {} chars", message.body_html().text.chars().count());

    for attachment in message.attachments() {
        println!(
            "Attachment: {} ({}, {} bytes)",
            attachment.filename,
            attachment.content_type.mime_type,
            attachment.size()
        );
    }
    for object in message.embedded_objects() {
        println!(
            "Embedded:   {} <{}> ({} bytes)",
            object.filename,
            object.content_id.as_deref().unwrap_or_default(),
            object.size()
        );
    }

    Ok(())
}

fn print_tree(part: &MimePart, depth: usize) {
    println!(
        "{:indent$}{}/{} [{}]",
        "",
        part.content_type.main_type,
        part.content_type.sub_type,
        part.transfer_encoding,
        indent = depth * 2
    );
    for child in &part.children {
        print_tree(child, depth + 1);
    }
}
