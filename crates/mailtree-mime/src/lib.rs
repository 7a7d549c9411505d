//! # mailtree-mime
//!
//! Tolerant MIME message decoding.
//!
//! ## Features
//!
//! - **Message view**: text and HTML bodies, attachments, embedded objects,
//!   addresses, dates and receipt headers from one call
//! - **Multipart trees**: recursive boundary splitting with depth and size
//!   limits
//! - **Header parameters**: RFC 2184/2231 continuations and extended values
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words and
//!   charset transcoding
//! - **Lenient by default**: malformed mail degrades to best-effort values
//!
//! ## Quick Start
//!
//! ```
//! use mailtree_mime::Message;
//!
//! let raw = "From: sender@example.com\r\n\
//!            To: recipient@example.com\r\n\
//!            Subject: Test\r\n\
//!            Content-Type: multipart/alternative; boundary=b\r\n\
//!            \r\n\
//!            --b\r\n\
//!            Content-Type: text/plain\r\n\
//!            \r\n\
//!            Hello, World!\r\n\
//!            --b\r\n\
//!            Content-Type: text/html\r\n\
//!            \r\n\
//!            <p>Hello, World!</p>\r\n\
//!            --b--\r\n";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject(), Some("Test"));
//! assert_eq!(message.body_text().text, "Hello, World!\r\n");
//! assert_eq!(message.body_html().text, "<p>Hello, World!</p>\r\n");
//! # Ok::<(), mailtree_mime::Error>(())
//! ```
//!
//! ### Header Parameters
//!
//! ```
//! use mailtree_mime::ContentParameterParser;
//!
//! let mut parser = ContentParameterParser::new();
//! parser.add("URL*0=\"ftp://\";");
//! parser.add("URL*1=\"cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar\"");
//!
//! let parameters = parser.parse();
//! assert_eq!(
//!     parameters.get("url"),
//!     Some("ftp://cs.utk.edu/pub/moore/bulk-mailer/bulk-mailer.tar")
//! );
//! ```
//!
//! ### Limits
//!
//! ```
//! use mailtree_mime::{Message, ParserConfig};
//!
//! let config = ParserConfig::builder().max_depth(4).max_parts(100).build();
//! let message = Message::parse_with_config("Subject: hi\r\n\r\nbody", &config)?;
//! assert_eq!(message.body_text().text, "body");
//! # Ok::<(), mailtree_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod assembler;
mod config;
mod content_type;
mod date;
mod error;
mod header;
mod message;
mod part;

pub mod encoding;
pub mod rfc2184;

pub use address::{Address, parse_address, parse_address_list};
pub use assembler::MultipartAssembler;
pub use config::{
    DEFAULT_FALLBACK_CHARSET, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PARTS, ParserConfig,
    ParserConfigBuilder,
};
pub use content_type::{ContentDisposition, ContentType, DispositionKind};
pub use date::parse_date;
pub use error::{Error, Result};
pub use header::{HeaderField, Headers, split_parameters};
pub use message::{Attachment, Message, TextBody};
pub use part::{MimePart, TransferEncoding, Walk};
pub use rfc2184::{ContentParameterParser, Parameter, ParameterItem, Parameters};
