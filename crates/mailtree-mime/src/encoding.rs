//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words, RFC 2231
//! percent-encoded parameter values, and charset transcoding. Every
//! body-level decoder here is tolerant: malformed input is passed
//! through rather than rejected.

use crate::config::DEFAULT_FALLBACK_CHARSET;
use crate::error::Result;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use charset::Charset;

/// Base64 engine that accepts missing padding and stray trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes Base64 data, ignoring whitespace and padding irregularities.
///
/// # Errors
///
/// Returns an error if the input contains characters outside the Base64
/// alphabet or has an impossible length.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Decodes a Base64 transfer-encoded body.
///
/// Characters outside the alphabet are dropped. Padding in the middle of
/// the stream (concatenated encoder output) restarts decoding, and a
/// dangling single character at the end of a run is discarded.
#[must_use]
pub fn decode_base64_body(data: &[u8]) -> Vec<u8> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();

    let mut decoded = Vec::with_capacity(cleaned.len() / 4 * 3 + 3);
    for run in cleaned.split(|&b| b == b'=').filter(|run| !run.is_empty()) {
        let usable = if run.len() % 4 == 1 {
            &run[..run.len() - 1]
        } else {
            run
        };
        if let Err(e) = LENIENT.decode_vec(usable, &mut decoded) {
            tracing::debug!(?e, len = usable.len(), "Skipping undecodable base64 run");
        }
    }
    decoded
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are recognised after `=` for `\r\n`, bare `\n` and
/// bare `\r`, optionally preceded by trailing whitespace. An `=` that does
/// not start a valid escape is kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, possibly with whitespace before the break
        let mut j = i + 1;
        while j < data.len() && matches!(data[j], b' ' | b'\t') {
            j += 1;
        }
        match (data.get(j), data.get(j + 1)) {
            (Some(b'\r'), Some(b'\n')) => {
                i = j + 2;
                continue;
            }
            (Some(b'\r' | b'\n'), _) => {
                i = j + 1;
                continue;
            }
            (None, _) => {
                i = j;
                continue;
            }
            _ => {}
        }

        // Hex encoded byte
        match (
            data.get(i + 1).copied().and_then(hex_value),
            data.get(i + 2).copied().and_then(hex_value),
        ) {
            (Some(high), Some(low)) => {
                result.push((high << 4) | low);
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decodes RFC 2231 percent-encoded octets. Invalid escapes pass through.
#[must_use]
pub fn decode_percent(text: &str) -> Vec<u8> {
    percent_encoding::percent_decode_str(text).collect()
}

/// Transcodes `bytes` into a string using the declared charset label.
///
/// Without a usable label the octets are read as UTF-8 when valid and as
/// `fallback` otherwise. Undecodable sequences become U+FFFD; this never
/// fails.
#[must_use]
pub fn decode_charset(bytes: &[u8], label: Option<&str>, fallback: &str) -> String {
    let label = label
        .map(|l| l.trim().trim_matches('"').trim())
        .filter(|l| !l.is_empty());

    if let Some(label) = label {
        // Mislabelled UTF-8 is far more common than genuine 8-bit ASCII
        if is_ascii_label(label) {
            if let Ok(text) = std::str::from_utf8(bytes) {
                return text.to_string();
            }
        }

        if let Some(charset) = Charset::for_label(label.as_bytes()) {
            let (text, malformed) = charset.decode_without_bom_handling(bytes);
            if malformed {
                tracing::trace!(charset = label, "Replaced malformed sequences");
            }
            return text.into_owned();
        }
        tracing::debug!(charset = label, fallback, "Unknown charset, using fallback");
    }

    decode_fallback(bytes, fallback)
}

fn is_ascii_label(label: &str) -> bool {
    ["us-ascii", "ascii", "ansi_x3.4-1968", "7bit"]
        .iter()
        .any(|l| label.eq_ignore_ascii_case(l))
}

fn decode_fallback(bytes: &[u8], fallback: &str) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    Charset::for_label(fallback.as_bytes()).map_or_else(
        || charset::decode_latin1(bytes).into_owned(),
        |charset| charset.decode_without_bom_handling(bytes).0.into_owned(),
    )
}

/// Decodes raw header octets: UTF-8 when valid, Latin-1 otherwise.
#[must_use]
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => charset::decode_latin1(bytes).into_owned(),
    }
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Format: `=?charset?encoding?encoded-text?=`. Whitespace between two
/// adjacent encoded words is dropped. Words that do not parse are kept
/// verbatim.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }

    out.push_str(rest);
    out
}

/// Decodes one encoded word at the start of `word`, returning the text and
/// the number of bytes consumed.
fn decode_encoded_word(word: &str) -> Option<(String, usize)> {
    let inner = word.strip_prefix("=?")?;
    let (charset, after_charset) = inner.split_once('?')?;
    let (encoding, after_encoding) = after_charset.split_once('?')?;
    let end = after_encoding.find("?=")?;
    let encoded = &after_encoding[..end];

    if charset.is_empty() || encoded.contains(char::is_whitespace) {
        return None;
    }

    // RFC 2231 allows a language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "B" | "b" => LENIENT.decode(encoded.trim_end_matches('=')).ok()?,
        "Q" | "q" => decode_quoted_printable(encoded.replace('_', " ").as_bytes()),
        _ => return None,
    };

    let consumed = word.len() - after_encoding.len() + end + 2;
    Some((
        decode_charset(&bytes, Some(charset), DEFAULT_FALLBACK_CHARSET),
        consumed,
    ))
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
    fn test_base64_decode() {
        let decoded = decode_base64(b"SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_ignores_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxk\nIQ").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_rejects_garbage() {
        assert!(decode_base64(b"SGVs*bG8").is_err());
    }

    #[test]
    fn test_base64_body_tolerates_noise() {
        let decoded = decode_base64_body(b"SGVsbG8s\r\n IFdvcmxk\r\n IQ==\r\n");
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_body_concatenated_runs() {
        // "Hi" and "there" encoded separately, then glued together
        let decoded = decode_base64_body(b"SGk=dGhlcmU=");
        assert_eq!(decoded, b"Hithere");
    }

    #[test]
    fn test_base64_body_dangling_char() {
        let decoded = decode_base64_body(b"SGVsbG8hX");
        assert_eq!(decoded, b"Hello!");
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo"),
            "Héllo".as_bytes()
        );
        assert_eq!(decode_quoted_printable(b"h=c3=a9"), "hé".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_breaks() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\rWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello= \t\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"trailing="), b"trailing");
    }

    #[test]
    fn test_quoted_printable_keeps_invalid_escapes() {
        assert_eq!(decode_quoted_printable(b"a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable(b"50% = half"), b"50% = half");
    }

    #[test]
    fn test_quoted_printable_preserves_hard_breaks() {
        assert_eq!(decode_quoted_printable(b"one\rtwo\nthree\r\n"), b"one\rtwo\nthree\r\n");
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(decode_percent("This%20is%20%2A%2A%2Afun"), b"This is ***fun");
        assert_eq!(decode_percent("100%"), b"100%");
    }

    #[test]
    fn test_charset_known_label() {
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], Some("iso-8859-1"), "utf-8"), "café");
        assert_eq!(decode_charset(&[0x80], Some("windows-1252"), "utf-8"), "€");
    }

    #[test]
    fn test_charset_unknown_label_falls_back() {
        assert_eq!(decode_charset("héllo".as_bytes(), Some("x-unknown"), "windows-1252"), "héllo");
        assert_eq!(decode_charset(&[0x68, 0xE9], Some("x-unknown"), "windows-1252"), "hé");
    }

    #[test]
    fn test_charset_absent_label() {
        assert_eq!(decode_charset("naïve".as_bytes(), None, "windows-1252"), "naïve");
        assert_eq!(decode_charset(&[0x6E, 0xEF], Some("  "), "windows-1252"), "nï");
    }

    #[test]
    fn test_charset_ascii_label_with_utf8_content() {
        assert_eq!(decode_charset("Grüße".as_bytes(), Some("us-ascii"), "windows-1252"), "Grüße");
    }

    #[test]
    fn test_header_bytes() {
        assert_eq!(decode_header_bytes("Solicitação".as_bytes()), "Solicitação");
        assert_eq!(decode_header_bytes(&[0x53, 0xE3, 0x6F]), "São");
    }

    #[test]
    fn test_rfc2047_plain_passthrough() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("a =? b"), "a =? b");
    }

    #[test]
    fn test_rfc2047_base64() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_rfc2047("=?ISO-8859-1?q?caf=E9?="), "café");
    }

    #[test]
    fn test_rfc2047_mixed_with_text() {
        assert_eq!(decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?= now"), "Re: café now");
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?Sol?= \r\n =?utf-8?Q?icita=C3=A7=C3=A3o?="),
            "Solicitação"
        );
    }

    #[test]
    fn test_rfc2047_language_suffix() {
        assert_eq!(decode_rfc2047("=?US-ASCII*EN?Q?Keith_Moore?="), "Keith Moore");
    }

    #[test]
    fn test_rfc2047_iso_2022_jp() {
        assert_eq!(
            decode_rfc2047("=?ISO-2022-JP?B?GyRCQmc6ZTQkO1sbKEI5NTMyLnBkZg==?="),
            "大阪瓦斯9532.pdf"
        );
    }

    #[test]
    fn test_rfc2047_malformed_kept() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("=?utf-8?B?abc"), "=?utf-8?B?abc");
    }
}
