//! Header decoding: RFC 2047 encoded-words and bare address extraction

use crate::charset::{DecodePolicy, decode_bytes};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use regex::Regex;
use std::sync::LazyLock;

static ENCODED_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\?([^?\s]+)\?([bBqQ])\?([^?\s]*)\?=").unwrap());

/// Decode every RFC 2047 encoded-word in a header value.
///
/// Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2),
/// and adjacent words in the same charset are decoded as one byte run so a
/// character split across them survives. Words that cannot be decoded are
/// kept as written, so this never fails.
#[must_use]
pub fn decode_header(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.contains("=?") {
        return raw.to_string();
    }

    let mut result = String::with_capacity(raw.len());
    let mut run: Option<(String, Vec<u8>)> = None;
    let mut last_end = 0;

    for caps in ENCODED_WORD_REGEX.captures_iter(raw) {
        let (Some(word), Some(charset), Some(encoding), Some(payload)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        let gap = &raw[last_end..word.start()];
        last_end = word.end();

        // RFC 2231 language suffix: charset*lang
        let charset = charset.as_str().split('*').next().unwrap_or_default();
        let Some(bytes) = decode_payload(encoding.as_str(), payload.as_str()) else {
            flush(&mut result, run.take());
            result.push_str(gap);
            result.push_str(word.as_str());
            continue;
        };

        let adjacent = gap.trim().is_empty();
        match &mut run {
            Some((current, pending)) if adjacent && current.eq_ignore_ascii_case(charset) => {
                pending.extend_from_slice(&bytes);
            }
            _ => {
                let adjacent = adjacent && run.is_some();
                flush(&mut result, run.take());
                if !adjacent {
                    result.push_str(gap);
                }
                run = Some((charset.to_string(), bytes));
            }
        }
    }

    flush(&mut result, run);
    result.push_str(&raw[last_end..]);
    result
}

fn flush(out: &mut String, run: Option<(String, Vec<u8>)>) {
    if let Some((charset, bytes)) = run {
        out.push_str(&decode_bytes(&bytes, Some(&charset), DecodePolicy::Replace).text);
    }
}

/// Undo the B or Q encoding of one word's payload
fn decode_payload(encoding: &str, payload: &str) -> Option<Vec<u8>> {
    if encoding.eq_ignore_ascii_case("b") {
        STANDARD_NO_PAD.decode(payload.trim_end_matches('=')).ok()
    } else {
        Some(decode_q(payload))
    }
}

/// Q encoding: `_` is a space, `=XX` a hex byte; a broken escape is kept literally.
fn decode_q(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'=')
            .then(|| bytes.get(i + 1..i + 3))
            .flatten()
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match (escaped, bytes[i]) {
            (Some(byte), _) => {
                out.push(byte);
                i += 3;
            }
            (None, b'_') => {
                out.push(b' ');
                i += 1;
            }
            (None, b) => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Extract the bare address from a `Display Name <addr>` field.
///
/// Returns an empty string when no address can be found.
#[must_use]
pub fn extract_address(raw_field: &str) -> String {
    let decoded = decode_header(raw_field);
    if decoded.is_empty() {
        return String::new();
    }

    let parsed = mailparse::addrparse(&decoded).ok().and_then(|list| {
        list.iter().find_map(|addr| match addr {
            mailparse::MailAddr::Single(info) => Some(info.addr.clone()),
            mailparse::MailAddr::Group(group) => group.addrs.first().map(|i| i.addr.clone()),
        })
    });

    match parsed {
        Some(addr) if !addr.trim().is_empty() => addr.trim().to_string(),
        _ => scan_address(&decoded),
    }
}

/// Permissive fallback for fields mailparse refuses
fn scan_address(s: &str) -> String {
    if let Some(start) = s.find('<')
        && let Some(len) = s[start..].find('>')
    {
        let inner = s[start + 1..start + len].trim();
        if inner.contains('@') {
            return inner.to_string();
        }
    }

    s.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|token| token.trim_matches(|c: char| matches!(c, '"' | '\'' | '<' | '>' | '(' | ')')))
        .find(|token| token.contains('@'))
        .unwrap_or_default()
        .to_string()
}

/// Remove one pair of surrounding angle brackets (Content-ID values).
#[must_use]
pub fn strip_angle_brackets(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(s)
        .to_string()
}

/// Remove one pair of surrounding single or double quotes.
#[must_use]
pub fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2
            && let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    s.to_string()
}

/// First value of a header, unfolded, decoded and trimmed; empty when absent.
///
/// Raw 8-bit header bytes are read as UTF-8 and fall back to windows-1252.
#[must_use]
pub fn header_field(headers: &[mailparse::MailHeader], name: &str) -> String {
    headers
        .iter()
        .find(|h| h.get_key().eq_ignore_ascii_case(name))
        .map(|h| {
            let raw = decode_bytes(h.get_value_raw(), None, DecodePolicy::Windows1252).text;
            decode_header(&unfold(&raw))
        })
        .unwrap_or_default()
}

fn unfold(value: &str) -> String {
    value.replace("\r\n", "").replace('\n', "")
}
