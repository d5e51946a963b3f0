//! MIME tree walker and top-level unpacking

use crate::charset::{DecodePolicy, decode_bytes};
use crate::error::{Result, UnpackError};
use crate::header::{
    decode_header, extract_address, header_field, strip_angle_brackets, strip_quotes,
};
use crate::html::html_to_text;
use crate::store::AttachmentStore;
use crate::types::{ExtractionIssue, ExtractionResult};
use chrono::{DateTime, Utc};
use mailparse::{MailParseError, ParsedMail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Default nesting limit; real mail rarely goes past 5
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Multipart nesting handed to the MIME parser. It descends recursively
/// while parsing, so input nested deeper than this is cut off beforehand.
pub const PARSE_DEPTH_CEILING: usize = 128;

const ENCRYPTED_FILENAME: &str = "smime.p7m";

static ENCRYPTED_PREAMBLE_REGEX: LazyLock<regex::bytes::Regex> =
    LazyLock::new(|| regex::bytes::Regex::new(r"(?-u).*Content-Type:").unwrap());

static MULTIPART_DECLARATION_REGEX: LazyLock<regex::bytes::Regex> = LazyLock::new(|| {
    regex::bytes::Regex::new(
        concat!(
            r"(?i-u)content-type:[ \t]*multipart/[^\r\n]*(?:\r?\n[ \t][^\r\n]*)*?",
            r#"boundary=(?:"([^"\r\n]+)"|([^\s;"]+))"#,
        ),
    )
    .unwrap()
});

/// Walker settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WalkerConfig {
    /// Nodes nested deeper than this are not visited
    pub max_depth: usize,

    /// How undecodable payload bytes are turned into text
    pub decode_policy: DecodePolicy,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            decode_policy: DecodePolicy::default(),
        }
    }
}

/// Depth-first, pre-order walk over one message
#[derive(Debug)]
pub struct Walker {
    message_id: String,
    store: AttachmentStore,
    config: WalkerConfig,
}

impl Walker {
    pub fn new(
        message_id: impl Into<String>,
        store: AttachmentStore,
        config: WalkerConfig,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            store,
            config,
        }
    }

    /// Parse raw bytes, decode the envelope headers and walk the tree.
    ///
    /// Never fails: input the parser rejects yields its readable headers,
    /// the lossily decoded body as text and a `Malformed` issue. Multipart
    /// nesting past [`PARSE_DEPTH_CEILING`] is dropped with a `DepthLimit`
    /// issue.
    pub fn unpack(&mut self, raw: &[u8]) -> ExtractionResult {
        let (parsed, cut) = self.parse_bounded(raw);
        let mut result = match parsed {
            Ok(parsed) => {
                let mut result = self.walk(&parsed);
                fill_headers(&mut result, &parsed.headers);
                result
            }
            Err(e) => {
                warn!(
                    message_id = %self.message_id,
                    error = %e,
                    "unparseable message, keeping raw body"
                );
                self.fallback(raw, &e.to_string())
            }
        };
        if let Some(depth) = cut {
            result.issues.insert(0, ExtractionIssue::DepthLimit { depth });
        }

        result.text = result.text.trim().to_string();
        result.html = result.html.trim().to_string();
        debug!(
            message_id = %result.message_id,
            parts = result.parts,
            files = result.files.len(),
            issues = result.issues.len(),
            "message unpacked"
        );
        result
    }

    /// Walk an already parsed node
    pub fn walk(&mut self, node: &ParsedMail<'_>) -> ExtractionResult {
        let mut result = ExtractionResult::new(self.message_id.clone());
        result.absorb(self.visit(node, 0));
        result
    }

    fn visit(&mut self, node: &ParsedMail<'_>, depth: usize) -> ExtractionResult {
        let mut acc = ExtractionResult::default();

        if depth > self.config.max_depth {
            warn!(message_id = %self.message_id, depth, "nesting limit reached, subtree skipped");
            acc.issues.push(ExtractionIssue::DepthLimit { depth });
            return acc;
        }

        if let Some(inner) = self.nested_message(node, &mut acc) {
            let (parsed, cut) = self.parse_bounded(&inner);
            if let Some(limit) = cut {
                acc.issues.push(ExtractionIssue::DepthLimit {
                    depth: depth + 1 + limit,
                });
            }
            match parsed {
                Ok(parsed) => {
                    acc.absorb(self.visit(&parsed, depth + 1));
                    return acc;
                }
                Err(e) => {
                    warn!(message_id = %self.message_id, error = %e, "nested message unparseable");
                    acc.issues.push(ExtractionIssue::EncryptedUnwrap {
                        reason: e.to_string(),
                    });
                }
            }
        }

        if node.subparts.is_empty() {
            self.visit_leaf(node, &mut acc);
        } else {
            for child in &node.subparts {
                let child_result = self.visit(child, depth + 1);
                acc.absorb(child_result);
            }
        }

        acc
    }

    /// Bytes to re-parse in place of `node`: opaque S/MIME content or an
    /// embedded `message/rfc822` leaf.
    fn nested_message(
        &self,
        node: &ParsedMail<'_>,
        acc: &mut ExtractionResult,
    ) -> Option<Vec<u8>> {
        let encrypted = declared_filename(node)
            .is_some_and(|name| name.eq_ignore_ascii_case(ENCRYPTED_FILENAME));
        let embedded = node.subparts.is_empty()
            && node.ctype.mimetype.eq_ignore_ascii_case("message/rfc822");
        if !encrypted && !embedded {
            return None;
        }

        match node.get_body_raw() {
            Ok(bytes) if encrypted => {
                debug!(message_id = %self.message_id, "unwrapping encrypted part");
                Some(
                    ENCRYPTED_PREAMBLE_REGEX
                        .replace_all(&bytes, &b"Content-Type:"[..])
                        .into_owned(),
                )
            }
            Ok(bytes) => Some(bytes),
            Err(e) => {
                acc.issues.push(ExtractionIssue::EncryptedUnwrap {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Parse `raw`, first cutting it short before any multipart declaration
    /// nested deeper than [`PARSE_DEPTH_CEILING`]. The second value is the
    /// depth at which the input was cut, if it was.
    fn parse_bounded<'a>(
        &self,
        raw: &'a [u8],
    ) -> (std::result::Result<ParsedMail<'a>, MailParseError>, Option<usize>) {
        match nesting_cutoff(raw, PARSE_DEPTH_CEILING) {
            Some(offset) => {
                warn!(
                    message_id = %self.message_id,
                    offset,
                    limit = PARSE_DEPTH_CEILING,
                    "multipart nesting too deep, input cut short"
                );
                (mailparse::parse_mail(&raw[..offset]), Some(PARSE_DEPTH_CEILING))
            }
            None => (mailparse::parse_mail(raw), None),
        }
    }

    fn visit_leaf(&mut self, node: &ParsedMail<'_>, acc: &mut ExtractionResult) {
        acc.parts += 1;
        let mimetype = node.ctype.mimetype.to_lowercase();

        if let Some(filename) = node
            .get_content_disposition()
            .params
            .get("filename")
            .filter(|f| !f.trim().is_empty())
        {
            let name = decode_header(&strip_quotes(filename));
            self.save_attachment(node, &name, acc);
        } else if mimetype == "text/plain" {
            if let Some(text) = self.payload_text(node, acc) {
                debug!(message_id = %self.message_id, len = text.len(), "text leaf");
                acc.text.push_str(&text);
            }
        } else if mimetype == "text/html" {
            if let Some(html) = self.payload_text(node, acc) {
                debug!(message_id = %self.message_id, len = html.len(), "html leaf");
                acc.html_text.push_str(&html_to_text(&html));
                acc.html.push_str(&html);
            }
        } else if let Some(name) = node.ctype.params.get("name").filter(|n| !n.trim().is_empty()) {
            let name = decode_header(&strip_quotes(name));
            self.save_attachment(node, &name, acc);
        } else {
            debug!(message_id = %self.message_id, %mimetype, "leaf without usable content");
        }
    }

    fn save_attachment(&mut self, node: &ParsedMail<'_>, name: &str, acc: &mut ExtractionResult) {
        let Some(bytes) = payload_bytes(&self.message_id, node, acc) else {
            return;
        };

        match self
            .store
            .store(&self.message_id, name, content_id(node), &bytes)
        {
            Ok(record) => acc.add_attachment(record),
            Err(e) => {
                warn!(
                    message_id = %self.message_id,
                    filename = %name,
                    error = %e,
                    "failed to store attachment"
                );
                acc.issues.push(ExtractionIssue::AttachmentWrite {
                    filename: name.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    fn payload_text(&self, node: &ParsedMail<'_>, acc: &mut ExtractionResult) -> Option<String> {
        let bytes = payload_bytes(&self.message_id, node, acc)?;
        let charset = &node.ctype.charset;
        let decoded = decode_bytes(&bytes, Some(charset.as_str()), self.config.decode_policy);
        if decoded.lossy {
            warn!(
                message_id = %self.message_id,
                %charset,
                policy = ?self.config.decode_policy,
                "payload did not fit its charset"
            );
            acc.issues.push(ExtractionIssue::LossyDecode {
                charset: charset.clone(),
            });
        }
        Some(decoded.text)
    }

    fn fallback(&self, raw: &[u8], reason: &str) -> ExtractionResult {
        let mut result = ExtractionResult::new(self.message_id.clone());
        result.issues.push(ExtractionIssue::Malformed {
            reason: reason.to_string(),
        });

        let body = match mailparse::parse_headers(raw) {
            Ok((headers, offset)) => {
                fill_headers(&mut result, &headers);
                raw.get(offset..).unwrap_or_default()
            }
            Err(_) => raw,
        };
        result.text = decode_bytes(body, None, self.config.decode_policy).text;
        result
    }
}

/// Walk a parsed message with default settings, storing attachments in `output_dir`.
pub fn walk(node: &ParsedMail<'_>, message_id: &str, output_dir: &Path) -> ExtractionResult {
    Walker::new(message_id, AttachmentStore::new(output_dir), WalkerConfig::default()).walk(node)
}

/// Unpack raw message bytes; see [`Walker::unpack`].
pub fn unpack(
    raw: &[u8],
    message_id: &str,
    output_dir: &Path,
    config: &WalkerConfig,
) -> ExtractionResult {
    Walker::new(message_id, AttachmentStore::new(output_dir), *config).unpack(raw)
}

/// Read a message file and unpack it. Only the read itself can fail.
pub fn unpack_file(
    path: &Path,
    message_id: &str,
    output_dir: &Path,
    config: &WalkerConfig,
) -> Result<ExtractionResult> {
    let raw = std::fs::read(path).map_err(|e| UnpackError::io(path, e))?;
    let mut result = unpack(&raw, message_id, output_dir, config);
    result.source = Some(path.to_path_buf());
    Ok(result)
}

fn fill_headers(result: &mut ExtractionResult, headers: &[mailparse::MailHeader]) {
    result.subject = header_field(headers, "subject");
    result.from = header_field(headers, "from");
    result.to = header_field(headers, "to");
    result.date = header_field(headers, "date");
    result.from_address = extract_address(&result.from);
    result.date_parsed = parse_date(&result.date);
}

fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    if date.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(date)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            mailparse::dateparse(date)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0))
        })
}

/// Filename from Content-Disposition, else the Content-Type `name` parameter
fn declared_filename(node: &ParsedMail<'_>) -> Option<String> {
    node.get_content_disposition()
        .params
        .get("filename")
        .or_else(|| node.ctype.params.get("name"))
        .map(|name| decode_header(&strip_quotes(name)))
}

fn content_id(node: &ParsedMail<'_>) -> Option<String> {
    node.headers
        .iter()
        .find(|h| h.get_key().eq_ignore_ascii_case("content-id"))
        .map(|h| strip_angle_brackets(&h.get_value()))
        .filter(|id| !id.is_empty())
}

fn payload_bytes(
    message_id: &str,
    node: &ParsedMail<'_>,
    acc: &mut ExtractionResult,
) -> Option<Vec<u8>> {
    match node.get_body_raw() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(%message_id, error = %e, "could not undo transfer encoding");
            acc.issues.push(ExtractionIssue::PayloadDecode {
                reason: e.to_string(),
            });
            None
        }
    }
}

/// Offset of the first multipart declaration nested more than `ceiling`
/// containers deep.
///
/// A container spans from its declaration to its closing `--boundary--`
/// line, or to the end of input when that is missing, so truncated input
/// over-counts rather than under-counts.
fn nesting_cutoff(raw: &[u8], ceiling: usize) -> Option<usize> {
    // Closing offsets of the containers enclosing the scan position
    let mut open: Vec<usize> = Vec::new();

    for caps in MULTIPART_DECLARATION_REGEX.captures_iter(raw) {
        let boundary = caps.get(1).or_else(|| caps.get(2));
        let (Some(declaration), Some(boundary)) = (caps.get(0), boundary) else {
            continue;
        };

        while open.last().is_some_and(|&end| end <= declaration.start()) {
            open.pop();
        }
        if open.len() >= ceiling {
            return Some(declaration.start());
        }

        let closing = [&b"--"[..], boundary.as_bytes(), &b"--"[..]].concat();
        open.push(find_from(raw, declaration.end(), &closing).unwrap_or(raw.len()));
    }
    None
}

fn find_from(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| from + i)
}
