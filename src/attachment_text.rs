//! Attachment text extraction: the collaborator contract and a plain-text implementation

use crate::charset::{DecodePolicy, decode_bytes, decode_latin1};
use crate::error::{Result, UnpackError};
use crate::html::strip_tags;
use crate::types::ExtractionResult;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Turns a stored attachment into text
pub trait AttachmentTextExtractor {
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Handles text-like files itself; anything else is unsupported.
///
/// Documents and images (PDF, Office, OCR) need a dedicated extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl AttachmentTextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let read = || std::fs::read(path).map_err(|e| UnpackError::io(path, e));

        match ext.as_str() {
            "txt" => Ok(decode_latin1(&read()?)),
            "xml" | "htm" | "html" => {
                let text = decode_bytes(&read()?, None, DecodePolicy::Windows1252).text;
                Ok(strip_tags(&text))
            }
            "csv" | "tsv" | "json" | "log" => {
                Ok(decode_bytes(&read()?, None, DecodePolicy::Replace).text)
            }
            _ => Err(UnpackError::Extractor {
                path: path.to_path_buf(),
                reason: format!("unsupported file type '{ext}'"),
            }),
        }
    }
}

/// Run `extractor` once per stored attachment and record the texts.
///
/// A failing attachment contributes an empty string and a warning; its
/// siblings are unaffected.
pub fn attach_texts(result: &mut ExtractionResult, extractor: &dyn AttachmentTextExtractor) {
    if result.attachments.is_empty() {
        return;
    }

    let mut texts = BTreeMap::new();
    for record in &result.attachments {
        let text = match extractor.extract(&record.path) {
            Ok(text) => {
                debug!(
                    path = %record.path.display(),
                    len = text.len(),
                    "attachment text extracted"
                );
                text
            }
            Err(e) => {
                warn!(
                    path = %record.path.display(),
                    error = %e,
                    "no text extracted from attachment"
                );
                String::new()
            }
        };
        texts.insert(record.path.clone(), text);
    }
    result.files_text = Some(texts);
}
