//! Core types produced by the unpacker

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything extracted from a single message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Caller-supplied identifier, embedded in every stored attachment name
    pub message_id: String,

    /// File the message was read from (if any)
    pub source: Option<PathBuf>,

    /// Decoded Subject header
    pub subject: String,

    /// Decoded From header, display name included
    pub from: String,

    /// Bare sender address
    pub from_address: String,

    /// Decoded To header
    pub to: String,

    /// Date header as written
    pub date: String,

    /// Date header parsed as RFC 2822, when it could be
    pub date_parsed: Option<DateTime<Utc>>,

    /// Concatenated text/plain leaves
    pub text: String,

    /// Concatenated text/html leaves, untouched
    pub html: String,

    /// Plain text rendered from every HTML leaf
    pub html_text: String,

    /// Original filename -> stored file (last write wins)
    pub files: BTreeMap<String, StoredFile>,

    /// Every persisted attachment in visit order
    pub attachments: Vec<AttachmentRecord>,

    /// Stored path -> extracted text, filled in by [`crate::attach_texts`]
    pub files_text: Option<BTreeMap<PathBuf, String>>,

    /// Number of leaf parts visited
    pub parts: usize,

    /// Problems that degraded the extraction without aborting it
    pub issues: Vec<ExtractionIssue>,
}

impl ExtractionResult {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            ..Self::default()
        }
    }

    /// Fold a child's accumulation into this one, in child order.
    pub fn absorb(&mut self, child: Self) {
        self.text.push_str(&child.text);
        self.html.push_str(&child.html);
        self.html_text.push_str(&child.html_text);
        self.files.extend(child.files);
        self.attachments.extend(child.attachments);
        self.parts += child.parts;
        self.issues.extend(child.issues);
    }

    /// Record a persisted attachment in both the map and the ledger
    pub fn add_attachment(&mut self, record: AttachmentRecord) {
        self.files.insert(
            record.original_name.clone(),
            StoredFile {
                path: record.path.clone(),
                content_id: record.content_id.clone(),
            },
        );
        self.attachments.push(record);
    }

    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.files.is_empty()
    }

    /// Stored paths of the attachments currently in `files`
    pub fn stored_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.values().map(|f| f.path.as_path())
    }

    /// Check if any degradation was recorded
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Where an attachment ended up on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub content_id: Option<String>,
}

/// One persisted attachment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRecord {
    /// Filename as declared by the message, decoded
    pub original_name: String,

    /// Generated unique filename
    pub stored_name: String,

    /// Full path of the stored file
    pub path: PathBuf,

    /// Content-ID without angle brackets
    pub content_id: Option<String>,
}

/// A recoverable problem met during extraction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionIssue {
    /// Payload bytes did not fit their declared charset
    LossyDecode { charset: String },

    /// Nesting went deeper than the configured limit
    DepthLimit { depth: usize },

    /// An attachment could not be written
    AttachmentWrite { filename: String, reason: String },

    /// The transfer encoding of a part could not be undone
    PayloadDecode { reason: String },

    /// An encrypted/opaque part could not be re-parsed
    EncryptedUnwrap { reason: String },

    /// The parser rejected the message
    Malformed { reason: String },
}

impl fmt::Display for ExtractionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LossyDecode { charset } => write!(f, "lossy decode from {charset}"),
            Self::DepthLimit { depth } => write!(f, "nesting truncated at depth {depth}"),
            Self::AttachmentWrite { filename, reason } => {
                write!(f, "could not store {filename}: {reason}")
            }
            Self::PayloadDecode { reason } => write!(f, "payload decode failed: {reason}"),
            Self::EncryptedUnwrap { reason } => {
                write!(f, "could not unwrap encrypted part: {reason}")
            }
            Self::Malformed { reason } => write!(f, "malformed message: {reason}"),
        }
    }
}
