// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

//! Email Unpacker
//!
//! Turns raw RFC 822 / MIME messages into structured, classifier-ready text.
//!
//! # Features
//!
//! - Recursive MIME walk with a depth cutoff, never failing on bad input
//! - RFC 2047 header decoding and bare address extraction
//! - Collision-free, write-once attachment storage
//! - Field selection and concatenation into a corpus
//! - Ordered redaction of dates, times, amounts, id numbers and numbers
//!
//! # Example
//!
//! ```rust
//! use email_unpack::{Field, Normalizer, WalkerConfig, clean_corpus, unpack};
//! use std::path::Path;
//!
//! let raw = concat!(
//!     "From: Jens <jens@example.dk>\r\nSubject: Invoice 123\r\n\r\n",
//!     "Pay 1.234,56 before 01-02-2024",
//! );
//! let config = WalkerConfig::default();
//! let result = unpack(raw.as_bytes(), "msg-1", Path::new("attachments"), &config);
//!
//! let corpus = clean_corpus(&result, &[Field::Subject, Field::Text], &Normalizer::default());
//! assert_eq!(corpus.text, "Invoice NUMBER Pay AMOUNT before DATE");
//! ```

mod assemble;
mod attachment_text;
mod charset;
mod classify;
mod config;
mod error;
mod header;
mod html;
mod normalize;
mod parser;
mod store;
mod types;

pub use assemble::{AssembleMode, Assembled, Field, assemble, assemble_fields, fragments};
pub use attachment_text::{AttachmentTextExtractor, PlainTextExtractor, attach_texts};
pub use charset::{DecodePolicy, Decoded, decode_bytes, encoding_for};
pub use classify::{Classifier, Pipeline, ProcessedMessage, clean_corpus};
pub use config::UnpackConfig;
pub use error::{Result, UnpackError};
pub use header::{decode_header, extract_address, strip_angle_brackets, strip_quotes};
pub use html::{html_to_text, strip_tags};
pub use normalize::*;
pub use parser::{
    DEFAULT_MAX_DEPTH, PARSE_DEPTH_CEILING, Walker, WalkerConfig, unpack, unpack_file, walk,
};
pub use store::{
    AttachmentStore, IdFn, IdSource, PersistOutcome, RandomIds, exists, persist, sanitize_filename,
    stored_name,
};
pub use types::*;
