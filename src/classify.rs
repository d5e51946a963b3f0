//! Classifier seam and the end-to-end pipeline

use crate::assemble::{AssembleMode, Field, assemble_fields};
use crate::attachment_text::{AttachmentTextExtractor, attach_texts};
use crate::config::UnpackConfig;
use crate::error::Result;
use crate::normalize::{NormalizedText, Normalizer};
use crate::parser::Walker;
use crate::store::AttachmentStore;
use crate::types::ExtractionResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Maps cleaned text to a label.
///
/// Implementations wrap a pre-trained model loaded once at startup and must
/// be deterministic for identical text.
pub trait Classifier {
    fn classify(&self, text: &str) -> Result<String>;
}

/// Assemble `fields` into one string and normalize it
#[must_use]
pub fn clean_corpus(
    result: &ExtractionResult,
    fields: &[Field],
    normalizer: &Normalizer,
) -> NormalizedText {
    let corpus = assemble_fields(result, fields, AssembleMode::String).into_string();
    normalizer.normalize(&corpus)
}

/// Outcome of [`Pipeline::process`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedMessage {
    pub extraction: ExtractionResult,
    pub corpus: NormalizedText,

    /// `None` when no classifier is set or it failed
    pub label: Option<String>,
}

/// Unpack, extract attachment text, assemble, normalize and classify
pub struct Pipeline<'a> {
    config: UnpackConfig,
    normalizer: Normalizer,
    extractor: &'a dyn AttachmentTextExtractor,
    classifier: Option<&'a dyn Classifier>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: UnpackConfig, extractor: &'a dyn AttachmentTextExtractor) -> Self {
        Self {
            normalizer: Normalizer::new(&config.normalizer),
            config,
            extractor,
            classifier: None,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: &'a dyn Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn process(&self, raw: &[u8], message_id: &str, output_dir: &Path) -> ProcessedMessage {
        let store = AttachmentStore::new(output_dir);
        let walker = Walker::new(message_id, store, self.config.walker);
        self.finish(walker, raw)
    }

    /// Same as [`Pipeline::process`] with a caller-built store
    pub fn process_with_store(
        &self,
        raw: &[u8],
        message_id: &str,
        store: AttachmentStore,
    ) -> ProcessedMessage {
        self.finish(Walker::new(message_id, store, self.config.walker), raw)
    }

    fn finish(&self, mut walker: Walker, raw: &[u8]) -> ProcessedMessage {
        let mut extraction = walker.unpack(raw);
        attach_texts(&mut extraction, self.extractor);

        let corpus = clean_corpus(&extraction, &self.config.fields, &self.normalizer);

        let label = self.classifier.and_then(|classifier| {
            match classifier.classify(&corpus.text) {
                Ok(label) => {
                    debug!(message_id = %extraction.message_id, %label, "message classified");
                    Some(label)
                }
                Err(e) => {
                    warn!(message_id = %extraction.message_id, error = %e, "classification failed");
                    None
                }
            }
        });

        ProcessedMessage {
            extraction,
            corpus,
            label,
        }
    }
}
