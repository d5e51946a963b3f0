//! Configuration loaded from JSON

use crate::assemble::Field;
use crate::error::{Result, UnpackError};
use crate::normalize::NormalizerConfig;
use crate::parser::WalkerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All tunables of the unpack pipeline; every key is optional
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UnpackConfig {
    pub walker: WalkerConfig,
    pub normalizer: NormalizerConfig,

    /// Fields joined into the corpus, in order
    pub fields: Vec<Field>,
}

impl Default for UnpackConfig {
    fn default() -> Self {
        Self {
            walker: WalkerConfig::default(),
            normalizer: NormalizerConfig::default(),
            fields: vec![Field::Subject, Field::Text, Field::HtmlText, Field::FilesText],
        }
    }
}

impl UnpackConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| UnpackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| UnpackError::io(path, e))?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(UnpackError::Config("no fields selected".into()));
        }
        Ok(())
    }
}
