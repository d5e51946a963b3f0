//! Corpus assembly: picks fields of an [`ExtractionResult`] and joins them

use crate::error::UnpackError;
use crate::types::ExtractionResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A field of an extraction result that can feed the corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Subject,
    From,
    To,
    Date,
    Text,
    Html,
    HtmlText,
    Parts,
    /// Original attachment filenames, not their content
    Files,
    /// Text extracted from the stored attachments
    #[serde(alias = "files_texts")]
    FilesText,
}

impl Field {
    pub const ALL: [Self; 10] = [
        Self::Subject,
        Self::From,
        Self::To,
        Self::Date,
        Self::Text,
        Self::Html,
        Self::HtmlText,
        Self::Parts,
        Self::Files,
        Self::FilesText,
    ];

    /// Look a key up by name; unknown keys give `None`
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase();
        if key == "files_texts" {
            return Some(Self::FilesText);
        }
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::From => "from",
            Self::To => "to",
            Self::Date => "date",
            Self::Text => "text",
            Self::Html => "html",
            Self::HtmlText => "html_text",
            Self::Parts => "parts",
            Self::Files => "files",
            Self::FilesText => "files_text",
        }
    }

    /// This field's fragment, or `None` when the result has nothing for it
    #[must_use]
    pub fn fragment(self, result: &ExtractionResult) -> Option<String> {
        match self {
            Self::Subject => Some(result.subject.clone()),
            Self::From => Some(result.from.clone()),
            Self::To => Some(result.to.clone()),
            Self::Date => Some(result.date.clone()),
            Self::Text => Some(result.text.clone()),
            Self::Html => Some(result.html.clone()),
            Self::HtmlText => Some(result.html_text.clone()),
            Self::Parts => Some(result.parts.to_string()),
            Self::Files => result.has_attachments().then(|| {
                result
                    .files
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
            Self::FilesText => result.files_text.as_ref().map(|texts| {
                result
                    .attachments
                    .iter()
                    .filter_map(|a| texts.get(&a.path).map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            }),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnpackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnpackError::Config(format!("unknown field: {s}")))
    }
}

/// Shape of the assembled corpus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssembleMode {
    /// One space-joined string
    #[default]
    String,
    /// One fragment per selected field, for feature stacking
    List,
}

/// Output of [`assemble`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    Joined(String),
    Fragments(Vec<String>),
}

impl Assembled {
    /// Collapse either shape into a single string
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Joined(s) => s,
            Self::Fragments(parts) => parts.join(" "),
        }
    }
}

/// Fragments for `fields`, in the given order
#[must_use]
pub fn fragments(result: &ExtractionResult, fields: &[Field]) -> Vec<String> {
    fields.iter().filter_map(|f| f.fragment(result)).collect()
}

/// Assemble the corpus from typed fields
#[must_use]
pub fn assemble_fields(
    result: &ExtractionResult,
    fields: &[Field],
    mode: AssembleMode,
) -> Assembled {
    let parts = fragments(result, fields);
    match mode {
        AssembleMode::String => Assembled::Joined(parts.join(" ")),
        AssembleMode::List => Assembled::Fragments(parts),
    }
}

/// Assemble the corpus from key names; unrecognized keys are skipped.
#[must_use]
pub fn assemble<S: AsRef<str>>(
    result: &ExtractionResult,
    keys: &[S],
    mode: AssembleMode,
) -> Assembled {
    let fields: Vec<Field> = keys.iter().filter_map(|k| Field::parse(k.as_ref())).collect();
    assemble_fields(result, &fields, mode)
}
