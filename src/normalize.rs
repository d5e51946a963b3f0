//! Text normalization: ordered, pattern-driven redaction stages
//!
//! Stage order matters. Dates, times, amounts and national ids must be
//! redacted before generic numbers, or the number stage eats their digits.
//! Punctuation goes after the specific numeric stages (separators are part
//! of those patterns) and before the number stage (so stray punctuation does
//! not hide a number boundary).

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

pub const DATE_PLACEHOLDER: &str = " DATE ";
pub const TIME_PLACEHOLDER: &str = " TIME ";
pub const AMOUNT_PLACEHOLDER: &str = " AMOUNT ";
pub const NATIONAL_ID_PLACEHOLDER: &str = " CPR ";
pub const NUMBER_PLACEHOLDER: &str = " NUMBER ";

/// Characters replaced by a space in the punctuation stage
pub const DEFAULT_SPECIAL_CHARACTERS: &str = "\\`*_{}[]()<>#+!$'?@";

// Regex patterns
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static DATE_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:^|\s)\d{1,4}\.\d{1,2}\.\d{1,4}\b",
        r"(?:^|\s)\d{1,4}-\d{1,2}-\d{1,4}\b",
        r"(?:^|\s)\d{1,4}/\d{1,2}/\d{1,4}\b",
        concat!(
            r"(?i)(?:^|\s)\d{1,2}\.?\s",
            r"(?:january?|jan|february?|feb|marts|march|mar|april|apr|maj|may|june?|juni|jun",
            r"|july?|juli|jul|august|aug|september|sept|sep|oktober|october|okt|oct",
            r"|november|nov|december|dec)",
            r"\.?\s(?:\d{4}\b|\d{2}(?:\s|$))",
        ),
        r"(?:^|\s)\d{1,2}/\d{1,2}(?:\s|$)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)\d{1,2}:\d{1,2}(?::\d{1,2}(?:[.,]\d+)?)?\b").unwrap()
});

static AMOUNT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)-?\d+(?:[.,]\d+)+(?:,-)?").unwrap());

static NATIONAL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\d{6}-?\d{4}(?:\s|$)").unwrap());

static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\b").unwrap());

/// Replace matches until none are left.
///
/// Every pattern needs a digit and no placeholder has one, so each pass
/// strictly reduces the digit count and the loop ends. Running to a fixed
/// point also catches neighbours whose separating space the previous match
/// consumed.
fn replace_until_stable(regex: &Regex, text: &str, placeholder: &str) -> String {
    let mut current = text.to_string();
    while regex.is_match(&current) {
        current = regex
            .replace_all(&current, NoExpand(placeholder))
            .into_owned();
    }
    current
}

/// Collapse every whitespace run into a single space and trim the ends
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").trim().to_string()
}

/// Numeric (`01-02-2024`, `1.2.24`, `1/2`) and spelled (`3. maj 2021`) dates.
///
/// Spelled dates need a Danish or English month name and a year that is
/// not the hour of a following time.
#[must_use]
pub fn replace_dates(text: &str) -> String {
    DATE_REGEXES.iter().fold(text.to_string(), |acc, regex| {
        replace_until_stable(regex, &acc, DATE_PLACEHOLDER)
    })
}

/// `hh:mm`, `hh:mm:ss` and `hh:mm:ss.fff`
#[must_use]
pub fn replace_times(text: &str) -> String {
    replace_until_stable(&TIME_REGEX, text, TIME_PLACEHOLDER)
}

/// Amounts with grouping or decimal separators, signed or not
#[must_use]
pub fn replace_amounts(text: &str) -> String {
    replace_until_stable(&AMOUNT_REGEX, text, AMOUNT_PLACEHOLDER)
}

/// Ten-digit personal id numbers, with or without the dash after six digits
#[must_use]
pub fn replace_national_ids(text: &str) -> String {
    replace_until_stable(&NATIONAL_ID_REGEX, text, NATIONAL_ID_PLACEHOLDER)
}

/// Replace each of `characters` with a space
#[must_use]
pub fn remove_characters(text: &str, characters: &str) -> String {
    text.chars()
        .map(|c| if characters.contains(c) { ' ' } else { c })
        .collect()
}

/// Standalone numeric tokens
#[must_use]
pub fn replace_numbers(text: &str) -> String {
    replace_until_stable(&NUMBER_REGEX, text, NUMBER_PLACEHOLDER)
}

/// One normalization step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CollapseWhitespace,
    Dates,
    Times,
    Amounts,
    NationalIds,
    Characters,
    Numbers,
}

impl Stage {
    /// Recommended order
    pub const DEFAULT_ORDER: [Self; 8] = [
        Self::CollapseWhitespace,
        Self::Dates,
        Self::Times,
        Self::Amounts,
        Self::NationalIds,
        Self::Characters,
        Self::Numbers,
        Self::CollapseWhitespace,
    ];

    /// Run this stage alone, with the default character set
    #[must_use]
    pub fn apply(self, text: &str) -> String {
        self.apply_with(text, DEFAULT_SPECIAL_CHARACTERS)
    }

    fn apply_with(self, text: &str, characters: &str) -> String {
        match self {
            Self::CollapseWhitespace => collapse_whitespace(text),
            Self::Dates => replace_dates(text),
            Self::Times => replace_times(text),
            Self::Amounts => replace_amounts(text),
            Self::NationalIds => replace_national_ids(text),
            Self::Characters => remove_characters(text, characters),
            Self::Numbers => replace_numbers(text),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollapseWhitespace => "collapse_whitespace",
            Self::Dates => "dates",
            Self::Times => "times",
            Self::Amounts => "amounts",
            Self::NationalIds => "national_ids",
            Self::Characters => "characters",
            Self::Numbers => "numbers",
        };
        f.write_str(name)
    }
}

/// Stage toggles; the order itself is fixed to [`Stage::DEFAULT_ORDER`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizerConfig {
    pub collapse_whitespace: bool,
    pub replace_dates: bool,
    pub replace_times: bool,
    pub replace_amounts: bool,
    pub replace_national_ids: bool,
    pub remove_characters: bool,
    pub replace_numbers: bool,

    /// Characters the punctuation stage turns into spaces
    pub special_characters: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            replace_dates: true,
            replace_times: true,
            replace_amounts: true,
            replace_national_ids: true,
            remove_characters: true,
            replace_numbers: true,
            special_characters: DEFAULT_SPECIAL_CHARACTERS.to_string(),
        }
    }
}

impl NormalizerConfig {
    const fn enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::CollapseWhitespace => self.collapse_whitespace,
            Stage::Dates => self.replace_dates,
            Stage::Times => self.replace_times,
            Stage::Amounts => self.replace_amounts,
            Stage::NationalIds => self.replace_national_ids,
            Stage::Characters => self.remove_characters,
            Stage::Numbers => self.replace_numbers,
        }
    }
}

/// Normalized text and the stages that produced it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    pub applied: Vec<Stage>,
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// An ordered list of stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    stages: Vec<Stage>,
    special_characters: String,
}

impl Normalizer {
    #[must_use]
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            stages: Stage::DEFAULT_ORDER
                .into_iter()
                .filter(|s| config.enabled(*s))
                .collect(),
            special_characters: config.special_characters.clone(),
        }
    }

    /// Run exactly `stages`, in the given order
    #[must_use]
    pub fn with_stages(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            special_characters: DEFAULT_SPECIAL_CHARACTERS.to_string(),
        }
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let text = self.stages.iter().fold(text.to_string(), |acc, stage| {
            stage.apply_with(&acc, &self.special_characters)
        });
        NormalizedText {
            text,
            applied: self.stages.clone(),
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}
