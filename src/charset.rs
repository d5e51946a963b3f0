//! Payload charset decoding with an explicit lossy policy

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};

/// What to do when bytes do not fit their declared charset
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Substitute U+FFFD for every malformed sequence
    #[default]
    Replace,

    /// Re-decode the whole payload as windows-1252, which accepts any byte
    Windows1252,
}

/// Text produced by [`decode_bytes`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,

    /// True when the declared charset could not represent the input
    pub lossy: bool,
}

/// Resolve a charset label, treating ASCII and unknown labels as UTF-8.
///
/// ASCII is widened to UTF-8 because mislabelled 8-bit bodies are far more
/// often UTF-8 than windows-1252.
#[must_use]
pub fn encoding_for(label: &str) -> &'static Encoding {
    let label = label.trim().trim_matches('"');
    if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
        return UTF_8;
    }
    Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8)
}

/// Decode payload bytes in `charset` (UTF-8 when absent) under `policy`.
#[must_use]
pub fn decode_bytes(bytes: &[u8], charset: Option<&str>, policy: DecodePolicy) -> Decoded {
    let encoding = charset.map_or(UTF_8, encoding_for);
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);

    if !had_errors {
        return Decoded {
            text: text.into_owned(),
            lossy: false,
        };
    }

    let text = match policy {
        DecodePolicy::Replace => text.into_owned(),
        DecodePolicy::Windows1252 => WINDOWS_1252
            .decode_without_bom_handling(bytes)
            .0
            .into_owned(),
    };

    Decoded { text, lossy: true }
}

/// Decode bytes as ISO-8859-1 (windows-1252 superset); never lossy.
#[must_use]
pub fn decode_latin1(bytes: &[u8]) -> String {
    WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
}
