//! HTML to plain text rendering

use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Line width handed to the renderer; wide enough that wrapping is rare
const RENDER_WIDTH: usize = 1024;

static COMMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<!--[^>]+-->").unwrap());

// Tag stripping, applied in this order
static HIDDEN_BLOCK_REGEXES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap(),
        Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap(),
    ]
});
static LINE_BREAK_TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:br|/p|/div|/li|/tr|/h[1-6])\b[^>]*>").unwrap());
static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

const ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

/// Render HTML as text only, then drop leftover comments and `&nbsp;` artifacts.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let rendered = match html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(html.as_bytes(), RENDER_WIDTH)
    {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "HTML rendering failed, stripping tags instead");
            strip_tags(html)
        }
    };

    COMMENT_REGEX
        .replace_all(&rendered, "")
        .replace('\u{a0}', " ")
}

/// Tag stripper used when the renderer gives up and for XML attachments.
///
/// Script and style bodies are dropped, closing block tags become line
/// breaks, every other tag a space. Common entities are decoded last, `&amp;`
/// after the rest so `&amp;lt;` stays literal.
#[must_use]
pub fn strip_tags(markup: &str) -> String {
    let visible = HIDDEN_BLOCK_REGEXES
        .iter()
        .fold(markup.to_string(), |acc, regex| regex.replace_all(&acc, " ").into_owned());
    let broken = LINE_BREAK_TAG_REGEX.replace_all(&visible, "\n");
    let text = TAG_REGEX.replace_all(&broken, " ");

    ENTITIES
        .iter()
        .fold(text.into_owned(), |acc, &(entity, ch)| acc.replace(entity, ch))
}
