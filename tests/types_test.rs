use email_unpack::*;
use std::path::PathBuf;

fn record(name: &str, stored: &str) -> AttachmentRecord {
    AttachmentRecord {
        original_name: name.into(),
        stored_name: stored.into(),
        path: PathBuf::from("/out").join(stored),
        content_id: None,
    }
}

// --- ExtractionResult ---

#[test]
fn test_result_new() {
    let result = ExtractionResult::new("abc");
    assert_eq!(result.message_id, "abc");
    assert_eq!(result.parts, 0);
    assert!(!result.has_attachments());
    assert!(!result.is_partial());
    assert_eq!(result.files_text, None);
}

#[test]
fn test_absorb_concatenates_in_order() {
    let mut parent = ExtractionResult::new("m");
    parent.text.push_str("one ");
    parent.parts = 1;

    let mut child = ExtractionResult::default();
    child.text.push_str("two");
    child.html.push_str("<p>x</p>");
    child.html_text.push_str("x");
    child.parts = 2;
    child.issues.push(ExtractionIssue::DepthLimit { depth: 4 });

    parent.absorb(child);

    assert_eq!(parent.message_id, "m");
    assert_eq!(parent.text, "one two");
    assert_eq!(parent.html, "<p>x</p>");
    assert_eq!(parent.html_text, "x");
    assert_eq!(parent.parts, 3);
    assert!(parent.is_partial());
}

#[test]
fn test_absorb_files_last_write_wins() {
    let mut parent = ExtractionResult::new("m");
    parent.add_attachment(record("a.pdf", "m.1.a.pdf"));

    let mut child = ExtractionResult::default();
    child.add_attachment(record("a.pdf", "m.2.a.pdf"));
    parent.absorb(child);

    assert_eq!(parent.files.len(), 1);
    assert_eq!(parent.files["a.pdf"].path, PathBuf::from("/out/m.2.a.pdf"));
    assert_eq!(parent.attachments.len(), 2);
    assert_eq!(parent.stored_paths().count(), 1);
}

#[test]
fn test_result_json() {
    let mut result = ExtractionResult::new("m");
    result.issues.push(ExtractionIssue::LossyDecode {
        charset: "utf-8".into(),
    });

    let json = result.to_json().unwrap();
    assert!(json.contains("\"kind\": \"lossy_decode\""));

    let back: ExtractionResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}

// --- ExtractionIssue ---

#[test]
fn test_issue_display() {
    assert_eq!(
        ExtractionIssue::DepthLimit { depth: 21 }.to_string(),
        "nesting truncated at depth 21"
    );
    assert_eq!(
        ExtractionIssue::AttachmentWrite {
            filename: "a.pdf".into(),
            reason: "disk full".into(),
        }
        .to_string(),
        "could not store a.pdf: disk full"
    );
}

// --- UnpackError ---

#[test]
fn test_error_display() {
    let err = UnpackError::io("/tmp/x", std::io::Error::other("boom"));
    assert_eq!(err.to_string(), "I/O error on '/tmp/x': boom");

    let err = UnpackError::Config("no fields selected".into());
    assert_eq!(err.to_string(), "Invalid configuration: no fields selected");
}

// --- UnpackConfig ---

#[test]
fn test_config_defaults() {
    let config = UnpackConfig::default();
    assert_eq!(config.walker.max_depth, DEFAULT_MAX_DEPTH);
    assert_eq!(config.walker.decode_policy, DecodePolicy::Replace);
    assert_eq!(
        config.fields,
        vec![Field::Subject, Field::Text, Field::HtmlText, Field::FilesText]
    );
}

#[test]
fn test_config_from_json() {
    let config = UnpackConfig::from_json_str(
        r#"{
            "walker": { "max_depth": 5, "decode_policy": "windows1252" },
            "normalizer": { "replace_times": false },
            "fields": ["subject", "files_texts"]
        }"#,
    )
    .unwrap();

    assert_eq!(config.walker.max_depth, 5);
    assert_eq!(config.walker.decode_policy, DecodePolicy::Windows1252);
    assert!(!config.normalizer.replace_times);
    assert!(config.normalizer.replace_dates);
    assert_eq!(config.fields, vec![Field::Subject, Field::FilesText]);
}

#[test]
fn test_config_empty_object_is_default() {
    assert_eq!(UnpackConfig::from_json_str("{}").unwrap(), UnpackConfig::default());
}

#[test]
fn test_config_rejects_bad_input() {
    assert!(matches!(
        UnpackConfig::from_json_str(r#"{"fields": []}"#),
        Err(UnpackError::Config(_))
    ));
    assert!(matches!(
        UnpackConfig::from_json_str(r#"{"fields": ["bogus"]}"#),
        Err(UnpackError::Config(_))
    ));
    assert!(matches!(
        UnpackConfig::from_json_str("not json"),
        Err(UnpackError::Config(_))
    ));
}

#[test]
fn test_config_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("unpack.json");
    std::fs::write(&path, r#"{"fields": ["text"]}"#).unwrap();

    let config = UnpackConfig::load(&path).unwrap();
    assert_eq!(config.fields, vec![Field::Text]);

    assert!(matches!(
        UnpackConfig::load(&tmp.path().join("missing.json")),
        Err(UnpackError::Io { .. })
    ));
}

// --- charset ---

#[test]
fn test_encoding_for_labels() {
    assert_eq!(encoding_for("US-ASCII"), encoding_rs::UTF_8);
    assert_eq!(encoding_for("\"iso-8859-1\""), encoding_rs::WINDOWS_1252);
    assert_eq!(encoding_for("x-unknown"), encoding_rs::UTF_8);
}

#[test]
fn test_decode_bytes_policies() {
    let clean = decode_bytes("æøå".as_bytes(), Some("utf-8"), DecodePolicy::Replace);
    assert_eq!(clean, Decoded { text: "æøå".into(), lossy: false });

    let replaced = decode_bytes(b"\xe6", None, DecodePolicy::Replace);
    assert_eq!(replaced.text, "\u{fffd}");
    assert!(replaced.lossy);

    let latin = decode_bytes(b"\xe6", None, DecodePolicy::Windows1252);
    assert_eq!(latin.text, "æ");
    assert!(latin.lossy);
}

// --- html ---

#[test]
fn test_html_to_text() {
    let text = html_to_text("<p>Hej&nbsp;med&nbsp;dig</p><!-- hidden -->");
    assert!(text.contains("Hej med dig"));
    assert!(!text.contains("hidden"));
    assert!(!text.contains('\u{a0}'));
}

#[test]
fn test_strip_tags_skips_script_and_style() {
    let text = strip_tags("<style>p{}</style><script>x()</script>Hi<br>there &lt;3");
    assert!(!text.contains("x()"));
    assert!(!text.contains("p{}"));
    assert!(text.contains("Hi\nthere <3"));
}

#[test]
fn test_html_to_text_renders_structure() {
    let text = html_to_text(
        "<ul><li>one</li><li>two</li></ul><table><tr><td>cell</td></tr></table>",
    );
    assert!(text.contains("one"));
    assert!(text.contains("two"));
    assert!(text.contains("cell"));
    assert!(!text.contains('<'));
}

#[test]
fn test_strip_tags_breaks_blocks() {
    let text = strip_tags("<h1>Title</h1><ul><li>a</li><li>b</li></ul><div>end</div>");
    assert!(text.contains("Title\n"));
    assert!(text.contains("a\n"));
    assert!(text.contains("b\n"));
    assert!(text.contains("end\n"));
}

#[test]
fn test_strip_tags_decodes_entities_once() {
    assert_eq!(strip_tags("&amp;lt; &quot;x&quot; &#39;y&#39;"), "&lt; \"x\" 'y'");
    assert_eq!(strip_tags("a&nbsp;b"), "a b");
}
