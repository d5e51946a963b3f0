use email_unpack::*;
use std::fs;
use std::path::Path;
use uuid::Uuid;

struct KeywordClassifier;

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<String> {
        Ok(if text.contains("AMOUNT") { "invoice" } else { "other" }.to_string())
    }
}

struct BrokenClassifier;

impl Classifier for BrokenClassifier {
    fn classify(&self, _text: &str) -> Result<String> {
        Err(UnpackError::Classifier("model not loaded".into()))
    }
}

/// Returns the file name for `.txt`, fails for everything else
struct NameExtractor;

impl AttachmentTextExtractor for NameExtractor {
    fn extract(&self, path: &Path) -> Result<String> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.ends_with(".txt") {
            Ok(format!("extracted {name}"))
        } else {
            Err(UnpackError::Extractor {
                path: path.to_path_buf(),
                reason: "unsupported".into(),
            })
        }
    }
}

fn invoice() -> Vec<u8> {
    [
        "From: Jens <jens@example.dk>",
        "Subject: Invoice",
        "Content-Type: multipart/mixed; boundary=\"b\"",
        "",
        "--b",
        "Content-Type: text/plain",
        "",
        "Pay 1.234,56 now",
        "--b",
        "Content-Type: text/plain",
        "Content-Disposition: attachment; filename=\"notes.txt\"",
        "Content-Transfer-Encoding: base64",
        "",
        "Zmlyc3QgYXR0YWNobWVudCBsaW5lCg==",
        "--b",
        "Content-Type: application/octet-stream",
        "Content-Disposition: attachment; filename=\"blob.bin\"",
        "Content-Transfer-Encoding: base64",
        "",
        "AAEC",
        "--b--",
        "",
    ]
    .join("\r\n")
    .into_bytes()
}

#[test]
fn test_pipeline_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(UnpackConfig::default(), &PlainTextExtractor)
        .with_classifier(&KeywordClassifier);

    let processed = pipeline.process(&invoice(), "inv-1", tmp.path());

    assert_eq!(processed.extraction.attachments.len(), 2);
    assert_eq!(
        processed.corpus.text,
        "Invoice Pay AMOUNT now first attachment line"
    );
    assert_eq!(processed.label.as_deref(), Some("invoice"));
}

#[test]
fn test_extractor_failure_is_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(UnpackConfig::default(), &NameExtractor);

    let processed = pipeline.process(&invoice(), "inv-2", tmp.path());

    let texts = processed.extraction.files_text.as_ref().unwrap();
    assert_eq!(texts.len(), 2);
    let notes = &processed.extraction.files["notes.txt"].path;
    let blob = &processed.extraction.files["blob.bin"].path;
    assert!(texts[notes].starts_with("extracted inv-2."));
    assert_eq!(texts[blob], "");
    assert_eq!(processed.label, None);
}

#[test]
fn test_classifier_failure_gives_no_label() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(UnpackConfig::default(), &PlainTextExtractor)
        .with_classifier(&BrokenClassifier);

    let processed = pipeline.process(&invoice(), "inv-3", tmp.path());

    assert_eq!(processed.label, None);
    assert!(processed.corpus.text.starts_with("Invoice"));
}

#[test]
fn test_process_with_store_is_repeatable() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(UnpackConfig::default(), &PlainTextExtractor);
    let id = Uuid::from_u128(1);

    let first = pipeline.process_with_store(
        &invoice(),
        "inv-4",
        AttachmentStore::with_ids(tmp.path(), IdFn(move || id)),
    );
    let second = pipeline.process_with_store(
        &invoice(),
        "inv-4",
        AttachmentStore::with_ids(tmp.path(), IdFn(move || id)),
    );

    assert_eq!(first.corpus, second.corpus);
    assert_eq!(first.extraction.files, second.extraction.files);
}

#[test]
fn test_configured_fields_drive_corpus() {
    let tmp = tempfile::tempdir().unwrap();
    let config = UnpackConfig {
        fields: vec![Field::Files, Field::Subject],
        ..UnpackConfig::default()
    };
    let pipeline = Pipeline::new(config, &PlainTextExtractor);

    let processed = pipeline.process(&invoice(), "inv-5", tmp.path());

    assert_eq!(processed.corpus.text, "blob.bin notes.txt Invoice");
}

#[test]
fn test_attach_texts_without_attachments() {
    let mut result = ExtractionResult::new("empty");
    attach_texts(&mut result, &PlainTextExtractor);
    assert_eq!(result.files_text, None);
}

#[test]
fn test_plain_text_extractor() {
    let tmp = tempfile::tempdir().unwrap();

    let txt = tmp.path().join("a.txt");
    fs::write(&txt, b"caf\xe9").unwrap();
    assert_eq!(PlainTextExtractor.extract(&txt).unwrap(), "café");

    let xml = tmp.path().join("b.XML");
    fs::write(&xml, "<doc><p>Hello &amp; bye</p></doc>").unwrap();
    assert!(PlainTextExtractor.extract(&xml).unwrap().contains("Hello & bye"));

    let csv = tmp.path().join("c.csv");
    fs::write(&csv, "a;b\n1;2\n").unwrap();
    assert_eq!(PlainTextExtractor.extract(&csv).unwrap(), "a;b\n1;2\n");

    let pdf = tmp.path().join("d.pdf");
    fs::write(&pdf, b"%PDF-1.4\n").unwrap();
    assert!(matches!(
        PlainTextExtractor.extract(&pdf),
        Err(UnpackError::Extractor { .. })
    ));

    assert!(matches!(
        PlainTextExtractor.extract(&tmp.path().join("missing.txt")),
        Err(UnpackError::Io { .. })
    ));
}

#[test]
fn test_clean_corpus() {
    let mut result = ExtractionResult::new("m");
    result.subject = "Order 42".into();
    result.text = "  arrives   14:30 ".into();

    let corpus = clean_corpus(&result, &[Field::Subject, Field::Text], &Normalizer::default());

    assert_eq!(corpus.text, "Order NUMBER arrives TIME");
    assert_eq!(corpus.to_string(), corpus.text);
}
