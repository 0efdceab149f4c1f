use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use insta::assert_snapshot;
use pdf_translator::providers::{CapabilityFuture, RetryPolicies};
use pdf_translator::{
    CancelToken, CapabilityError, ErrorKind, ExportFormat, ExtractionError, FailureKind,
    PdfCapability, Pipeline, PipelineError, PipelineOptions, PipelineResult, SourceLang,
    TranslateRequest, TranslateResponse, TranslationCapability,
};

const PDF_MAGIC: &[u8] = b"%PDF-1.7\n";

/// Serves fixed page texts for any byte stream that looks like a PDF.
struct FakePdf(Vec<String>);

impl FakePdf {
    fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self(pages.into_iter().map(Into::into).collect())
    }
}

impl PdfCapability for FakePdf {
    fn page_texts(&self, _bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        Ok(self.0.clone())
    }
}

/// Prefixes text with the target language and reports `en`.
#[derive(Clone, Default)]
struct FakeTranslator {
    calls: Arc<AtomicUsize>,
    rate_limited: Arc<Mutex<HashSet<String>>>,
    cancel_after: Option<(usize, CancelToken)>,
}

impl FakeTranslator {
    fn rate_limit(&self, text: &str) {
        self.rate_limited.lock().unwrap().insert(text.to_string());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TranslationCapability for FakeTranslator {
    fn name(&self) -> &str {
        "fake"
    }

    fn translate(&self, request: TranslateRequest) -> CapabilityFuture {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, cancel)) = &self.cancel_after
            && calls >= *limit
        {
            cancel.cancel();
        }
        let limited = self.rate_limited.lock().unwrap().contains(&request.text);
        Box::pin(async move {
            if limited {
                return Err(CapabilityError::rate_limited("429 Too Many Requests"));
            }
            let translated_text = match request.text.as_str() {
                "Hello world." => "Halo dunia.".to_string(),
                other => format!("[{}] {}", request.target, other),
            };
            Ok(TranslateResponse {
                translated_text,
                detected_source_lang: "en".to_string(),
            })
        })
    }
}

fn options() -> PipelineOptions {
    PipelineOptions {
        retry: RetryPolicies::immediate(),
        ..PipelineOptions::default()
    }
}

fn text_of(result: &PipelineResult) -> String {
    String::from_utf8(result.bytes().expect("output bytes").to_vec()).unwrap()
}

#[tokio::test]
async fn two_page_document_with_blank_page() {
    let pipeline = Pipeline::new(
        FakePdf::new(["Hello world.", ""]),
        FakeTranslator::default(),
        options(),
    );

    let result = pipeline
        .run(PDF_MAGIC, &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
        .await;

    assert!(result.is_success(), "{:?}", result);
    let text = text_of(&result);
    assert_eq!(text.split('\x0C').count(), 2);
    assert_eq!(text, "Halo dunia.\n\n\x0C\n\n");
}

#[tokio::test(start_paused = true)]
async fn one_rate_limited_chunk_in_five_hundred() {
    let pages: Vec<String> = (0..500).map(|i| format!("Paragraph {}.", i)).collect();
    let translator = FakeTranslator::default();
    translator.rate_limit("Paragraph 37.");
    let pipeline = Pipeline::new(
        FakePdf::new(pages),
        translator.clone(),
        PipelineOptions::default(),
    );

    let result = pipeline
        .run(PDF_MAGIC, &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
        .await;

    let failed = result.failed_chunks();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].chunk_id, 37);
    assert_eq!(failed[0].kind, FailureKind::RateLimited);
    assert_eq!(failed[0].source_text, "Paragraph 37.");
    assert_eq!(translator.calls(), 499 + 5);

    let text = text_of(&result);
    let pages: Vec<_> = text.split("\n\n\x0C\n\n").collect();
    assert_eq!(pages.len(), 500);
    assert_eq!(pages[36], "[id] Paragraph 36.");
    assert_eq!(pages[37], "[unavailable] Paragraph 37.");
    assert_eq!(pages[38], "[id] Paragraph 38.");
}

#[tokio::test]
async fn empty_input_is_corrupt() {
    let translator = FakeTranslator::default();
    let pipeline = Pipeline::new(FakePdf::new(["unused"]), translator.clone(), options());

    let result = pipeline
        .run(&[], &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
        .await;

    assert_eq!(result.error().map(PipelineError::kind), Some(ErrorKind::Corrupt));
    assert!(result.bytes().is_none());
    assert_eq!(translator.calls(), 0);
}

#[tokio::test]
async fn blank_document_reports_no_text() {
    let pipeline = Pipeline::new(
        FakePdf::new(["", "  \n"]),
        FakeTranslator::default(),
        options(),
    );

    let result = pipeline
        .run(PDF_MAGIC, &SourceLang::Auto, "id", ExportFormat::RichDoc, &CancelToken::new())
        .await;

    assert_eq!(result.error().map(PipelineError::kind), Some(ErrorKind::NoText));
}

#[tokio::test]
async fn cancel_midway_discards_completed_work() {
    let pages: Vec<String> = (0..50).map(|i| format!("Block {}.", i)).collect();
    let cancel = CancelToken::new();
    let translator = FakeTranslator {
        cancel_after: Some((10, cancel.clone())),
        ..FakeTranslator::default()
    };
    let pipeline = Pipeline::new(FakePdf::new(pages), translator.clone(), options());

    let result = pipeline
        .run(PDF_MAGIC, &SourceLang::Auto, "id", ExportFormat::Text, &cancel)
        .await;

    assert_eq!(result, PipelineResult::Failure(PipelineError::Cancelled));
    assert_eq!(translator.calls(), 10);
}

#[tokio::test]
async fn identical_input_yields_identical_bytes() {
    let pages = ["Hello world.\n\nSecond paragraph.", "", "Last page."];
    for format in [ExportFormat::Text, ExportFormat::RichDoc] {
        let first = Pipeline::new(FakePdf::new(pages), FakeTranslator::default(), options())
            .run(PDF_MAGIC, &SourceLang::Auto, "id", format, &CancelToken::new())
            .await;
        let second = Pipeline::new(FakePdf::new(pages), FakeTranslator::default(), options())
            .run(PDF_MAGIC, &SourceLang::Auto, "id", format, &CancelToken::new())
            .await;
        assert!(first.is_success());
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn fan_out_matches_sequential_output() {
    let pages: Vec<String> = (0..20)
        .map(|i| format!("Page {} first.\n\nPage {} second.", i, i))
        .collect();
    let sequential = Pipeline::new(FakePdf::new(pages.clone()), FakeTranslator::default(), options())
        .run(PDF_MAGIC, &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
        .await;
    let parallel = Pipeline::new(
        FakePdf::new(pages),
        FakeTranslator::default(),
        PipelineOptions {
            concurrency: 4,
            ..options()
        },
    )
    .run(PDF_MAGIC, &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
    .await;

    assert_eq!(sequential, parallel);
}

#[tokio::test]
async fn plain_text_output_snapshot() {
    let translator = FakeTranslator::default();
    translator.rate_limit("Footnote that keeps failing.");
    let pipeline = Pipeline::new(
        FakePdf::new([
            "Hello world.\n\nIntroduction to the topic.\n",
            "",
            "Closing words.\n\nFootnote that keeps failing.",
        ]),
        translator,
        PipelineOptions {
            max_chunk_size: 30,
            ..options()
        },
    );

    let result = pipeline
        .run(PDF_MAGIC, &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
        .await;

    assert_eq!(result.failed_chunks().len(), 1);
    assert_snapshot!(text_of(&result).replace('\x0C', "<page-break>"), @r###"
    Halo dunia.

    [id] Introduction to the topic.

    <page-break>



    <page-break>

    [id] Closing words.

    [unavailable] Footnote that keeps failing.
    "###);
}
