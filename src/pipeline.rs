use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::data::ExportFormat;
use crate::document::{Chunk, FailedChunk, SourceDocument, TranslationOutcome};
use crate::error::{ExtractionError, PipelineError};
use crate::extractor::{Extractor, PdfCapability};
use crate::languages::{self, SourceLang};
use crate::orchestrator::{DEFAULT_REQUEST_TIMEOUT, Orchestrator};
use crate::providers::{RetryPolicies, TranslationCapability};
use crate::reconstruct;
use crate::segmenter::{self, DEFAULT_MAX_CHUNK_SIZE};
use crate::settings::Settings;

/// External cancel signal, checked between chunks and awaited during retry waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub max_chunk_size: usize,
    pub request_timeout: Duration,
    pub concurrency: usize,
    pub retry: RetryPolicies,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            concurrency: 1,
            retry: RetryPolicies::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_chunk_size: settings.max_chunk_size,
            request_timeout: settings.request_timeout,
            concurrency: settings.concurrency,
            retry: settings.retry_policies(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineResult {
    Success(Vec<u8>),
    /// Complete document where the listed chunks kept their source text.
    PartialSuccess {
        bytes: Vec<u8>,
        failed: Vec<FailedChunk>,
    },
    Failure(PipelineError),
}

impl PipelineResult {
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            PipelineResult::Success(bytes) | PipelineResult::PartialSuccess { bytes, .. } => {
                Some(bytes)
            }
            PipelineResult::Failure(_) => None,
        }
    }

    pub fn failed_chunks(&self) -> &[FailedChunk] {
        match self {
            PipelineResult::PartialSuccess { failed, .. } => failed,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            PipelineResult::Failure(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success(_))
    }
}

/// Extraction, segmentation, translation and reconstruction, strictly in that order.
pub struct Pipeline<P: PdfCapability, T: TranslationCapability> {
    extractor: Extractor<P>,
    capability: T,
    options: PipelineOptions,
}

impl<P: PdfCapability, T: TranslationCapability> Pipeline<P, T> {
    pub fn new(pdf: P, capability: T, options: PipelineOptions) -> Self {
        Self {
            extractor: Extractor::new(pdf),
            capability,
            options,
        }
    }

    /// Extracts and segments without translating.
    pub fn preview(&self, bytes: &[u8]) -> Result<(SourceDocument, Vec<Chunk>), ExtractionError> {
        let document = self.extractor.extract(bytes)?;
        let chunks = segmenter::segment(&document, self.options.max_chunk_size);
        Ok((document, chunks))
    }

    pub async fn run(
        &self,
        bytes: &[u8],
        directive: &SourceLang,
        target: &str,
        format: ExportFormat,
        cancel: &CancelToken,
    ) -> PipelineResult {
        info!(
            "translating document md5={:x} ({} bytes) {} -> {} ({}) as {} via {}",
            md5::compute(bytes),
            bytes.len(),
            directive,
            target,
            languages::language_name(target).unwrap_or("unknown"),
            format.mime(),
            self.capability.name()
        );
        match self.execute(bytes, directive, target, format, cancel).await {
            Ok((bytes, failed)) if failed.is_empty() => PipelineResult::Success(bytes),
            Ok((bytes, failed)) => {
                warn!("{} segment(s) could not be translated", failed.len());
                PipelineResult::PartialSuccess { bytes, failed }
            }
            Err(err) => {
                warn!("translation failed: {}", err);
                PipelineResult::Failure(err)
            }
        }
    }

    async fn execute(
        &self,
        bytes: &[u8],
        directive: &SourceLang,
        target: &str,
        format: ExportFormat,
        cancel: &CancelToken,
    ) -> Result<(Vec<u8>, Vec<FailedChunk>), PipelineError> {
        cancel.check()?;
        let (document, chunks) = self.preview(bytes)?;
        cancel.check()?;

        let outcomes = Orchestrator::new(&self.capability, &self.options.retry)
            .with_timeout(self.options.request_timeout)
            .with_concurrency(self.options.concurrency)
            .translate(&chunks, directive, target, cancel)
            .await?;

        let output = reconstruct::reconstruct(&outcomes, &chunks, document.page_count());
        let serialized = reconstruct::serialize(&output, format)?;
        Ok((serialized, failed_chunks(&chunks, &outcomes)))
    }
}

fn failed_chunks(chunks: &[Chunk], outcomes: &[TranslationOutcome]) -> Vec<FailedChunk> {
    chunks
        .iter()
        .zip(outcomes)
        .filter_map(|(chunk, outcome)| {
            let failure = outcome.failure()?;
            Some(FailedChunk {
                chunk_id: chunk.id,
                page_index: chunk.page_index,
                order: chunk.order,
                kind: failure.kind,
                message: failure.message.clone(),
                source_text: chunk.text.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CapabilityError, ErrorKind, FailureKind};
    use crate::extractor::LopdfBackend;
    use crate::extractor::tests::build_pdf;
    use crate::providers::{CapabilityFuture, TranslateRequest, TranslateResponse};

    struct Shouting;

    impl TranslationCapability for Shouting {
        fn name(&self) -> &str {
            "shouting"
        }

        fn translate(&self, request: TranslateRequest) -> CapabilityFuture {
            Box::pin(async move {
                if request.text.contains("refuse") {
                    return Err(CapabilityError::unsupported("no"));
                }
                Ok(TranslateResponse {
                    translated_text: request.text.to_uppercase(),
                    detected_source_lang: "en".to_string(),
                })
            })
        }
    }

    fn pipeline() -> Pipeline<LopdfBackend, Shouting> {
        let options = PipelineOptions {
            retry: RetryPolicies::immediate(),
            ..PipelineOptions::default()
        };
        Pipeline::new(LopdfBackend, Shouting, options)
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn cancelled_wakes_pending_waiters() {
        let token = CancelToken::new();
        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.cancelled().await }
        });
        tokio::task::yield_now().await;
        token.cancel();
        waiter.await.unwrap();
        // already cancelled tokens resolve immediately
        token.cancelled().await;
    }

    #[tokio::test]
    async fn translates_real_pdf_to_text() {
        let bytes = build_pdf(&[Some("Hello world."), None]);
        let result = pipeline()
            .run(&bytes, &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
            .await;

        assert!(result.is_success(), "{:?}", result);
        let text = String::from_utf8(result.bytes().unwrap().to_vec()).unwrap();
        let pages: Vec<_> = text.split('\x0C').collect();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].contains("HELLO WORLD."));
    }

    #[tokio::test]
    async fn failed_chunks_are_summarized() {
        let bytes = build_pdf(&[Some("fine"), Some("refuse this")]);
        let result = pipeline()
            .run(&bytes, &SourceLang::Auto, "id", ExportFormat::Text, &CancelToken::new())
            .await;

        let failed = result.failed_chunks();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].page_index, 1);
        assert_eq!(failed[0].kind, FailureKind::Unsupported);
        assert!(failed[0].source_text.contains("refuse this"));
        let text = String::from_utf8(result.bytes().unwrap().to_vec()).unwrap();
        assert!(text.contains("[unavailable] refuse this"));
    }

    #[tokio::test]
    async fn scanned_document_fails_with_reason() {
        let bytes = build_pdf(&[None]);
        let result = pipeline()
            .run(&bytes, &SourceLang::Auto, "id", ExportFormat::RichDoc, &CancelToken::new())
            .await;

        let err = result.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoText);
        assert!(result.bytes().is_none());
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_no_bytes() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let bytes = build_pdf(&[Some("Hello")]);
        let result = pipeline()
            .run(&bytes, &SourceLang::Auto, "id", ExportFormat::Text, &cancel)
            .await;

        assert_eq!(result, PipelineResult::Failure(PipelineError::Cancelled));
    }

    #[test]
    fn options_follow_settings() {
        let settings = Settings {
            max_chunk_size: 120,
            concurrency: 3,
            ..Settings::default()
        };
        let options = PipelineOptions::from_settings(&settings);
        assert_eq!(options.max_chunk_size, 120);
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.retry, RetryPolicies::default());
    }
}
