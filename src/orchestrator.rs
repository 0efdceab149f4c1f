use futures_util::StreamExt;
use futures_util::stream;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::document::{Chunk, ChunkFailure, OutcomeStatus, TranslationOutcome};
use crate::error::{CapabilityError, FailureKind, PipelineError};
use crate::languages::SourceLang;
use crate::pipeline::CancelToken;
use crate::providers::{RetryPolicies, TranslateRequest, TranslationCapability};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_CONCURRENCY: usize = 4;

/// Sends chunks to the translation capability and collects one outcome per chunk.
pub struct Orchestrator<'a, T: TranslationCapability + ?Sized> {
    capability: &'a T,
    retry: &'a RetryPolicies,
    request_timeout: Duration,
    concurrency: usize,
}

impl<'a, T: TranslationCapability + ?Sized> Orchestrator<'a, T> {
    pub fn new(capability: &'a T, retry: &'a RetryPolicies) -> Self {
        Self {
            capability,
            retry,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            concurrency: 1,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    /// Translates `chunks` in ascending `order`.
    ///
    /// Per-chunk failures are recorded in the outcomes; the only error is
    /// cancellation, observed between chunks and during retry waits. Outcomes
    /// come back in input order.
    pub async fn translate(
        &self,
        chunks: &[Chunk],
        directive: &SourceLang,
        target: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<TranslationOutcome>, PipelineError> {
        let mut ordered: Vec<&Chunk> = chunks.iter().collect();
        ordered.sort_by_key(|chunk| chunk.order);

        let mut results: HashMap<usize, TranslationOutcome> = HashMap::with_capacity(chunks.len());
        let mut detected: Option<String> = None;
        let mut next = 0;

        // Sequential until the document language is known, or throughout when no fan-out.
        while next < ordered.len() && (self.concurrency == 1 || (directive.is_auto() && detected.is_none())) {
            cancel.check()?;
            let chunk = ordered[next];
            let source = source_for(chunk, directive, detected.as_deref());
            let outcome = self.translate_chunk(chunk, source, target, cancel).await?;
            if detected.is_none() && directive.is_auto() && outcome.is_success() && !outcome.detected_source_lang.is_empty() {
                info!("detected source language '{}'", outcome.detected_source_lang);
                detected = Some(outcome.detected_source_lang.clone());
            }
            results.insert(chunk.id, outcome);
            next += 1;
        }

        if next < ordered.len() {
            debug!(
                "translating {} remaining chunk(s) with {} in flight",
                ordered.len() - next,
                self.concurrency
            );
            let detected = detected.as_deref();
            let mut pending = stream::iter(ordered[next..].iter().copied().map(|chunk| {
                let source = source_for(chunk, directive, detected);
                async move {
                    if cancel.is_cancelled() {
                        return Ok(None);
                    }
                    self.translate_chunk(chunk, source, target, cancel).await.map(Some)
                }
            }))
            .buffered(self.concurrency);

            while let Some(outcome) = pending.next().await {
                cancel.check()?;
                if let Some(outcome) = outcome? {
                    results.insert(outcome.chunk_id, outcome);
                }
            }
        }
        cancel.check()?;

        let outcomes: Vec<TranslationOutcome> = chunks
            .iter()
            .filter_map(|chunk| results.remove(&chunk.id))
            .collect();
        let failed = outcomes.iter().filter(|outcome| !outcome.is_success()).count();
        info!(
            "translated {} chunk(s), {} failed",
            outcomes.len() - failed,
            failed
        );
        Ok(outcomes)
    }

    async fn translate_chunk(
        &self,
        chunk: &Chunk,
        source: SourceLang,
        target: &str,
        cancel: &CancelToken,
    ) -> Result<TranslationOutcome, PipelineError> {
        let Some((start, end)) = split_text_bounds(&chunk.text) else {
            return Ok(TranslationOutcome {
                chunk_id: chunk.id,
                translated_text: chunk.text.clone(),
                detected_source_lang: detected_fallback(&source),
                status: OutcomeStatus::Success,
            });
        };
        let leading = &chunk.text[..start];
        let core = &chunk.text[start..end];
        let trailing = &chunk.text[end..];

        let mut attempts: HashMap<FailureKind, u32> = HashMap::new();
        loop {
            let request = TranslateRequest {
                text: core.to_string(),
                source: source.clone(),
                target: target.to_string(),
            };
            let err = match timeout(self.request_timeout, self.capability.translate(request)).await {
                Ok(Ok(response)) => {
                    let detected = if response.detected_source_lang.trim().is_empty() {
                        detected_fallback(&source)
                    } else {
                        response.detected_source_lang
                    };
                    return Ok(TranslationOutcome {
                        chunk_id: chunk.id,
                        translated_text: format!("{}{}{}", leading, response.translated_text, trailing),
                        detected_source_lang: detected,
                        status: OutcomeStatus::Success,
                    });
                }
                Ok(Err(err)) => err,
                Err(_) => CapabilityError::transport(format!(
                    "no response within {:.1}s",
                    self.request_timeout.as_secs_f32()
                )),
            };

            let count = attempts.entry(err.kind).or_insert(0);
            *count += 1;
            match self.retry.next_delay(err.kind, *count, err.retry_after) {
                Some(delay) => {
                    warn!(
                        "chunk {} {}; retrying in {:.1}s (attempt {}/{})",
                        chunk.id,
                        err,
                        delay.as_secs_f32(),
                        *count + 1,
                        self.retry.max_attempts(err.kind)
                    );
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                    }
                }
                None => {
                    warn!("chunk {} not translated: {}", chunk.id, err);
                    return Ok(TranslationOutcome {
                        chunk_id: chunk.id,
                        translated_text: String::new(),
                        detected_source_lang: detected_fallback(&source),
                        status: OutcomeStatus::Failed(ChunkFailure {
                            kind: err.kind,
                            message: err.message,
                        }),
                    });
                }
            }
        }
    }
}

/// A chunk's own hint wins, then the first detection, then the directive.
fn source_for(chunk: &Chunk, directive: &SourceLang, detected: Option<&str>) -> SourceLang {
    if let Some(hint) = chunk.source_lang_hint.as_deref().filter(|hint| !hint.trim().is_empty()) {
        return SourceLang::Code(hint.to_string());
    }
    match (directive, detected) {
        (SourceLang::Auto, Some(lang)) => SourceLang::Code(lang.to_string()),
        _ => directive.clone(),
    }
}

fn detected_fallback(source: &SourceLang) -> String {
    match source {
        SourceLang::Auto => String::new(),
        SourceLang::Code(code) => code.clone(),
    }
}

pub(crate) fn split_text_bounds(text: &str) -> Option<(usize, usize)> {
    let start = text.char_indices().find(|(_, ch)| !ch.is_whitespace())?.0;
    let end = text
        .char_indices()
        .rev()
        .find(|(_, ch)| !ch.is_whitespace())
        .map(|(idx, ch)| idx + ch.len_utf8())?;
    (start < end).then_some((start, end))
}
