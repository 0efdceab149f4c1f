use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};

pub mod data;
pub mod document;
pub mod error;
pub mod extractor;
pub mod languages;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod reconstruct;
pub mod segmenter;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use data::ExportFormat;
pub use document::{Chunk, FailedChunk, OutputDocument, SourceDocument, TranslationOutcome};
pub use error::{CapabilityError, ErrorKind, ExtractionError, FailureKind, PipelineError};
pub use extractor::{Extractor, LopdfBackend, PdfCapability};
pub use languages::SourceLang;
pub use pipeline::{CancelToken, Pipeline, PipelineOptions, PipelineResult};
pub use providers::{GoogleTranslate, TranslateRequest, TranslateResponse, TranslationCapability};

#[derive(Debug, Clone)]
pub struct Config {
    pub data: PathBuf,
    pub source_lang: String,
    pub lang: String,
    /// Preset such as `auto-id`; overrides `source_lang` and `lang`.
    pub direction: Option<String>,
    pub format: ExportFormat,
    pub output: Option<PathBuf>,
    pub settings_path: Option<String>,
    pub show_extracted: bool,
}

#[derive(Debug)]
pub enum RunOutput {
    /// Extracted text with page-break markers, no translation performed.
    Preview(String),
    Translated {
        result: PipelineResult,
        /// Where the bytes were written; `None` leaves them for stdout.
        written_to: Option<PathBuf>,
    },
}

pub async fn run(config: Config, cancel: CancelToken) -> Result<RunOutput> {
    let (source, target) = resolve_languages(&config)?;
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let bytes = data::load_document(&config.data)?;

    let capability = GoogleTranslate::new(settings.endpoint.clone(), settings.request_timeout)
        .with_context(|| "failed to build translation client")?;
    let pipeline = Pipeline::new(
        LopdfBackend,
        capability,
        PipelineOptions::from_settings(&settings),
    );

    if config.show_extracted {
        let (document, chunks) = pipeline.preview(&bytes)?;
        return Ok(RunOutput::Preview(format_preview(&document, chunks.len())));
    }

    let result = pipeline
        .run(&bytes, &source, &target, config.format, &cancel)
        .await;
    let destination = match (&config.output, config.format) {
        (Some(path), _) => Some(path.clone()),
        (None, ExportFormat::RichDoc) => Some(config.format.default_output_path(&config.data)),
        (None, ExportFormat::Text) => None,
    };
    let written_to = match (result.bytes(), destination) {
        (Some(output), Some(path)) => {
            std::fs::write(&path, output)
                .with_context(|| format!("failed to write output: {}", path.display()))?;
            Some(path)
        }
        _ => None,
    };
    Ok(RunOutput::Translated { result, written_to })
}

pub fn resolve_languages(config: &Config) -> Result<(SourceLang, String)> {
    let (source, target) = match config.direction.as_deref() {
        Some(direction) => languages::parse_direction(direction)?,
        None => (
            config.source_lang.parse::<SourceLang>()?,
            languages::parse_target(&config.lang)?,
        ),
    };
    if let SourceLang::Code(code) = &source
        && *code == target
    {
        return Err(anyhow!(
            "source and target language are both '{}'",
            target
        ));
    }
    Ok((source, target))
}

pub fn format_preview(document: &SourceDocument, chunk_count: usize) -> String {
    let pages = document
        .pages
        .iter()
        .map(|page| page.text.trim())
        .collect::<Vec<_>>()
        .join(reconstruct::text::PAGE_BREAK);
    format!(
        "{}\n\n{} page(s), {} block(s), {} character(s)",
        pages,
        document.page_count(),
        chunk_count,
        document.char_count()
    )
}

/// One-line status for the presentation layer.
pub fn format_status(result: &PipelineResult, written_to: Option<&Path>) -> String {
    let location = written_to
        .map(|path| format!(" to {}", path.display()))
        .unwrap_or_default();
    match result {
        PipelineResult::Success(_) => format!("translation complete{}", location),
        PipelineResult::PartialSuccess { failed, .. } => {
            let ids = failed
                .iter()
                .map(|chunk| chunk.chunk_id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "warning: {} segment(s) could not be translated and were kept in the source language (ids: {}); output written{}",
                failed.len(),
                ids,
                location
            )
        }
        PipelineResult::Failure(err) => format!("translation failed: {}", err),
    }
}
