use std::collections::HashMap;
use tracing::debug;

use crate::data::ExportFormat;
use crate::document::{Chunk, OutputDocument, OutputPage, OutputParagraph, TranslationOutcome};
use crate::error::ReconstructionError;
use crate::segmenter::split_paragraphs;

pub mod docx;
pub mod text;

pub const UNAVAILABLE_PREFIX: &str = "[unavailable] ";

/// Regroups outcomes by page in chunk order.
///
/// Failed chunks (and chunks without an outcome) contribute their source text
/// as paragraphs flagged `unavailable`. The result always has `page_count`
/// pages, blank ones included.
pub fn reconstruct(
    outcomes: &[TranslationOutcome],
    chunks: &[Chunk],
    page_count: usize,
) -> OutputDocument {
    let by_chunk: HashMap<usize, &TranslationOutcome> = outcomes
        .iter()
        .map(|outcome| (outcome.chunk_id, outcome))
        .collect();

    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|chunk| chunk.order);

    let page_count = ordered
        .iter()
        .map(|chunk| chunk.page_index + 1)
        .max()
        .unwrap_or(0)
        .max(page_count);
    let mut pages: Vec<OutputPage> = (0..page_count)
        .map(|index| OutputPage {
            index,
            paragraphs: Vec::new(),
        })
        .collect();

    for chunk in ordered {
        let (text, unavailable) = match by_chunk.get(&chunk.id) {
            Some(outcome) if outcome.is_success() => (outcome.translated_text.as_str(), false),
            _ => (chunk.text.as_str(), true),
        };
        let paragraphs = &mut pages[chunk.page_index].paragraphs;
        let mut joins_previous = chunk.continues_paragraph;
        for piece in split_paragraphs(text) {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let previous = paragraphs
                .last_mut()
                .filter(|previous| joins_previous && previous.unavailable == unavailable);
            match previous {
                Some(previous) => {
                    if !chunk.continues_word {
                        previous.text.push(' ');
                    }
                    previous.text.push_str(piece);
                }
                None => paragraphs.push(OutputParagraph {
                    text: piece.to_string(),
                    unavailable,
                }),
            }
            joins_previous = false;
        }
    }

    let document = OutputDocument { pages };
    debug!(
        "reconstructed {} page(s), {} unavailable paragraph(s)",
        document.page_count(),
        document.unavailable_count()
    );
    document
}

pub fn serialize(
    document: &OutputDocument,
    format: ExportFormat,
) -> Result<Vec<u8>, ReconstructionError> {
    match format {
        ExportFormat::Text => Ok(text::render(document).into_bytes()),
        ExportFormat::RichDoc => docx::write(document),
    }
}
