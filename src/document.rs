use serde::Serialize;

use crate::error::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub index: usize,
    pub text: String,
}

/// Extracted pages, indexed contiguously from 0. Blank pages are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SourceDocument {
    pub pages: Vec<Page>,
}

impl SourceDocument {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Page {
                index,
                text: text.into(),
            })
            .collect();
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn char_count(&self) -> usize {
        self.pages
            .iter()
            .map(|page| page.text.trim().chars().count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: usize,
    pub page_index: usize,
    /// Global, strictly increasing position across the whole document.
    pub order: usize,
    pub text: String,
    pub source_lang_hint: Option<String>,
    /// Index of the first paragraph on the page this chunk covers.
    pub paragraph_index: usize,
    /// Set when the chunk starts in the middle of a paragraph that was hard-split.
    pub continues_paragraph: bool,
    /// Set when that split also cut through a word longer than the chunk limit.
    pub continues_word: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Success,
    Failed(ChunkFailure),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationOutcome {
    pub chunk_id: usize,
    pub translated_text: String,
    pub detected_source_lang: String,
    pub status: OutcomeStatus,
}

impl TranslationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success)
    }

    pub fn failure(&self) -> Option<&ChunkFailure> {
        match &self.status {
            OutcomeStatus::Success => None,
            OutcomeStatus::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputParagraph {
    pub text: String,
    /// Source text substituted for a chunk that could not be translated.
    pub unavailable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OutputPage {
    pub index: usize,
    pub paragraphs: Vec<OutputParagraph>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OutputDocument {
    pub pages: Vec<OutputPage>,
}

impl OutputDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn unavailable_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|page| page.paragraphs.iter())
            .filter(|paragraph| paragraph.unavailable)
            .count()
    }
}

/// Summary of an untranslated chunk, reported with `PartialSuccess`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedChunk {
    pub chunk_id: usize,
    pub page_index: usize,
    pub order: usize,
    pub kind: FailureKind,
    pub message: String,
    pub source_text: String,
}
