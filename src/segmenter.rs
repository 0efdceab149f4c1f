use tracing::debug;

use crate::document::{Chunk, SourceDocument};

/// Characters per request accepted by the public translate endpoint.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 4000;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', ';', '\u{3002}', '\u{ff01}', '\u{ff1f}'];

/// Splits every page into chunks of at most `max_chunk_size` characters.
///
/// Concatenating the chunks of a page in order yields the page text verbatim.
/// Empty pages yield no chunks.
pub fn segment(document: &SourceDocument, max_chunk_size: usize) -> Vec<Chunk> {
    let limit = max_chunk_size.max(1);
    let mut chunks = Vec::new();

    for page in &document.pages {
        let mut pending: Option<Pending<'_>> = None;
        for (paragraph_index, paragraph) in split_paragraphs(&page.text).into_iter().enumerate() {
            let parts = if char_len(paragraph) > limit {
                split_oversized(paragraph, limit)
            } else {
                vec![(paragraph, false)]
            };
            for (part_index, (part, continues_word)) in parts.into_iter().enumerate() {
                let continues = part_index > 0;
                let fits = pending
                    .as_ref()
                    .map(|current| !continues && current.chars + char_len(part) <= limit)
                    .unwrap_or(false);
                if fits {
                    if let Some(current) = pending.as_mut() {
                        current.push(part);
                    }
                    continue;
                }
                if let Some(current) = pending.take() {
                    chunks.push(current.into_chunk(chunks.len(), page.index));
                }
                pending = Some(Pending::new(part, paragraph_index, continues, continues_word));
            }
        }
        if let Some(current) = pending.take() {
            chunks.push(current.into_chunk(chunks.len(), page.index));
        }
    }

    debug!(
        "segmented {} page(s) into {} chunk(s) (limit {} chars)",
        document.page_count(),
        chunks.len(),
        limit
    );
    chunks
}

/// Splits on blank-line boundaries. Each piece keeps its trailing separator,
/// so the pieces concatenate back to `text`.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    let mut has_content = false;
    let mut seen_blank = false;

    for line in text.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        if !blank && seen_blank {
            pieces.push(&text[start..offset]);
            start = offset;
            seen_blank = false;
        }
        if blank {
            seen_blank = has_content;
        } else {
            has_content = true;
        }
        offset += line.len();
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

struct Pending<'a> {
    parts: Vec<&'a str>,
    chars: usize,
    paragraph_index: usize,
    continues_paragraph: bool,
    continues_word: bool,
}

impl<'a> Pending<'a> {
    fn new(
        part: &'a str,
        paragraph_index: usize,
        continues_paragraph: bool,
        continues_word: bool,
    ) -> Self {
        Self {
            parts: vec![part],
            chars: char_len(part),
            paragraph_index,
            continues_paragraph,
            continues_word,
        }
    }

    fn push(&mut self, part: &'a str) {
        self.chars += char_len(part);
        self.parts.push(part);
    }

    fn into_chunk(self, order: usize, page_index: usize) -> Chunk {
        Chunk {
            id: order,
            page_index,
            order,
            text: self.parts.concat(),
            source_lang_hint: None,
            paragraph_index: self.paragraph_index,
            continues_paragraph: self.continues_paragraph,
            continues_word: self.continues_word,
        }
    }
}

/// Cuts a paragraph longer than `limit` at sentence ends, then at whitespace,
/// and only splits a word when it alone exceeds the limit. The flag marks
/// parts that start inside a word cut that way.
fn split_oversized(paragraph: &str, limit: usize) -> Vec<(&str, bool)> {
    let mut parts = Vec::new();
    let mut rest = paragraph;
    let mut inside_word = false;
    while char_len(rest) > limit {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];
        let boundary = sentence_cut(window).or_else(|| whitespace_cut(window));
        let cut = boundary.unwrap_or(window_end);
        parts.push((&rest[..cut], inside_word));
        let (head, tail) = rest.split_at(cut);
        inside_word = boundary.is_none()
            && head.chars().next_back().is_some_and(|ch| !ch.is_whitespace())
            && tail.chars().next().is_some_and(|ch| !ch.is_whitespace());
        rest = tail;
    }
    if !rest.is_empty() {
        parts.push((rest, inside_word));
    }
    parts
}

/// Byte offset just past the last "terminator + whitespace" pair in `window`.
fn sentence_cut(window: &str) -> Option<usize> {
    let mut cut = None;
    let mut previous: Option<char> = None;
    for (idx, ch) in window.char_indices() {
        if ch.is_whitespace() && previous.is_some_and(|prev| SENTENCE_TERMINATORS.contains(&prev)) {
            cut = Some(idx + ch.len_utf8());
        }
        previous = Some(ch);
    }
    cut.filter(|&offset| offset > 0)
}

fn whitespace_cut(window: &str) -> Option<usize> {
    window
        .char_indices()
        .filter(|(_, ch)| ch.is_whitespace())
        .map(|(idx, ch)| idx + ch.len_utf8())
        .last()
        .filter(|&offset| offset > 0 && offset <= window.len())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
