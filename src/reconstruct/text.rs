use crate::document::{OutputDocument, OutputParagraph};

use super::UNAVAILABLE_PREFIX;

pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
/// Form feed between blank lines.
pub const PAGE_BREAK: &str = "\n\n\x0C\n\n";

pub fn render(document: &OutputDocument) -> String {
    document
        .pages
        .iter()
        .map(|page| {
            page.paragraphs
                .iter()
                .map(render_paragraph)
                .collect::<Vec<_>>()
                .join(PARAGRAPH_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join(PAGE_BREAK)
}

fn render_paragraph(paragraph: &OutputParagraph) -> String {
    if paragraph.unavailable {
        format!("{}{}", UNAVAILABLE_PREFIX, paragraph.text)
    } else {
        paragraph.text.clone()
    }
}
