use lopdf::Document;
use tracing::{debug, info, warn};

use crate::data;
use crate::document::SourceDocument;
use crate::error::ExtractionError;

/// Turns PDF bytes into one text per page, in page order.
pub trait PdfCapability: Send + Sync {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl PdfCapability for LopdfBackend {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let doc = Document::load_mem(bytes)
            .map_err(|err| ExtractionError::Corrupt(err.to_string()))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(ExtractionError::Corrupt("document is encrypted".to_string()));
        }

        let mut pages = Vec::new();
        for (page_number, _page_id) in doc.get_pages() {
            match doc.extract_text(&[page_number]) {
                Ok(text) => pages.push(text),
                Err(err) => {
                    warn!("page {} text could not be decoded: {}", page_number, err);
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor<P: PdfCapability> {
    backend: P,
}

impl<P: PdfCapability> Extractor<P> {
    pub fn new(backend: P) -> Self {
        Self { backend }
    }

    pub fn extract(&self, bytes: &[u8]) -> Result<SourceDocument, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::Corrupt("input is empty".to_string()));
        }
        if !data::is_pdf(bytes) {
            return Err(ExtractionError::Corrupt(format!(
                "expected {} (detected {})",
                data::PDF_MIME,
                data::sniff_mime(bytes).unwrap_or("unknown")
            )));
        }

        let texts = self.backend.page_texts(bytes)?;
        if texts.is_empty() {
            return Err(ExtractionError::Corrupt("no pages found in pdf".to_string()));
        }
        let document = SourceDocument::from_texts(texts.iter().map(|text| normalize_newlines(text)));
        let chars = document.char_count();
        if chars == 0 {
            return Err(ExtractionError::NoText);
        }

        info!(
            "extracted {} characters from {} page(s)",
            chars,
            document.page_count()
        );
        for page in &document.pages {
            debug!("page {}: {} chars", page.index, page.text.chars().count());
        }
        Ok(document)
    }
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
