use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PDF_MIME: &str = "application/pdf";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Text,
    RichDoc,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Text => "text",
            ExportFormat::RichDoc => "richdoc",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Text => TEXT_MIME,
            ExportFormat::RichDoc => DOCX_MIME,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::RichDoc => "docx",
        }
    }

    /// File name used when the caller gives no output path.
    pub fn default_output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("document");
        let name = match self {
            ExportFormat::Text => format!("{}_translated.{}", stem, self.extension()),
            ExportFormat::RichDoc => {
                format!("{}_translated_structured.{}", stem, self.extension())
            }
        };
        input.with_file_name(name)
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "richdoc" | "docx" => Ok(ExportFormat::RichDoc),
            other => Err(anyhow!(
                "unsupported export format '{}' (expected text or richdoc)",
                other
            )),
        }
    }
}

pub fn load_document(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read document: {}", path.display()))
}

pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    sniff_mime(bytes) == Some(PDF_MIME)
}
