use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use pdf_translator::{CancelToken, Config, ExportFormat, PipelineResult, RunOutput};

#[derive(Parser, Debug)]
#[command(
    name = "pdf-translator",
    version,
    about = "Translate the text of a PDF and export it as plain text or a Word document"
)]
struct Cli {
    /// PDF file to translate
    #[arg(short = 'd', long = "data")]
    data: PathBuf,

    /// Source language (ISO 639-1/3). Use "auto" to detect.
    #[arg(short = 'L', long = "source-lang", default_value = "auto")]
    source_lang: String,

    /// Target language (default: id)
    #[arg(short = 'l', long = "lang", default_value = "id")]
    lang: String,

    /// Language preset: en-id, id-en, auto-id or auto-en
    #[arg(long = "direction", conflicts_with_all = ["source_lang", "lang"])]
    direction: Option<String>,

    /// Export format: text or richdoc
    #[arg(short = 'F', long = "format", default_value = "text")]
    format: ExportFormat,

    /// Output path (text defaults to stdout, richdoc to <name>_translated_structured.docx)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Print the extracted text and block count, then exit
    #[arg(long = "show-extracted")]
    show_extracted: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    pdf_translator::logging::init(cli.verbose)?;

    let config = Config {
        data: cli.data,
        source_lang: cli.source_lang,
        lang: cli.lang,
        direction: cli.direction,
        format: cli.format,
        output: cli.output,
        settings_path: cli.read_settings,
        show_extracted: cli.show_extracted,
    };

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("cancelling...");
            on_interrupt.cancel();
        }
    });

    match pdf_translator::run(config, cancel).await? {
        RunOutput::Preview(text) => {
            println!("{}", text);
            Ok(())
        }
        RunOutput::Translated { result, written_to } => {
            let status = pdf_translator::format_status(&result, written_to.as_deref());
            match &result {
                PipelineResult::Failure(_) => return Err(anyhow!(status)),
                PipelineResult::Success(_) | PipelineResult::PartialSuccess { .. } => {}
            }
            if written_to.is_none()
                && let Some(bytes) = result.bytes()
            {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.write_all(b"\n")?;
                stdout.flush()?;
            }
            eprintln!("{}", status);
            Ok(())
        }
    }
}
