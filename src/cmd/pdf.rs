//! The `pdf` subcommand.

use clap::Args;

use crate::{async_utils::io::write_json_output, prelude::*, tools::OcrTools};

/// PDF command line arguments.
#[derive(Debug, Args)]
pub struct PdfOpts {
    /// Path to the PDF, relative to the project directory.
    pub pdf_path: String,

    /// OCR language for scanned pages. Defaults to `--default-language`.
    #[clap(short = 'l', long)]
    pub language: Option<String>,

    /// Write the result here instead of standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `pdf` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_pdf(tools: &OcrTools, opts: &PdfOpts) -> Result<()> {
    let result = tools
        .extract_text_from_pdf(&opts.pdf_path, opts.language.as_deref())
        .await;
    if !result.success {
        warn!(
            "could not extract text from {}: {}",
            opts.pdf_path,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    write_json_output(opts.output_path.as_deref(), &result).await
}
