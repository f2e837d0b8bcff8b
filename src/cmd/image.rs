//! The `image` subcommand.

use clap::Args;

use crate::{async_utils::io::write_json_output, prelude::*, tools::OcrTools};

/// Image command line arguments.
#[derive(Debug, Args)]
pub struct ImageOpts {
    /// Path to the image, relative to the project directory.
    pub image_path: String,

    /// OCR language. Defaults to `--default-language`.
    #[clap(short = 'l', long)]
    pub language: Option<String>,

    /// Write the result here instead of standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `image` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_image(tools: &OcrTools, opts: &ImageOpts) -> Result<()> {
    let result = tools
        .extract_text_from_image(&opts.image_path, opts.language.as_deref())
        .await;
    write_json_output(opts.output_path.as_deref(), &result).await
}
