//! The `languages` subcommand.

use clap::Args;

use crate::{async_utils::io::write_json_output, prelude::*, tools::OcrTools};

/// Languages command line arguments.
#[derive(Debug, Args)]
pub struct LanguagesOpts {
    /// Write the result here instead of standard output.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `languages` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_languages(tools: &OcrTools, opts: &LanguagesOpts) -> Result<()> {
    let catalog = tools.check_tesseract_languages().await;
    write_json_output(opts.output_path.as_deref(), &catalog).await
}
