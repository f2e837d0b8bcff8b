use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::prelude::*;

mod async_utils;
mod cmd;
mod cpu_limit;
mod document;
mod engines;
mod image_ocr;
mod languages;
mod mcp;
mod pipeline;
mod prelude;
mod project_dir;
mod results;
mod tools;

/// An MCP server that extracts text from images and PDFs using Tesseract.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - OCR_PROJECT_DIR: Used if --project-dir is not given.
  - TESSERACT_CMD (optional): The tesseract executable to use.
  - POPPLER_DIR (optional): Where to find pdfinfo, pdftotext and pdftocairo.
  - RUST_LOG (optional): Log filter. Logs are written to standard error.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(flatten)]
    tool_opts: cmd::ToolOpts,

    #[clap(subcommand)]
    subcmd: Option<Cmd>,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Serve MCP requests over standard input and output (the default).
    Serve,
    /// OCR a single image and print the result as JSON.
    Image(cmd::image::ImageOpts),
    /// Extract the text of a PDF and print the result as JSON.
    Pdf(cmd::pdf::PdfOpts),
    /// List installed OCR languages.
    Languages(cmd::languages::LanguagesOpts),
    /// Print schemas for tool arguments and results.
    Schema(cmd::schema::SchemaOpts),
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    // Standard output belongs to the MCP client, so we log to standard error.
    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    // We can stack multiple layers here if we need to.
    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main().await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main() -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Check our project directory before doing anything else.
    let project = opts.tool_opts.project_dir()?;
    info!(project_dir = %project.path().display(), "using project directory");

    // Run the appropriate subcommand.
    match opts.subcmd.as_ref().unwrap_or(&Cmd::Serve) {
        Cmd::Serve => {
            let tools = opts.tool_opts.build_tools(project).await?;
            cmd::serve::cmd_serve(tools).await?;
        }
        Cmd::Image(image_opts) => {
            let tools = opts.tool_opts.build_tools(project).await?;
            cmd::image::cmd_image(&tools, image_opts).await?;
        }
        Cmd::Pdf(pdf_opts) => {
            let tools = opts.tool_opts.build_tools(project).await?;
            cmd::pdf::cmd_pdf(&tools, pdf_opts).await?;
        }
        Cmd::Languages(languages_opts) => {
            let tools = opts.tool_opts.build_tools(project).await?;
            cmd::languages::cmd_languages(&tools, languages_opts).await?;
        }
        Cmd::Schema(schema_opts) => {
            cmd::schema::cmd_schema(schema_opts).await?;
        }
    }
    Ok(())
}
