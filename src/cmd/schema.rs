//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use schemars::schema_for;
use tokio::io::AsyncWriteExt as _;

use crate::{
    async_utils::io::create_writer,
    languages::LanguageCatalog,
    prelude::*,
    results::{DocumentResult, ImageResult},
    tools::{ImageToolArgs, LanguagesToolArgs, PdfToolArgs},
};

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// `extract_text_from_image` arguments.
    ImageToolArgs,
    /// `extract_text_from_pdf` arguments.
    PdfToolArgs,
    /// `check_tesseract_languages` arguments.
    LanguagesToolArgs,
    /// `extract_text_from_image` result.
    ImageResult,
    /// `extract_text_from_pdf` result.
    DocumentResult,
    /// `check_tesseract_languages` result.
    LanguageCatalog,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    // Get our schema.
    let schema = match schema_opts.schema_type {
        SchemaType::ImageToolArgs => schema_for!(ImageToolArgs),
        SchemaType::PdfToolArgs => schema_for!(PdfToolArgs),
        SchemaType::LanguagesToolArgs => schema_for!(LanguagesToolArgs),
        SchemaType::ImageResult => schema_for!(ImageResult),
        SchemaType::DocumentResult => schema_for!(DocumentResult),
        SchemaType::LanguageCatalog => schema_for!(LanguageCatalog),
    };

    // Write out our schema.
    let mut wtr = create_writer(schema_opts.output_path.as_deref()).await?;
    let mut schema_str =
        serde_json::to_string_pretty(&schema).context("failed to serialize schema")?;
    schema_str.push('\n');
    wtr.write_all(schema_str.as_bytes())
        .await
        .context("failed to write schema")?;
    wtr.flush().await.context("failed to flush schema")?;
    Ok(())
}
