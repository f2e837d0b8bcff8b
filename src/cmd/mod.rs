//! Command-line entry points.

use std::sync::Arc;

use clap::Args;

use crate::{
    document::poppler::PopplerDocuments,
    engines::{discovery::locate_tesseract, tesseract::TesseractEngine},
    image_ocr::ImageOcr,
    pipeline::{DocumentPipeline, PipelineOptions},
    prelude::*,
    project_dir::ProjectDir,
    tools::OcrTools,
};

pub mod image;
pub mod languages;
pub mod pdf;
pub mod schema;
pub mod serve;

/// Options shared by every subcommand that runs OCR tools.
#[derive(Debug, Clone, Args)]
pub struct ToolOpts {
    /// Base directory for all file operations. Tool paths are relative to
    /// this directory, and may not leave it.
    #[clap(long, env = "OCR_PROJECT_DIR")]
    pub project_dir: PathBuf,

    /// The `tesseract` executable to use. Searched for if not set.
    #[clap(long, env = "TESSERACT_CMD")]
    pub tesseract_path: Option<PathBuf>,

    /// Directory containing `pdfinfo`, `pdftotext` and `pdftocairo`. Uses
    /// `PATH` if not set.
    #[clap(long, env = "POPPLER_DIR")]
    pub poppler_dir: Option<PathBuf>,

    /// OCR language used when a request doesn't specify one.
    #[clap(long, env = "OCR_DEFAULT_LANGUAGE", default_value = "deu")]
    pub default_language: String,

    #[clap(flatten)]
    pub pipeline: PipelineOptions,
}

impl ToolOpts {
    /// Validate the project directory. This is done before any subcommand
    /// runs, so a bad directory is always a startup error.
    pub fn project_dir(&self) -> Result<ProjectDir> {
        ProjectDir::new(&self.project_dir)
    }

    /// Find our external tools and wire everything together.
    #[instrument(level = "debug", skip_all)]
    pub async fn build_tools(&self, project: ProjectDir) -> Result<OcrTools> {
        let location = locate_tesseract(self.tesseract_path.as_deref()).await;
        debug!(
            command = %location.command.display(),
            verified = location.verified,
            "using tesseract"
        );
        let engine = Arc::new(TesseractEngine::new(location.command));
        let images = ImageOcr::new(engine);
        let documents = Arc::new(PopplerDocuments::new(self.poppler_dir.clone()));
        let pipeline = DocumentPipeline::new(documents, images.clone(), self.pipeline.clone());
        Ok(OcrTools::new(
            project,
            images,
            pipeline,
            self.default_language.clone(),
        ))
    }
}
