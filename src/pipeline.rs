//! Extract the text of a PDF, OCRing only the pages that need it.
//!
//! Pages with a real text layer are used as-is. Scanned or nearly empty
//! pages are rendered to images and OCRed. If OCR fails for a page, we keep
//! whatever embedded text that page had, so one bad page never costs us the
//! rest of the document.

use std::sync::Arc;

use clap::Args;

use crate::{
    document::{Document, DocumentAccess},
    engines::check_language,
    image_ocr::ImageOcr,
    prelude::*,
    results::{DocumentResult, PageOutcome},
};

/// Tunables for [`DocumentPipeline`].
#[derive(Args, Clone, Debug)]
pub struct PipelineOptions {
    /// Pages with more than this many characters of embedded text are not
    /// OCRed.
    #[clap(long, env = "OCR_MIN_EMBEDDED_CHARS", default_value = "50")]
    pub min_embedded_chars: usize,

    /// Magnification used when rendering pages for OCR. 1.0 is 72 DPI.
    #[clap(long, env = "OCR_RASTER_SCALE", default_value = "2.0")]
    pub raster_scale: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            min_embedded_chars: 50,
            raster_scale: 2.0,
        }
    }
}

/// Turns documents into text.
#[derive(Clone)]
pub struct DocumentPipeline {
    documents: Arc<dyn DocumentAccess>,
    ocr: ImageOcr,
    options: PipelineOptions,
}

impl DocumentPipeline {
    /// Create a new pipeline.
    pub fn new(
        documents: Arc<dyn DocumentAccess>,
        ocr: ImageOcr,
        options: PipelineOptions,
    ) -> Self {
        Self {
            documents,
            ocr,
            options,
        }
    }

    /// Extract all the text from the document at `path`.
    ///
    /// This only reports failure if the document can't be read at all.
    /// Page-level OCR problems are recorded in [`DocumentResult::pages`].
    pub async fn extract_document(&self, path: &Path, language: &str) -> DocumentResult {
        match self.try_extract_document(path, language).await {
            Ok(result) => result,
            Err(err) => {
                warn!("text extraction failed for {:?}: {:#}", path.display(), err);
                DocumentResult::failure(
                    path.display().to_string(),
                    language,
                    format!("{err:#}"),
                )
            }
        }
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display(), language = %language))]
    async fn try_extract_document(
        &self,
        path: &Path,
        language: &str,
    ) -> Result<DocumentResult> {
        check_language(language)?;
        let document = self
            .documents
            .open(path)
            .await
            .with_context(|| format!("cannot open {}", path.display()))?;
        let total_pages = document.page_count();

        // Holds rendered pages. Deleted on every exit path, including `?`.
        let tmpdir = tempfile::TempDir::with_prefix("pages")?;

        let mut pages = Vec::with_capacity(total_pages);
        for page_idx in 0..total_pages {
            let embedded = document
                .embedded_text(page_idx)
                .await
                .with_context(|| format!("cannot read text of page {}", page_idx + 1))?
                .trim()
                .to_owned();

            let outcome = if embedded.chars().count() > self.options.min_embedded_chars {
                trace!(page = page_idx, "using embedded text");
                PageOutcome::embedded(page_idx, embedded)
            } else {
                self.ocr_page(document.as_ref(), page_idx, embedded, tmpdir.path(), language)
                    .await
            };
            pages.push(outcome);
        }
        drop(document);

        let tmpdir_path = tmpdir.path().to_owned();
        if let Err(err) = tmpdir.close() {
            error!(
                directory = ?tmpdir_path.display(),
                "failed to delete temporary directory: {}",
                err
            );
        }

        let result =
            DocumentResult::from_pages(path.display().to_string(), language, total_pages, pages);
        debug!(
            total_pages = result.total_pages,
            ocr_pages = result.pages.iter().filter(|page| page.average_confidence.is_some()).count(),
            words = result.word_count,
            "extracted document"
        );
        Ok(result)
    }

    /// Render and OCR a single page, falling back to `embedded` on failure.
    async fn ocr_page(
        &self,
        document: &dyn Document,
        page_idx: usize,
        embedded: String,
        out_dir: &Path,
        language: &str,
    ) -> PageOutcome {
        let image_path = match document
            .rasterize(page_idx, self.options.raster_scale, out_dir)
            .await
        {
            Ok(image_path) => image_path,
            Err(err) => {
                warn!(page = page_idx, "cannot render page for OCR: {:#}", err);
                return PageOutcome::fallback(page_idx, embedded, format!("{err:#}"));
            }
        };

        let recognized = self.ocr.recognize(&image_path, language).await;

        // Recover space a bit early. The directory goes away regardless.
        if let Err(err) = tokio::fs::remove_file(&image_path).await {
            debug!(path = ?image_path.display(), "cannot delete rendered page: {}", err);
        }

        match recognized {
            Ok(result) if !result.text.is_empty() => {
                PageOutcome::ocr(page_idx, result.text, result.average_confidence)
            }
            Ok(_) => PageOutcome::fallback(
                page_idx,
                embedded,
                "OCR found no text on this page".to_owned(),
            ),
            Err(err) => {
                warn!(page = page_idx, "OCR failed: {:#}", err);
                PageOutcome::fallback(page_idx, embedded, format!("{err:#}"))
            }
        }
    }
}
