//! Result records returned by our tools.
//!
//! These are serialized directly into MCP tool results, so field names use
//! `snake_case` and stay stable.

use schemars::JsonSchema;

use crate::{engines::Recognition, prelude::*};

/// Count whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Average the per-token confidences reported by the engine.
///
/// Values `<= 0` mean "nothing detected here" and are skipped entirely. The
/// result is clamped to `0..=100` and rounded to two decimal places.
pub fn average_confidence(confidences: &[f32]) -> f64 {
    let detected = confidences
        .iter()
        .copied()
        .filter(|&conf| conf > 0.0)
        .map(f64::from)
        .collect::<Vec<_>>();
    if detected.is_empty() {
        return 0.0;
    }
    let mean = detected.iter().sum::<f64>() / detected.len() as f64;
    (mean.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// The result of OCRing a single image.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ImageResult {
    /// Did recognition succeed?
    pub success: bool,

    /// The recognized text, trimmed. Empty on failure.
    pub text: String,

    /// The language code passed to the engine.
    pub language: String,

    /// The image path, as requested.
    pub image_path: String,

    /// Image dimensions as `[width, height]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<(u32, u32)>,

    /// Mean confidence (0-100) of all detected tokens, or 0.
    pub average_confidence: f64,

    /// Number of whitespace-separated words in `text`.
    pub word_count: usize,

    /// What went wrong, if `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageResult {
    /// Build a successful result from raw engine output.
    pub fn from_recognition(
        image_path: String,
        language: &str,
        image_size: (u32, u32),
        recognition: &Recognition,
    ) -> Self {
        let text = recognition.text.trim().to_owned();
        Self {
            success: true,
            word_count: word_count(&text),
            text,
            language: language.to_owned(),
            image_path,
            image_size: Some(image_size),
            average_confidence: average_confidence(&recognition.confidences),
            error: None,
        }
    }

    /// Build a failed result.
    pub fn failure(image_path: String, language: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: String::new(),
            language: language.to_owned(),
            image_path,
            image_size: None,
            average_confidence: 0.0,
            word_count: 0,
            error: Some(error.into()),
        }
    }

    /// Replace the reported image path.
    pub fn with_image_path(mut self, image_path: &str) -> Self {
        image_path.clone_into(&mut self.image_path);
        self
    }
}

/// Where a page's text came from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageSource {
    /// The PDF's own text layer.
    Embedded,
    /// Rasterized and recognized by the OCR engine.
    Ocr,
}

/// What happened to a single page of a PDF.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PageOutcome {
    /// 0-based page index.
    pub index: usize,

    /// Where `text` came from.
    pub source: PageSource,

    /// The page text. May be empty.
    pub text: String,

    /// False if we tried OCR, failed, and fell back to embedded text.
    pub ok: bool,

    /// OCR confidence, when `source` is `OCR`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_confidence: Option<f64>,

    /// The OCR failure that caused a fallback, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageOutcome {
    /// Accept the embedded text layer as-is.
    pub fn embedded(index: usize, text: String) -> Self {
        Self {
            index,
            source: PageSource::Embedded,
            text,
            ok: true,
            average_confidence: None,
            error: None,
        }
    }

    /// Accept OCR output.
    pub fn ocr(index: usize, text: String, average_confidence: f64) -> Self {
        Self {
            index,
            source: PageSource::Ocr,
            text,
            ok: true,
            average_confidence: Some(average_confidence),
            error: None,
        }
    }

    /// OCR didn't work out, so keep whatever embedded text we had.
    pub fn fallback(index: usize, embedded_text: String, error: String) -> Self {
        Self {
            index,
            source: PageSource::Embedded,
            text: embedded_text,
            ok: false,
            average_confidence: None,
            error: Some(error),
        }
    }

    /// The human-readable header placed before this page's text.
    pub fn marker(&self) -> String {
        match self.source {
            PageSource::Embedded => format!("=== Page {} ===", self.index + 1),
            PageSource::Ocr => format!("=== Page {} (OCR) ===", self.index + 1),
        }
    }
}

/// The result of extracting text from a PDF.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DocumentResult {
    /// False only if the document could not be found or opened.
    pub success: bool,

    /// All pages, each preceded by a page marker, separated by blank lines.
    pub text: String,

    /// The language code passed to the engine.
    pub language: String,

    /// The PDF path, as requested.
    pub pdf_path: String,

    /// Number of pages in the document.
    pub total_pages: usize,

    /// Number of pages we produced an outcome for.
    pub processed_pages: usize,

    /// Number of whitespace-separated words in `text`.
    pub word_count: usize,

    /// Per-page details, in page order.
    pub pages: Vec<PageOutcome>,

    /// What went wrong, if `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentResult {
    /// Merge per-page outcomes into a document.
    ///
    /// `pages` must already be sorted by index.
    pub fn from_pages(
        pdf_path: String,
        language: &str,
        total_pages: usize,
        pages: Vec<PageOutcome>,
    ) -> Self {
        debug_assert!(pages.windows(2).all(|w| w[0].index < w[1].index));
        let text = pages
            .iter()
            .map(|page| format!("{}\n{}", page.marker(), page.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        Self {
            success: true,
            word_count: word_count(&text),
            text,
            language: language.to_owned(),
            pdf_path,
            total_pages,
            processed_pages: pages.len().min(total_pages),
            pages,
            error: None,
        }
    }

    /// Build a failed result.
    pub fn failure(pdf_path: String, language: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: String::new(),
            language: language.to_owned(),
            pdf_path,
            total_pages: 0,
            processed_pages: 0,
            word_count: 0,
            pages: vec![],
            error: Some(error.into()),
        }
    }

    /// Replace the reported PDF path.
    pub fn with_pdf_path(mut self, pdf_path: &str) -> Self {
        pdf_path.clone_into(&mut self.pdf_path);
        self
    }
}
