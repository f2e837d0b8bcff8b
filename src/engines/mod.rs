//! OCR engine interface.

use std::sync::LazyLock;

use regex::Regex;

use crate::prelude::*;

pub mod discovery;
#[cfg(test)]
pub mod mock;
pub mod tesseract;

/// OCR engine mode: Tesseract's default, LSTM-based when available.
pub const ENGINE_MODE: u8 = 3;

/// Page segmentation mode: assume a single uniform block of text.
pub const PAGE_SEGMENTATION_MODE: u8 = 6;

/// Language codes look like `deu`, `chi_sim` or `deu+eng`.
static LANGUAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(\+[A-Za-z0-9_]+)*$").expect("failed to compile regex")
});

/// Make sure `language` is something we can safely hand to the engine.
pub fn check_language(language: &str) -> Result<()> {
    if LANGUAGE_REGEX.is_match(language) {
        Ok(())
    } else {
        Err(anyhow!("invalid language code: {:?}", language))
    }
}

/// Raw output from an OCR engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recognition {
    /// Recognized text, untrimmed.
    pub text: String,

    /// Per-token confidences. Values `<= 0` mean nothing was detected.
    pub confidences: Vec<f32>,
}

/// Interface to an OCR engine.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Recognize the text in an image file.
    ///
    /// `image_path` will always be a PNG in 8-bit grayscale or RGB.
    async fn recognize(&self, image_path: &Path, language: &str) -> Result<Recognition>;

    /// List the installed language codes.
    async fn installed_languages(&self) -> Result<Vec<String>>;

    /// A human-readable version string.
    async fn version(&self) -> Result<String>;

    /// Where the engine lives, for display.
    fn location(&self) -> String;
}
