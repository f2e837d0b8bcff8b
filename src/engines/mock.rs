//! A scripted OCR engine for unit tests.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use image::ColorType;

use super::{OcrEngine, Recognition};
use crate::prelude::*;

/// Returns pre-set results without running anything.
pub struct MockEngine {
    /// Result for every `recognize` call. `Err` holds the error message.
    result: Result<Recognition, String>,
    /// Installed languages, or an error message.
    languages: Result<Vec<String>, String>,
    /// How many times `recognize` was called.
    calls: AtomicUsize,
    /// Color type of every image we were handed.
    seen_colors: Mutex<Vec<ColorType>>,
    /// If set, `recognize` panics with this message.
    panic_message: Option<String>,
}

impl MockEngine {
    /// An engine that always recognizes `text` with the given confidences.
    pub fn recognizing(text: &str, confidences: &[f32]) -> Self {
        Self::with_result(Ok(Recognition {
            text: text.to_owned(),
            confidences: confidences.to_vec(),
        }))
    }

    /// An engine that always fails.
    pub fn failing(message: &str) -> Self {
        Self::with_result(Err(message.to_owned()))
    }

    /// An engine that panics while recognizing.
    pub fn panicking(message: &str) -> Self {
        Self {
            panic_message: Some(message.to_owned()),
            ..Self::failing(message)
        }
    }

    fn with_result(result: Result<Recognition, String>) -> Self {
        Self {
            result,
            languages: Ok(vec!["eng".to_owned(), "deu".to_owned(), "osd".to_owned()]),
            calls: AtomicUsize::new(0),
            seen_colors: Mutex::new(vec![]),
            panic_message: None,
        }
    }

    /// Replace the installed language list.
    pub fn with_languages(mut self, languages: Result<Vec<String>, String>) -> Self {
        self.languages = languages;
        self
    }

    /// How many times has `recognize` been called?
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The color types of the images passed to `recognize`.
    pub fn seen_colors(&self) -> Vec<ColorType> {
        self.seen_colors.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl OcrEngine for MockEngine {
    async fn recognize(&self, image_path: &Path, _language: &str) -> Result<Recognition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.panic_message {
            panic!("{message}");
        }
        let image = image::open(image_path)
            .with_context(|| format!("mock engine cannot read {}", image_path.display()))?;
        self.seen_colors
            .lock()
            .expect("lock poisoned")
            .push(image.color());
        self.result.clone().map_err(|msg| anyhow!(msg))
    }

    async fn installed_languages(&self) -> Result<Vec<String>> {
        self.languages.clone().map_err(|msg| anyhow!(msg))
    }

    async fn version(&self) -> Result<String> {
        Ok("tesseract 5.3.0".to_owned())
    }

    fn location(&self) -> String {
        "mock".to_owned()
    }
}
