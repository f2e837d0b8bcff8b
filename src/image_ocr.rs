//! OCR for a single image file.

use std::sync::Arc;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::{
    async_utils::spawn_blocking_propagating_panics,
    engines::{OcrEngine, check_language},
    prelude::*,
    results::ImageResult,
};

/// Prepares images and hands them to an [`OcrEngine`].
#[derive(Clone)]
pub struct ImageOcr {
    engine: Arc<dyn OcrEngine>,
}

impl ImageOcr {
    /// Create a new adapter around `engine`.
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    /// The engine we're using.
    pub fn engine(&self) -> &dyn OcrEngine {
        self.engine.as_ref()
    }

    /// Recognize the text in the image at `path`.
    ///
    /// This never fails. Problems are reported through
    /// [`ImageResult::success`] and [`ImageResult::error`].
    pub async fn recognize_image(&self, path: &Path, language: &str) -> ImageResult {
        match self.recognize(path, language).await {
            Ok(result) => result,
            Err(err) => {
                warn!("OCR failed for {:?}: {:#}", path.display(), err);
                ImageResult::failure(path.display().to_string(), language, format!("{err:#}"))
            }
        }
    }

    /// Recognize the text in the image at `path`, returning an error if
    /// anything goes wrong.
    #[instrument(level = "debug", skip_all, fields(path = %path.display(), language = %language))]
    pub async fn recognize(&self, path: &Path, language: &str) -> Result<ImageResult> {
        check_language(language)?;

        // The engine always gets a clean PNG, written to a directory that is
        // removed when this function returns.
        let tmpdir = tempfile::TempDir::with_prefix("ocr-input")?;
        let normalized_path = tmpdir.path().join("input.png");
        let src = path.to_owned();
        let dst = normalized_path.clone();
        let image_size =
            spawn_blocking_propagating_panics(move || write_normalized_png(&src, &dst))
                .await?;

        let recognition = self.engine.recognize(&normalized_path, language).await?;
        Ok(ImageResult::from_recognition(
            path.display().to_string(),
            language,
            image_size,
            &recognition,
        ))
    }
}

/// Decode `src`, normalize its colors, and write it to `dst` as PNG.
///
/// Returns the original `(width, height)`.
fn write_normalized_png(src: &Path, dst: &Path) -> Result<(u32, u32)> {
    let image = ImageReader::open(src)
        .with_context(|| format!("cannot open image {:?}", src.display()))?
        .with_guessed_format()
        .with_context(|| format!("cannot read image {:?}", src.display()))?
        .decode()
        .with_context(|| format!("cannot decode image {:?}", src.display()))?;
    let size = (image.width(), image.height());
    normalize_colors(image)
        .save_with_format(dst, ImageFormat::Png)
        .with_context(|| format!("cannot write normalized image {:?}", dst.display()))?;
    Ok(size)
}

/// Keep 8-bit grayscale and RGB as they are, and convert everything else
/// (alpha channels, 16-bit samples, palettes expanded by the decoder, CMYK
/// JPEGs decoded to RGB) to 8-bit RGB.
fn normalize_colors(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

#[cfg(test)]
mod tests {
    use image::{ColorType, ImageBuffer, Luma, Rgba};

    use super::*;
    use crate::engines::mock::MockEngine;

    fn write_gray(dir: &Path) -> PathBuf {
        let path = dir.join("gray.png");
        let image = ImageBuffer::from_fn(12, 7, |x, _| Luma([(x * 20) as u8]));
        DynamicImage::ImageLuma8(image).save(&path).unwrap();
        path
    }

    fn write_rgba(dir: &Path) -> PathBuf {
        let path = dir.join("rgba.png");
        let image = ImageBuffer::from_fn(5, 9, |_, y| Rgba([10, 20, (y * 10) as u8, 128]));
        DynamicImage::ImageRgba8(image).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn grayscale_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::recognizing("Hallo Welt", &[90.0, 80.0]));
        let ocr = ImageOcr::new(engine.clone());

        let result = ocr.recognize_image(&write_gray(dir.path()), "deu").await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.image_size, Some((12, 7)));
        assert_eq!(engine.seen_colors(), vec![ColorType::L8]);
    }

    #[tokio::test]
    async fn alpha_images_are_converted_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::recognizing("text", &[70.0]));
        let ocr = ImageOcr::new(engine.clone());

        let result = ocr.recognize_image(&write_rgba(dir.path()), "eng").await;
        assert!(result.success);
        assert_eq!(result.image_size, Some((5, 9)));
        assert_eq!(engine.seen_colors(), vec![ColorType::Rgb8]);
    }

    #[tokio::test]
    async fn result_reports_text_words_and_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::recognizing(" Rechnung Nr. 42\n", &[-1.0, 96.0, 92.0, 0.0]));
        let ocr = ImageOcr::new(engine);

        let result = ocr.recognize_image(&write_gray(dir.path()), "deu").await;
        assert_eq!(result.text, "Rechnung Nr. 42");
        assert_eq!(result.word_count, 3);
        assert_eq!(result.average_confidence, 94.0);
        assert_eq!(result.language, "deu");
    }

    #[tokio::test]
    async fn no_detections_means_zero_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::recognizing("", &[-1.0, -1.0]));
        let ocr = ImageOcr::new(engine);

        let result = ocr.recognize_image(&write_gray(dir.path()), "deu").await;
        assert!(result.success);
        assert_eq!(result.average_confidence, 0.0);
        assert_eq!(result.word_count, 0);
    }

    #[tokio::test]
    async fn engine_failure_becomes_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::failing("Failed loading language 'xyz'"));
        let ocr = ImageOcr::new(engine);

        let result = ocr.recognize_image(&write_gray(dir.path()), "xyz").await;
        assert!(!result.success);
        assert!(result.text.is_empty());
        assert!(result.error.unwrap().contains("Failed loading language"));
    }

    #[tokio::test]
    async fn undecodable_file_never_reaches_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        let engine = Arc::new(MockEngine::recognizing("unused", &[]));
        let ocr = ImageOcr::new(engine.clone());

        let result = ocr.recognize_image(&path, "deu").await;
        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn bad_language_code_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::recognizing("unused", &[]));
        let ocr = ImageOcr::new(engine.clone());

        let result = ocr.recognize_image(&write_gray(dir.path()), "deu --psm 0").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid language code"));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn repeated_calls_give_identical_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gray(dir.path());
        let ocr = ImageOcr::new(Arc::new(MockEngine::recognizing("same text", &[88.0])));

        let first = ocr.recognize_image(&path, "deu").await;
        let second = ocr.recognize_image(&path, "deu").await;
        assert_eq!(first.text, second.text);
        assert_eq!(first.word_count, second.word_count);
        assert_eq!(first.average_confidence, second.average_confidence);
    }
}
