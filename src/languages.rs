//! Report which OCR languages are installed.

use std::collections::BTreeMap;

use schemars::JsonSchema;

use crate::{engines::OcrEngine, prelude::*};

/// Languages we call out by name, when they're installed.
const COMMON_LANGUAGES: &[(&str, &str)] = &[
    ("deu", "German"),
    ("eng", "English"),
    ("fra", "French"),
    ("spa", "Spanish"),
    ("ita", "Italian"),
    ("por", "Portuguese"),
    ("rus", "Russian"),
    ("chi_sim", "Chinese (simplified)"),
    ("chi_tra", "Chinese (traditional)"),
    ("jpn", "Japanese"),
    ("ara", "Arabic"),
];

/// A snapshot of the engine's installed languages.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LanguageCatalog {
    /// Could we query the engine?
    pub success: bool,

    /// The engine's version line, or "unknown".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tesseract_version: Option<String>,

    /// The engine command we ran.
    pub tesseract_path: String,

    /// Installed language codes, sorted.
    pub available_languages: Vec<String>,

    /// Number of installed languages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_count: Option<usize>,

    /// Installed languages from a short list of common ones, with names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub common_languages: Option<BTreeMap<String, String>>,

    /// Is German (`deu`) installed?
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_for_german: Option<bool>,

    /// Is English (`eng`) installed?
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_for_english: Option<bool>,

    /// What went wrong, if `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LanguageCatalog {
    fn from_languages(tesseract_path: String, version: String, mut languages: Vec<String>) -> Self {
        languages.sort();
        languages.dedup();
        let installed = |code: &str| languages.iter().any(|lang| lang == code);
        let common_languages = COMMON_LANGUAGES
            .iter()
            .filter(|(code, _)| installed(*code))
            .map(|&(code, name)| (code.to_owned(), name.to_owned()))
            .collect::<BTreeMap<_, _>>();
        let recommended_for_german = installed("deu");
        let recommended_for_english = installed("eng");
        Self {
            success: true,
            tesseract_version: Some(version),
            tesseract_path,
            language_count: Some(languages.len()),
            common_languages: Some(common_languages),
            recommended_for_german: Some(recommended_for_german),
            recommended_for_english: Some(recommended_for_english),
            available_languages: languages,
            error: None,
        }
    }

    fn failure(tesseract_path: String, error: String) -> Self {
        Self {
            success: false,
            tesseract_version: None,
            tesseract_path,
            available_languages: vec![],
            language_count: None,
            common_languages: None,
            recommended_for_german: None,
            recommended_for_english: None,
            error: Some(error),
        }
    }
}

/// Ask `engine` what it has installed. Never fails; errors are reported in
/// the result.
#[instrument(level = "debug", skip_all)]
pub async fn list_languages(engine: &dyn OcrEngine) -> LanguageCatalog {
    let tesseract_path = engine.location();
    let languages = match engine.installed_languages().await {
        Ok(languages) => languages,
        Err(err) => {
            warn!("cannot list OCR languages: {:#}", err);
            return LanguageCatalog::failure(tesseract_path, format!("{err:#}"));
        }
    };
    let version = engine.version().await.unwrap_or_else(|err| {
        debug!("cannot get OCR engine version: {:#}", err);
        "unknown".to_owned()
    });
    LanguageCatalog::from_languages(tesseract_path, version, languages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{mock::MockEngine, tesseract::TesseractEngine};

    #[tokio::test]
    async fn reports_installed_languages() {
        let engine = MockEngine::recognizing("", &[]).with_languages(Ok(vec![
            "osd".to_owned(),
            "eng".to_owned(),
            "jpn".to_owned(),
        ]));
        let catalog = list_languages(&engine).await;

        assert!(catalog.success);
        assert_eq!(catalog.available_languages, vec!["eng", "jpn", "osd"]);
        assert_eq!(catalog.language_count, Some(3));
        assert_eq!(catalog.tesseract_version.as_deref(), Some("tesseract 5.3.0"));
        assert_eq!(catalog.recommended_for_german, Some(false));
        assert_eq!(catalog.recommended_for_english, Some(true));

        let common = catalog.common_languages.unwrap();
        assert_eq!(common.len(), 2);
        assert_eq!(common["eng"], "English");
        assert_eq!(common["jpn"], "Japanese");
    }

    #[tokio::test]
    async fn engine_failure_gives_empty_catalog() {
        let engine = MockEngine::recognizing("", &[])
            .with_languages(Err("tesseract is not installed".to_owned()));
        let catalog = list_languages(&engine).await;

        assert!(!catalog.success);
        assert!(catalog.available_languages.is_empty());
        assert!(catalog.error.unwrap().contains("not installed"));
    }

    #[tokio::test]
    async fn broken_engine_path_gives_empty_catalog() {
        let engine = TesseractEngine::new(PathBuf::from("/nonexistent/tesseract"));
        let catalog = list_languages(&engine).await;

        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["available_languages"], serde_json::json!([]));
        assert_eq!(json["tesseract_path"], "/nonexistent/tesseract");
    }
}
