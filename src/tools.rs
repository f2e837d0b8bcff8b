//! The tools we expose, with their argument types and schemas.

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    image_ocr::ImageOcr,
    languages::{LanguageCatalog, list_languages},
    pipeline::DocumentPipeline,
    prelude::*,
    project_dir::ProjectDir,
    results::{DocumentResult, ImageResult},
};

/// Tool name for [`OcrTools::extract_text_from_image`].
pub const EXTRACT_TEXT_FROM_IMAGE: &str = "extract_text_from_image";
/// Tool name for [`OcrTools::extract_text_from_pdf`].
pub const EXTRACT_TEXT_FROM_PDF: &str = "extract_text_from_pdf";
/// Tool name for [`OcrTools::check_tesseract_languages`].
pub const CHECK_TESSERACT_LANGUAGES: &str = "check_tesseract_languages";

/// Arguments for `extract_text_from_image`.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ImageToolArgs {
    /// Path to the image, relative to the project directory.
    pub image_path: String,

    /// Tesseract language code, like "deu", "eng" or "deu+eng". Defaults to
    /// "deu".
    #[serde(default)]
    pub language: Option<String>,
}

/// Arguments for `extract_text_from_pdf`.
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PdfToolArgs {
    /// Path to the PDF, relative to the project directory.
    pub pdf_path: String,

    /// Tesseract language code used for scanned pages. Defaults to "deu".
    #[serde(default)]
    pub language: Option<String>,
}

/// `check_tesseract_languages` takes no arguments.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema)]
pub struct LanguagesToolArgs {}

/// A tool's name, description and input schema, as listed to clients.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Why a tool call could not be dispatched at all.
///
/// Problems with the files themselves are not errors at this level. They are
/// reported inside the tool's result.
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize result of {tool}: {source}")]
    Serialize {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything a tool call needs. Shared between concurrent calls.
pub struct OcrTools {
    project: ProjectDir,
    images: ImageOcr,
    pipeline: DocumentPipeline,
    default_language: String,
}

impl OcrTools {
    /// Create our tools.
    pub fn new(
        project: ProjectDir,
        images: ImageOcr,
        pipeline: DocumentPipeline,
        default_language: String,
    ) -> Self {
        Self {
            project,
            images,
            pipeline,
            default_language,
        }
    }

    /// The project directory that tool paths are relative to.
    pub fn project(&self) -> &ProjectDir {
        &self.project
    }

    fn language_or_default<'a>(&'a self, language: Option<&'a str>) -> &'a str {
        language.unwrap_or(self.default_language.as_str())
    }

    /// OCR a single image.
    #[instrument(level = "info", skip(self, language))]
    pub async fn extract_text_from_image(
        &self,
        image_path: &str,
        language: Option<&str>,
    ) -> ImageResult {
        let language = self.language_or_default(language);
        let path = match self.project.resolve(image_path) {
            Ok(path) => path,
            Err(err) => {
                warn!("{}", err);
                return ImageResult::failure(image_path.to_owned(), language, err.to_string());
            }
        };
        self.images
            .recognize_image(&path, language)
            .await
            .with_image_path(image_path)
    }

    /// Extract the text of a PDF, OCRing pages without a text layer.
    #[instrument(level = "info", skip(self, language))]
    pub async fn extract_text_from_pdf(
        &self,
        pdf_path: &str,
        language: Option<&str>,
    ) -> DocumentResult {
        let language = self.language_or_default(language);
        let path = match self.project.resolve(pdf_path) {
            Ok(path) => path,
            Err(err) => {
                warn!("{}", err);
                return DocumentResult::failure(pdf_path.to_owned(), language, err.to_string());
            }
        };
        self.pipeline
            .extract_document(&path, language)
            .await
            .with_pdf_path(pdf_path)
    }

    /// List the OCR languages that are installed.
    #[instrument(level = "info", skip(self))]
    pub async fn check_tesseract_languages(&self) -> LanguageCatalog {
        list_languages(self.images.engine()).await
    }

    /// Call a tool by name, with JSON arguments.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolCallError> {
        // Clients may leave out `arguments` entirely.
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        match name {
            EXTRACT_TEXT_FROM_IMAGE => {
                let args: ImageToolArgs = parse_args(name, arguments)?;
                let result = self
                    .extract_text_from_image(&args.image_path, args.language.as_deref())
                    .await;
                to_value(name, &result)
            }
            EXTRACT_TEXT_FROM_PDF => {
                let args: PdfToolArgs = parse_args(name, arguments)?;
                let result = self
                    .extract_text_from_pdf(&args.pdf_path, args.language.as_deref())
                    .await;
                to_value(name, &result)
            }
            CHECK_TESSERACT_LANGUAGES => {
                let _args: LanguagesToolArgs = parse_args(name, arguments)?;
                let result = self.check_tesseract_languages().await;
                to_value(name, &result)
            }
            _ => Err(ToolCallError::UnknownTool(name.to_owned())),
        }
    }
}

fn parse_args<T: DeserializeOwned>(
    tool: &str,
    arguments: Value,
) -> Result<T, ToolCallError> {
    serde_json::from_value(arguments).map_err(|source| ToolCallError::InvalidArguments {
        tool: tool.to_owned(),
        source,
    })
}

fn to_value<T: Serialize>(tool: &str, result: &T) -> Result<Value, ToolCallError> {
    serde_json::to_value(result).map_err(|source| ToolCallError::Serialize {
        tool: tool.to_owned(),
        source,
    })
}

/// The JSON Schema for `T`, as a plain JSON value.
fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schema_for!(T)).unwrap_or_default();
    if let Some(object) = schema.as_object_mut() {
        // Clients only want the object schema itself.
        object.remove("$schema");
        object.remove("title");
    }
    schema
}

/// Describe all our tools.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: EXTRACT_TEXT_FROM_IMAGE,
            description: "Extract text from an image file using Tesseract OCR. \
                          `image_path` is relative to the project directory.",
            input_schema: input_schema::<ImageToolArgs>(),
        },
        ToolDefinition {
            name: EXTRACT_TEXT_FROM_PDF,
            description: "Extract text from a PDF. Pages with an embedded text layer \
                          are used directly, and the rest are rendered and OCRed with \
                          Tesseract. `pdf_path` is relative to the project directory.",
            input_schema: input_schema::<PdfToolArgs>(),
        },
        ToolDefinition {
            name: CHECK_TESSERACT_LANGUAGES,
            description: "List the Tesseract version and the OCR languages installed \
                          on this machine.",
            input_schema: input_schema::<LanguagesToolArgs>(),
        },
    ]
}
