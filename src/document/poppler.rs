//! PDF access using Poppler's `pdfinfo`, `pdftotext` and `pdftocairo` CLI
//! tools.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use tokio::process::Command;

use crate::{
    async_utils::check_for_command_failure, cpu_limit::with_cpu_semaphore, prelude::*,
};

use super::{Document, DocumentAccess};

/// PDF MIME type, as reported by [`infer`].
const PDF_MIME_TYPE: &str = "application/pdf";

/// Poppler's natural resolution. A scale of 1.0 renders at this DPI.
const BASE_DPI: f32 = 72.0;

/// A default error regex for checking command output.
static ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Does this line contain an error?
fn is_error_line(line: &str) -> bool {
    ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// Opens PDFs using the Poppler command-line tools.
#[derive(Clone, Debug, Default)]
pub struct PopplerDocuments {
    /// Directory containing the Poppler tools. Uses `PATH` if not set.
    bin_dir: Option<PathBuf>,
}

impl PopplerDocuments {
    /// Create a new Poppler backend.
    pub fn new(bin_dir: Option<PathBuf>) -> Self {
        Self { bin_dir }
    }

    /// Build a [`Command`] for one of the Poppler tools.
    fn command(&self, tool: &str) -> Command {
        match &self.bin_dir {
            Some(dir) => Command::new(dir.join(tool)),
            None => Command::new(tool),
        }
    }

    /// Get the number of pages in a PDF file.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn page_count(&self, path: &Path) -> Result<usize> {
        let output = self
            .command("pdfinfo")
            .arg(path)
            .output()
            .await
            .with_context(|| format!("failed to run pdfinfo on {:?}", path.display()))?;
        check_for_command_failure("pdfinfo", &output, None)?;

        let output = String::from_utf8(output.stdout)
            .context("pdfinfo output was not valid UTF-8")?;
        parse_page_count(&output).with_context(|| {
            format!("failed to get page count for {:?}", path.display())
        })
    }
}

#[async_trait]
impl DocumentAccess for PopplerDocuments {
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn open(&self, path: &Path) -> Result<Box<dyn Document>> {
        let mime_type = get_mime_type(path)?;
        if mime_type != PDF_MIME_TYPE {
            return Err(anyhow!(
                "{} is not a PDF (detected {})",
                path.display(),
                mime_type
            ));
        }
        let page_count = self.page_count(path).await?;
        debug!(page_count, "opened PDF");
        Ok(Box::new(PopplerDocument {
            tools: self.clone(),
            path: path.to_owned(),
            page_count,
        }))
    }
}

/// A PDF that we've checked with `pdfinfo`.
struct PopplerDocument {
    tools: PopplerDocuments,
    path: PathBuf,
    page_count: usize,
}

#[async_trait]
impl Document for PopplerDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), page = page_idx))]
    async fn embedded_text(&self, page_idx: usize) -> Result<String> {
        // Poppler page numbers are 1-based and inclusive.
        let page = (page_idx + 1).to_string();
        let output = self
            .tools
            .command("pdftotext")
            .args(["-f", &page, "-l", &page, "-enc", "UTF-8"])
            .arg(&self.path)
            .arg("-")
            .output()
            .await
            .with_context(|| {
                format!("failed to run pdftotext on {:?}", self.path.display())
            })?;
        check_for_command_failure("pdftotext", &output, None)?;

        // pdftotext ends every page with a form feed.
        let text = String::from_utf8_lossy(&output.stdout).replace('\u{c}', "");
        Ok(text)
    }

    #[instrument(level = "debug", skip_all, fields(path = %self.path.display(), page = page_idx, scale = scale))]
    async fn rasterize(
        &self,
        page_idx: usize,
        scale: f32,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let page = (page_idx + 1).to_string();
        let dpi = dpi_for_scale(scale);

        // With `-singlefile`, pdftocairo appends only the extension.
        let out_base = out_dir.join(format!("page-{:05}", page_idx));
        let mut cmd = self.tools.command("pdftocairo");
        cmd.arg("-png")
            .arg("-singlefile")
            .args(["-r", &dpi.to_string()])
            .args(["-f", &page, "-l", &page])
            .arg(&self.path)
            .arg(&out_base);

        // `pdftocairo` will use _at least_ 100% of a CPU.
        let output = with_cpu_semaphore(|| async {
            cmd.output().await.with_context(|| {
                format!("failed to run pdftocairo on {:?}", self.path.display())
            })
        })
        .await?;
        check_for_command_failure("pdftocairo", &output, Some(&is_error_line))?;

        let png_path = out_base.with_extension("png");
        if !png_path.is_file() {
            return Err(anyhow!(
                "pdftocairo did not produce {:?}",
                png_path.display()
            ));
        }
        Ok(png_path)
    }
}

/// Convert a linear magnification into a rendering resolution.
fn dpi_for_scale(scale: f32) -> u32 {
    (BASE_DPI * scale).round().max(1.0) as u32
}

/// Find the `Pages:` entry in `pdfinfo` output.
fn parse_page_count(output: &str) -> Result<usize> {
    let mut properties = BTreeMap::new();
    for line in output.lines() {
        let mut parts = line.splitn(2, ':');
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        properties.insert(key.to_string(), value.to_string());
    }

    let page_count_str = properties
        .get("Pages")
        .ok_or_else(|| anyhow!("failed to find page count in pdfinfo output"))?;
    page_count_str
        .parse::<usize>()
        .with_context(|| format!("failed to parse page count {:?}", page_count_str))
}

/// Get the MIME type of a file.
pub fn get_mime_type(path: &Path) -> Result<String> {
    Ok(infer::get_from_path(path)
        .with_context(|| format!("failed to get MIME type for {:?}", path.display()))?
        .ok_or_else(|| anyhow!("unknown file type for {:?}", path.display()))?
        .mime_type()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_error_line_works() {
        assert!(is_error_line("error: something went wrong"));
        assert!(is_error_line("Syntax Error: Couldn't find trailer dictionary"));
        assert!(!is_error_line("Warning: something is odd"));
        assert!(!is_error_line(
            "Internal Error: xref num 1234 not found but needed, document has changes, reconstruct aborted"
        ));
    }

    #[test]
    fn parses_pdfinfo_output() {
        let output = "Title:          Invoice\nProducer:       LibreOffice\nPages:          2\nEncrypted:      no\n";
        assert_eq!(parse_page_count(output).unwrap(), 2);
        assert!(parse_page_count("Title: nothing here\n").is_err());
    }

    #[test]
    fn scale_two_is_144_dpi() {
        assert_eq!(dpi_for_scale(2.0), 144);
        assert_eq!(dpi_for_scale(1.0), 72);
        assert_eq!(dpi_for_scale(0.0), 1);
    }

    #[tokio::test]
    async fn refuses_non_pdf_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        // A PNG signature, whatever the extension says.
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();
        let err = PopplerDocuments::default().open(&path).await.err().unwrap();
        assert!(err.to_string().contains("is not a PDF"), "{err:#}");
    }

    #[tokio::test]
    async fn refuses_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, "just some text").unwrap();
        assert!(PopplerDocuments::default().open(&path).await.is_err());
    }
}
