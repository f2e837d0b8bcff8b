//! Tesseract OCR engine.

use std::time::Duration;

use tokio::{fs, process::Command};

use crate::{
    async_utils::{check_for_command_failure, output_with_timeout},
    cpu_limit::with_cpu_semaphore,
    prelude::*,
};

use super::{ENGINE_MODE, OcrEngine, PAGE_SEGMENTATION_MODE, Recognition};

/// How long we wait for quick informational commands.
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// OCR engine wrapping the `tesseract` CLI tool.
#[derive(Clone, Debug)]
pub struct TesseractEngine {
    /// The `tesseract` executable.
    command: PathBuf,
}

impl TesseractEngine {
    /// Create a new `tesseract` engine.
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }

    /// Run a quick query like `--version` and return its output.
    async fn query(&self, arg: &str) -> Result<std::process::Output> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(arg);
        let output = output_with_timeout(&mut cmd, QUERY_TIMEOUT)
            .await
            .with_context(|| {
                format!("cannot run {} {}", self.command.display(), arg)
            })?;
        check_for_command_failure("tesseract", &output, None)?;
        Ok(output)
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    #[instrument(level = "debug", skip_all, fields(image = %image_path.display(), language = %language))]
    async fn recognize(&self, image_path: &Path, language: &str) -> Result<Recognition> {
        // Tesseract writes `<base>.txt` and `<base>.tsv` for us.
        let tmpdir = tempfile::TempDir::with_prefix("tesseract")?;
        let output_base = tmpdir.path().join("output");

        let mut cmd = Command::new(&self.command);
        cmd.arg(image_path)
            .arg(&output_base)
            .arg("--oem")
            .arg(ENGINE_MODE.to_string())
            .arg("--psm")
            .arg(PAGE_SEGMENTATION_MODE.to_string())
            .arg("-l")
            .arg(language)
            .arg("txt")
            .arg("tsv");
        let output = with_cpu_semaphore(|| async {
            cmd.output()
                .await
                .with_context(|| format!("cannot run {}", self.command.display()))
        })
        .await?;
        check_for_command_failure("tesseract", &output, None)?;

        let text = fs::read_to_string(output_base.with_extension("txt"))
            .await
            .context("cannot read tesseract text output")?;
        let confidences = read_confidences(&output_base.with_extension("tsv")).await;
        debug!(
            chars = text.len(),
            tokens = confidences.len(),
            "tesseract finished"
        );
        Ok(Recognition { text, confidences })
    }

    #[instrument(level = "debug", skip_all)]
    async fn installed_languages(&self) -> Result<Vec<String>> {
        let output = self.query("--list-langs").await?;
        Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
    }

    #[instrument(level = "debug", skip_all)]
    async fn version(&self) -> Result<String> {
        let output = self.query("--version").await?;
        // Old releases print their version to stderr.
        let version = first_line(&String::from_utf8_lossy(&output.stdout))
            .or_else(|| first_line(&String::from_utf8_lossy(&output.stderr)))
            .unwrap_or_else(|| "unknown".to_owned());
        Ok(version)
    }

    fn location(&self) -> String {
        self.command.display().to_string()
    }
}

/// Read per-token confidences from a TSV file.
///
/// Missing or malformed confidences never cost us the text, so any problem
/// here just means "no confidences".
async fn read_confidences(tsv_path: &Path) -> Vec<f32> {
    let confidences = match fs::read_to_string(tsv_path).await {
        Ok(tsv) => parse_tsv_confidences(&tsv),
        Err(err) => Err(err).context("cannot read tesseract TSV output"),
    };
    confidences.unwrap_or_else(|err| {
        debug!("ignoring tesseract confidences: {:#}", err);
        vec![]
    })
}

/// Pull the `conf` column out of `tesseract`'s TSV output.
fn parse_tsv_confidences(tsv: &str) -> Result<Vec<f32>> {
    let mut lines = tsv.lines();
    let header = lines
        .next()
        .ok_or_else(|| anyhow!("tesseract TSV output was empty"))?;
    let conf_idx = header
        .split('\t')
        .position(|column| column.trim() == "conf")
        .ok_or_else(|| anyhow!("tesseract TSV output has no conf column"))?;

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let field = line
                .split('\t')
                .nth(conf_idx)
                .ok_or_else(|| anyhow!("short line in tesseract TSV output: {:?}", line))?;
            field
                .trim()
                .parse::<f32>()
                .with_context(|| format!("bad confidence in tesseract TSV: {:?}", field))
        })
        .collect()
}

/// Parse `tesseract --list-langs` output into sorted language codes.
fn parse_language_list(output: &str) -> Vec<String> {
    let mut languages = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of available languages"))
        .map(str::to_owned)
        .collect::<Vec<_>>();
    languages.sort();
    languages.dedup();
    languages
}

/// Get the first non-blank line of some output.
fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_owned)
}
