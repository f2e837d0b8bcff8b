//! Find a usable `tesseract` binary at startup.

use std::{env, time::Duration};

use tokio::process::Command;

use crate::{async_utils::output_with_timeout, prelude::*};

/// How long we let `tesseract --version` run before giving up on it.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to get Tesseract if we can't find it.
const INSTALL_HINT: &str = "install Tesseract OCR (Windows builds: https://github.com/UB-Mannheim/tesseract/wiki) \
     or pass --tesseract-path";

/// The outcome of looking for `tesseract`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TesseractLocation {
    /// The command to run.
    pub command: PathBuf,
    /// Did we actually confirm that `command` works?
    pub verified: bool,
}

/// Common install locations, checked after `PATH`.
fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe"),
        PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe"),
    ];
    if let Some(local_app_data) = env::var_os("LOCALAPPDATA") {
        candidates.push(
            PathBuf::from(local_app_data)
                .join("Programs")
                .join("Tesseract-OCR")
                .join("tesseract.exe"),
        );
    }
    candidates.extend([
        PathBuf::from("/usr/local/bin/tesseract"),
        PathBuf::from("/opt/homebrew/bin/tesseract"),
        PathBuf::from("/usr/bin/tesseract"),
    ]);
    candidates
}

/// Does `command --version` run successfully?
async fn probe(command: &Path) -> bool {
    let mut cmd = Command::new(command);
    cmd.arg("--version");
    match output_with_timeout(&mut cmd, PROBE_TIMEOUT).await {
        Ok(output) => output.status.success(),
        Err(err) => {
            debug!(command = %command.display(), "tesseract probe failed: {:#}", err);
            false
        }
    }
}

/// Decide which `tesseract` to use.
///
/// An explicit path always wins, even if it doesn't work, so that a
/// misconfigured server reports errors instead of silently using some other
/// binary.
#[instrument(level = "debug", skip_all)]
pub async fn locate_tesseract(explicit: Option<&Path>) -> TesseractLocation {
    if let Some(command) = explicit {
        let verified = probe(command).await;
        if !verified {
            warn!(
                command = %command.display(),
                "configured tesseract does not run; OCR requests will fail"
            );
        }
        return TesseractLocation {
            command: command.to_owned(),
            verified,
        };
    }

    let on_path = PathBuf::from("tesseract");
    if probe(&on_path).await {
        return TesseractLocation {
            command: on_path,
            verified: true,
        };
    }

    for candidate in candidate_paths() {
        if candidate.is_file() && probe(&candidate).await {
            info!(command = %candidate.display(), "found tesseract");
            return TesseractLocation {
                command: candidate,
                verified: true,
            };
        }
    }

    warn!("tesseract not found; {}", INSTALL_HINT);
    TesseractLocation {
        command: on_path,
        verified: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_path_is_kept_even_if_broken() {
        let broken = Path::new("/nonexistent/bin/tesseract");
        let location = locate_tesseract(Some(broken)).await;
        assert_eq!(location.command, broken);
        assert!(!location.verified);
    }

    #[test]
    fn candidates_include_windows_and_unix_locations() {
        let candidates = candidate_paths();
        assert!(
            candidates
                .iter()
                .any(|path| path.to_string_lossy().contains("Tesseract-OCR"))
        );
        assert!(candidates.contains(&PathBuf::from("/usr/bin/tesseract")));
    }
}
