//! The project directory that all tool paths are relative to.

use std::io;

use thiserror::Error;

use crate::prelude::*;

/// Why a requested path could not be used.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Nothing exists at the requested path.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The path exists, but it is not inside the project directory.
    #[error("path is outside the project directory: {0}")]
    OutsideRoot(String),

    /// We could not canonicalize the path.
    #[error("cannot resolve {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A validated, canonical project directory.
///
/// This is created once at startup and handed to everything that needs to
/// resolve a user-supplied path.
#[derive(Clone, Debug)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    /// Validate `path` and convert it to an absolute, canonical directory.
    pub fn new(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(anyhow!(
                "project directory does not exist or is not a directory: {}",
                path.display()
            ));
        }
        let root = path.canonicalize().with_context(|| {
            format!("cannot canonicalize project directory {}", path.display())
        })?;
        Ok(Self { root })
    }

    /// The canonical path of the project directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` against the project directory.
    ///
    /// The result is canonical, and guaranteed to live inside the project
    /// directory.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ResolveError> {
        let joined = self.root.join(relative);
        if !joined.exists() {
            return Err(ResolveError::NotFound(relative.to_owned()));
        }
        let canonical = joined.canonicalize().map_err(|source| ResolveError::Io {
            path: relative.to_owned(),
            source,
        })?;
        if canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(ResolveError::OutsideRoot(relative.to_owned()))
        }
    }
}
