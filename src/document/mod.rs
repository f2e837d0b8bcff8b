//! Access to page-oriented documents (PDFs).

use crate::prelude::*;

#[cfg(test)]
pub mod mock;
pub mod poppler;

/// Something that can open documents.
#[async_trait]
pub trait DocumentAccess: Send + Sync + 'static {
    /// Open the document at `path`. Fails if it is not a readable document.
    async fn open(&self, path: &Path) -> Result<Box<dyn Document>>;
}

/// An open document. Closed when dropped.
#[async_trait]
pub trait Document: Send + Sync {
    /// Number of pages.
    fn page_count(&self) -> usize;

    /// The embedded text layer of a page (0-based). May be empty.
    async fn embedded_text(&self, page_idx: usize) -> Result<String>;

    /// Render a page (0-based) to a PNG inside `out_dir`, at `scale` times
    /// its natural size, and return the path of the image.
    async fn rasterize(&self, page_idx: usize, scale: f32, out_dir: &Path)
    -> Result<PathBuf>;
}
