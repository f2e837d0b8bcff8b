//! In-memory documents for unit tests.

use std::sync::{Arc, Mutex};

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

use super::{Document, DocumentAccess};
use crate::prelude::*;

/// Shared record of what the pipeline asked for.
#[derive(Debug, Default)]
pub struct MockLog {
    /// Pages that were rasterized.
    pub rasterized_pages: Vec<usize>,
    /// The scale each page was rasterized at.
    pub rasterized_scales: Vec<f32>,
    /// Every image file we wrote.
    pub rasterized_paths: Vec<PathBuf>,
}

/// Opens the same scripted document for any path.
pub struct MockDocuments {
    /// Embedded text for each page.
    pages: Vec<String>,
    /// Pages whose rasterization should fail.
    broken_pages: Vec<usize>,
    /// If set, `open` fails with this message.
    open_error: Option<String>,
    log: Arc<Mutex<MockLog>>,
}

impl MockDocuments {
    /// A document with the given embedded text per page.
    pub fn with_pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|&page| page.to_owned()).collect(),
            broken_pages: vec![],
            open_error: None,
            log: Arc::default(),
        }
    }

    /// A document that cannot be opened.
    pub fn unopenable(message: &str) -> Self {
        Self {
            open_error: Some(message.to_owned()),
            ..Self::with_pages(&[])
        }
    }

    /// Make rasterizing `page_idx` fail.
    pub fn with_broken_page(mut self, page_idx: usize) -> Self {
        self.broken_pages.push(page_idx);
        self
    }

    /// Get a handle to our log.
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl DocumentAccess for MockDocuments {
    async fn open(&self, _path: &Path) -> Result<Box<dyn Document>> {
        if let Some(message) = &self.open_error {
            return Err(anyhow!(message.clone()));
        }
        Ok(Box::new(MockDocument {
            pages: self.pages.clone(),
            broken_pages: self.broken_pages.clone(),
            log: self.log.clone(),
        }))
    }
}

struct MockDocument {
    pages: Vec<String>,
    broken_pages: Vec<usize>,
    log: Arc<Mutex<MockLog>>,
}

#[async_trait]
impl Document for MockDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn embedded_text(&self, page_idx: usize) -> Result<String> {
        self.pages
            .get(page_idx)
            .cloned()
            .ok_or_else(|| anyhow!("no page {}", page_idx))
    }

    async fn rasterize(
        &self,
        page_idx: usize,
        scale: f32,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let mut log = self.log.lock().expect("lock poisoned");
        log.rasterized_pages.push(page_idx);
        log.rasterized_scales.push(scale);
        if self.broken_pages.contains(&page_idx) {
            return Err(anyhow!("cannot render page {}", page_idx));
        }

        let size = (8.0 * scale) as u32;
        let image: GrayImage = ImageBuffer::from_fn(size, size, |_, _| Luma([255u8]));
        let path = out_dir.join(format!("page-{:05}.png", page_idx));
        DynamicImage::ImageLuma8(image).save(&path)?;
        log.rasterized_paths.push(path.clone());
        Ok(path)
    }
}
