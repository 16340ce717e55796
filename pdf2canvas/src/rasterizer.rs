//! Batch rasterization of a decoded document.

use crate::decoder::{Decoder, Document, PageBitmap, PdfBackend};
use crate::error::{Result, ViewerError};
use serde::Deserialize;

/// What to do when a single page fails to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderFailurePolicy {
    /// Any failed page fails the whole load.
    #[default]
    FailBatch,
    /// Drop the failed page and keep the rest.
    SkipPage,
}

/// Restricts rasterization to a set of 1-based page numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFilter {
    numbers: Vec<usize>,
}

impl PageFilter {
    pub fn new(numbers: impl IntoIterator<Item = usize>) -> Self {
        Self {
            numbers: numbers.into_iter().collect(),
        }
    }

    pub fn includes(&self, page_index: usize) -> bool {
        self.numbers.contains(&(page_index + 1))
    }
}

/// Output of [`Rasterizer::rasterize_all`].
#[derive(Debug, Clone)]
pub struct RasterizedDocument {
    /// Bitmaps in page order.
    pub pages: Vec<PageBitmap>,
    /// Pixel size of the first rendered bitmap, or `None` when nothing rendered.
    pub first_page_px: Option<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rasterizer {
    quality: f32,
    device_pixel_ratio: f32,
    policy: RenderFailurePolicy,
}

impl Rasterizer {
    pub fn new(quality: f32, device_pixel_ratio: f32) -> Self {
        Self {
            quality,
            device_pixel_ratio,
            policy: RenderFailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RenderFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bitmaps are rendered at full device resolution and drawn back at
    /// `1 / device_pixel_ratio`.
    pub fn scale_multiplier(&self) -> f32 {
        self.quality * self.device_pixel_ratio
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn rasterize_all<B: PdfBackend>(
        &self,
        decoder: &Decoder<B>,
        document: &Document,
        filter: Option<&PageFilter>,
    ) -> Result<RasterizedDocument> {
        let wanted: Vec<usize> = (0..document.page_count())
            .filter(|&index| filter.map_or(true, |f| f.includes(index)))
            .collect();

        tracing::info!(
            requested = wanted.len(),
            total = document.page_count(),
            scale = self.scale_multiplier(),
            "rasterizing document"
        );

        let results = decoder.render_pages(document, &wanted, self.scale_multiplier())?;

        let mut pages = Vec::with_capacity(results.len());
        let mut first_error: Option<ViewerError> = None;
        for result in results {
            match result {
                Ok(bitmap) => pages.push(bitmap),
                Err(e) => {
                    tracing::warn!("{}", e);
                    if self.policy == RenderFailurePolicy::FailBatch && first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let first_page_px = pages.first().map(|p| (p.width(), p.height()));
        Ok(RasterizedDocument {
            pages,
            first_page_px,
        })
    }
}
