//! Viewer configuration.
//!
//! Every field has a default, so a config file only needs the values it wants
//! to change.

use crate::error::{Result, ViewerError};
use crate::rasterizer::RenderFailurePolicy;
use crate::viewport::Margins;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Oversampling applied on top of the device pixel ratio when rasterizing.
    pub quality: f32,
    /// Physical pixels per logical pixel of the display.
    pub device_pixel_ratio: f32,
    /// Space added around the page for display, removed again on export.
    pub margins: Margins,
    /// Discrete zoom levels cycled by `toggle_zoom`.
    pub zoom_levels: Vec<f32>,
    pub initial_zoom: f32,
    pub render_failure: RenderFailurePolicy,
    /// 1-based page numbers to rasterize; `None` renders every page.
    pub page_filter: Option<Vec<usize>>,
    pub restore_page_after_export_all: bool,
    pub border: BorderStyle,
    /// RGBA fill behind the layers.
    pub background: [u8; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BorderStyle {
    pub color: [u8; 4],
    pub width: f32,
}

impl Default for BorderStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0, 255],
            width: 1.0,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            quality: 2.0,
            device_pixel_ratio: 1.0,
            margins: Margins { x: 100.0, y: 100.0 },
            zoom_levels: vec![0.25, 0.5, 1.0],
            initial_zoom: 1.0,
            render_failure: RenderFailurePolicy::FailBatch,
            page_filter: None,
            restore_page_after_export_all: true,
            border: BorderStyle::default(),
            background: [0, 0, 0, 0],
        }
    }
}

impl ViewerConfig {
    /// Read a JSON config file and validate it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ViewerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f32) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ViewerError::Config(format!("{} must be positive, got {}", name, value)))
            }
        }

        positive("quality", self.quality)?;
        positive("device_pixel_ratio", self.device_pixel_ratio)?;
        positive("initial_zoom", self.initial_zoom)?;
        positive("border.width", self.border.width)?;

        if self.zoom_levels.is_empty() {
            return Err(ViewerError::Config("zoom_levels must not be empty".into()));
        }
        for level in &self.zoom_levels {
            positive("zoom level", *level)?;
        }

        let margins_ok = |v: f32| v.is_finite() && v >= 0.0;
        if !margins_ok(self.margins.x) || !margins_ok(self.margins.y) {
            return Err(ViewerError::Config(format!(
                "margins must be non-negative, got {:?}",
                self.margins
            )));
        }

        if let Some(filter) = &self.page_filter {
            if filter.contains(&0) {
                return Err(ViewerError::Config("page numbers start at 1".into()));
            }
        }

        Ok(())
    }
}
