use crate::error::{Result, ViewerError};
use crate::layers::{LayerId, LayerManager};
use serde::Deserialize;

/// Logical size, in CSS-style pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    pub fn padded(self, margins: Margins) -> Self {
        Self::new(self.width + margins.x, self.height + margins.y)
    }

    /// Whole pixel dimensions, never smaller than 1x1.
    pub fn to_pixels(self) -> (u32, u32) {
        let px = |v: f32| (v.round() as u32).max(1);
        (px(self.width), px(self.height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub left: f32,
    pub top: f32,
}

impl Position {
    pub fn new(left: f32, top: f32) -> Self {
        Self { left, top }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.left + dx, self.top + dy)
    }
}

/// Total space added around a page on each axis. Layout pads by the full
/// amount; export crops half of it from each side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Margins {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct CropSnapshot {
    zoom: f32,
    surface: Size,
    positions: Vec<(LayerId, Position)>,
}

/// Viewport manages the view state of a loaded document: page sizes in the
/// three coordinate spaces, zoom, crop and pagination. Scrolling a
/// surface larger than the window is left to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    natural: Size,
    padded: Size,
    margins: Margins,
    zoom: f32,
    surface: Size,
    current_page: usize,
    page_count: usize,
    crop: Option<CropSnapshot>,
}

impl Viewport {
    pub const DEFAULT_ZOOM: f32 = 1.0;

    pub fn new(natural: Size, margins: Margins, page_count: usize) -> Self {
        let padded = natural.padded(margins);
        Self {
            natural,
            padded,
            margins,
            zoom: Self::DEFAULT_ZOOM,
            surface: padded,
            current_page: 0,
            page_count,
            crop: None,
        }
    }

    /// Natural size is the first page's raw pixel size in logical units.
    pub fn from_first_page(
        first_page_px: (u32, u32),
        device_pixel_ratio: f32,
        margins: Margins,
        page_count: usize,
    ) -> Self {
        let natural = Size::new(first_page_px.0 as f32, first_page_px.1 as f32)
            .scaled(1.0 / device_pixel_ratio);
        Self::new(natural, margins, page_count)
    }

    pub fn natural_size(&self) -> Size {
        self.natural
    }

    pub fn padded_size(&self) -> Size {
        self.padded
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    /// Current surface size: `padded * zoom`, or the natural size while cropped.
    pub fn surface_size(&self) -> Size {
        self.surface
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn is_cropped(&self) -> bool {
        self.crop.is_some()
    }

    /// Layers stay in padded coordinates; only the surface is resized.
    pub fn set_zoom(&mut self, zoom: f32) -> Result<()> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(ViewerError::InvalidZoom(zoom));
        }
        if self.is_cropped() {
            return Err(ViewerError::AlreadyCropped);
        }
        self.zoom = zoom;
        self.surface = self.padded.scaled(zoom);
        tracing::debug!(zoom, width = self.surface.width, height = self.surface.height, "zoom set");
        Ok(())
    }

    /// Step to the level after the current one, wrapping. A zoom that is not
    /// one of `levels` jumps to the first level.
    pub fn toggle_zoom(&mut self, levels: &[f32]) -> Result<f32> {
        let next = match levels.iter().position(|&level| level == self.zoom) {
            Some(i) => levels[(i + 1) % levels.len()],
            None => *levels.first().ok_or(ViewerError::InvalidZoom(self.zoom))?,
        };
        self.set_zoom(next)?;
        Ok(next)
    }

    /// Remove the margins and reset zoom to 1 ahead of a capture.
    pub fn crop(&mut self, layers: &mut LayerManager) -> Result<()> {
        if self.is_cropped() {
            return Err(ViewerError::AlreadyCropped);
        }

        self.crop = Some(CropSnapshot {
            zoom: self.zoom,
            surface: self.surface,
            positions: layers.positions(),
        });

        self.zoom = 1.0;
        self.surface = self.natural;
        let (dx, dy) = (-self.margins.x / 2.0, -self.margins.y / 2.0);
        for id in layers.page_layer_ids() {
            layers.translate(id, dx, dy);
        }
        Ok(())
    }

    /// Undo [`Viewport::crop`]. State is restored from the snapshot rather than
    /// shifted back, so the round trip is exact.
    pub fn uncrop(&mut self, layers: &mut LayerManager) -> Result<()> {
        let snapshot = self.crop.take().ok_or(ViewerError::NotCropped)?;
        self.zoom = snapshot.zoom;
        self.surface = snapshot.surface;
        for (id, position) in snapshot.positions {
            layers.set_position(id, position);
        }
        Ok(())
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn set_page(&mut self, page: usize) -> Result<()> {
        if page >= self.page_count {
            return Err(ViewerError::Bounds {
                index: page,
                page_count: self.page_count,
            });
        }
        self.current_page = page;
        Ok(())
    }

    pub fn next_page(&mut self) -> bool {
        if self.current_page + 1 < self.page_count {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }
}
