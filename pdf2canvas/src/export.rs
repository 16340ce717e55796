//! Export of the current page at 1:1 scale.
//!
//! A snapshot hides the border, crops the margins away, captures the surface
//! at multiplier 1 and then restores everything. The whole sequence runs under
//! a single `&mut` borrow with no suspension point.

use crate::error::{Result, ViewerError};
use crate::layers::LayerManager;
use crate::surface;
use crate::viewport::Viewport;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Rgba, RgbaImage};
use rand::Rng;
use std::io::Cursor;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Reported for downloads so hosts save the file instead of displaying it.
pub const DOWNLOAD_MIME: &str = "image/octet-stream";

/// Capture the visible page at natural size, whatever the zoom.
pub fn snapshot(layers: &mut LayerManager, viewport: &mut Viewport, background: Rgba<u8>) -> Result<RgbaImage> {
    let border = layers.border_visible();
    layers.set_border_visible(false);

    let captured = viewport.crop(layers).map(|()| {
        let image = surface::capture(layers, viewport.surface_size(), 1.0, background);
        viewport.uncrop(layers).map(|()| image)
    });

    if let Some(visible) = border {
        layers.set_border_visible(visible);
    }

    let image = captured??;
    tracing::debug!(width = image.width(), height = image.height(), "captured snapshot");
    Ok(image)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| ViewerError::Encode(e.to_string()))?;
    Ok(png_bytes)
}

pub fn to_data_url(png: &[u8]) -> String {
    format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png))
}

/// A PNG ready to be saved by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedImage {
    pub fn download(bytes: Vec<u8>) -> Self {
        let suffix: u32 = rand::rng().random_range(0..1000);
        Self {
            file_name: format!("my-image-{}.png", suffix),
            mime: DOWNLOAD_MIME,
            bytes,
        }
    }

    pub fn to_data_url(&self) -> String {
        to_data_url(&self.bytes)
    }
}

/// One page of an `export_all` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExport {
    /// Position of the page in the viewer, 0-based.
    pub page: usize,
    pub png: Vec<u8>,
}

impl PageExport {
    pub fn to_data_url(&self) -> String {
        to_data_url(&self.png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use crate::decoder::PageBitmap;
    use crate::layers::LayerDefaults;
    use crate::viewport::Margins;
    use std::sync::Arc;

    const GREEN: Rgba<u8> = Rgba([0, 200, 0, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn setup(dpr: f32) -> (LayerManager, Viewport) {
        let px = (40.0 * dpr) as u32;
        let viewport = Viewport::from_first_page((px, px), dpr, Margins { x: 20.0, y: 10.0 }, 1);
        let mut layers = LayerManager::new(LayerDefaults::default());
        layers.add_page_layer(
            PageBitmap {
                page_index: 0,
                image: Arc::new(RgbaImage::from_pixel(px, px, GREEN)),
            },
            dpr,
        );
        layers.add_border(viewport.natural_size());
        layers.center_all(viewport.padded_size());
        (layers, viewport)
    }

    #[test]
    fn test_snapshot_is_natural_size_at_any_zoom() {
        for zoom in [0.25, 0.5, 1.0, 3.0] {
            let (mut layers, mut viewport) = setup(2.0);
            viewport.set_zoom(zoom).unwrap();

            let image = snapshot(&mut layers, &mut viewport, CLEAR).unwrap();
            assert_eq!(image.dimensions(), (40, 40));
            assert!(image.pixels().all(|p| *p == GREEN), "margin or border leaked at zoom {}", zoom);
            assert_eq!(viewport.zoom(), zoom);
        }
    }

    #[test]
    fn test_snapshot_restores_border_and_layout() {
        let (mut layers, mut viewport) = setup(1.0);
        let positions = layers.positions();
        let before = viewport.clone();

        snapshot(&mut layers, &mut viewport, CLEAR).unwrap();
        assert_eq!(layers.border_visible(), Some(true));
        assert_eq!(layers.positions(), positions);
        assert_eq!(viewport, before);
    }

    #[test]
    fn test_snapshot_fails_cleanly_while_cropped() {
        let (mut layers, mut viewport) = setup(1.0);
        viewport.crop(&mut layers).unwrap();
        assert!(matches!(
            snapshot(&mut layers, &mut viewport, CLEAR),
            Err(ViewerError::AlreadyCropped)
        ));
        assert_eq!(layers.border_visible(), Some(true));
    }

    #[test]
    fn test_png_and_data_url() {
        let image = RgbaImage::from_pixel(3, 2, GREEN);
        let png = encode_png(&image).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().into_rgba8();
        assert_eq!(decoded, image);

        let url = to_data_url(&png);
        assert!(url.starts_with(PNG_DATA_URL_PREFIX));
        assert_eq!(STANDARD.decode(&url[PNG_DATA_URL_PREFIX.len()..]).unwrap(), png);
    }

    #[test]
    fn test_download_naming() {
        let export = ExportedImage::download(vec![1, 2, 3]);
        assert_eq!(export.mime, "image/octet-stream");
        let number = export
            .file_name
            .strip_prefix("my-image-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap();
        assert!(number < 1000);
    }
}
