//! Compositing of visible layers into a pixel buffer.

use crate::layers::{Layer, LayerKind, LayerManager};
use crate::viewport::Size;
use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

/// Draw every visible layer onto a `surface * multiplier` pixel buffer.
pub fn capture(layers: &LayerManager, surface: Size, multiplier: f32, background: Rgba<u8>) -> RgbaImage {
    let (width, height) = surface.scaled(multiplier).to_pixels();
    let mut canvas = RgbaImage::from_pixel(width, height, background);

    for layer in layers.draw_order().into_iter().filter(|l| l.visible) {
        match &layer.kind {
            LayerKind::PageImage { bitmap, .. } => draw_bitmap(&mut canvas, layer, bitmap, multiplier),
            LayerKind::BorderRect {
                color, stroke_width, ..
            } => draw_border(&mut canvas, layer, *color, *stroke_width, multiplier),
        }
    }

    canvas
}

fn draw_bitmap(canvas: &mut RgbaImage, layer: &Layer, bitmap: &RgbaImage, multiplier: f32) {
    let (width, height) = layer.size().scaled(multiplier).to_pixels();
    let x = (layer.position.left * multiplier).round() as i64;
    let y = (layer.position.top * multiplier).round() as i64;

    if bitmap.dimensions() == (width, height) {
        imageops::overlay(canvas, bitmap, x, y);
    } else {
        let resized = imageops::resize(bitmap, width, height, FilterType::Triangle);
        imageops::overlay(canvas, &resized, x, y);
    }
}

fn draw_border(canvas: &mut RgbaImage, layer: &Layer, color: Rgba<u8>, stroke_width: f32, multiplier: f32) {
    let size = layer.size().scaled(multiplier);
    let stroke = ((stroke_width * multiplier).round() as i64).max(1);
    let x0 = (layer.position.left * multiplier).round() as i64;
    let y0 = (layer.position.top * multiplier).round() as i64;
    let x1 = x0 + size.width.round() as i64;
    let y1 = y0 + size.height.round() as i64;

    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    for y in y0.max(0)..y1.min(ch) {
        for x in x0.max(0)..x1.min(cw) {
            let on_edge = x < x0 + stroke || x >= x1 - stroke || y < y0 + stroke || y >= y1 - stroke;
            if on_edge {
                canvas.get_pixel_mut(x as u32, y as u32).blend(&color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::PageBitmap;
    use crate::layers::LayerDefaults;
    use crate::viewport::Position;
    use std::sync::Arc;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn solid(index: usize, width: u32, height: u32, color: Rgba<u8>) -> PageBitmap {
        PageBitmap {
            page_index: index,
            image: Arc::new(RgbaImage::from_pixel(width, height, color)),
        }
    }

    #[test]
    fn test_only_visible_page_is_drawn() {
        let mut layers = LayerManager::new(LayerDefaults::default());
        layers.add_page_layer(solid(0, 10, 10, RED), 1.0);
        layers.add_page_layer(solid(1, 10, 10, BLUE), 1.0);
        layers.show_page(1).unwrap();

        let image = capture(&layers, Size::new(10.0, 10.0), 1.0, CLEAR);
        assert_eq!(image.dimensions(), (10, 10));
        assert!(image.pixels().all(|p| *p == BLUE));
    }

    #[test]
    fn test_device_ratio_downscales_bitmap() {
        let mut layers = LayerManager::new(LayerDefaults::default());
        let id = layers.add_page_layer(solid(0, 20, 20, RED), 2.0);
        layers.set_position(id, Position::new(5.0, 5.0));

        let image = capture(&layers, Size::new(20.0, 20.0), 1.0, CLEAR);
        assert_eq!(*image.get_pixel(4, 4), CLEAR);
        assert_eq!(*image.get_pixel(5, 5), RED);
        assert_eq!(*image.get_pixel(14, 14), RED);
        assert_eq!(*image.get_pixel(15, 15), CLEAR);
    }

    #[test]
    fn test_multiplier_scales_output() {
        let mut layers = LayerManager::new(LayerDefaults::default());
        layers.add_page_layer(solid(0, 10, 10, RED), 1.0);
        let image = capture(&layers, Size::new(10.0, 10.0), 2.0, CLEAR);
        assert_eq!(image.dimensions(), (20, 20));
        assert_eq!(*image.get_pixel(19, 19), RED);
    }

    #[test]
    fn test_border_outline() {
        let mut layers = LayerManager::new(LayerDefaults::default());
        layers.add_border(Size::new(6.0, 6.0));
        layers.center_all(Size::new(10.0, 10.0));

        let image = capture(&layers, Size::new(10.0, 10.0), 1.0, CLEAR);
        assert_eq!(*image.get_pixel(2, 2), RED);
        assert_eq!(*image.get_pixel(7, 5), RED);
        assert_eq!(*image.get_pixel(5, 5), CLEAR);
        assert_eq!(*image.get_pixel(1, 1), CLEAR);
    }
}
