//! Layers placed on the drawing surface: one image per page plus an optional
//! border rectangle.

use crate::config::BorderStyle;
use crate::decoder::PageBitmap;
use crate::error::{Result, ViewerError};
use crate::viewport::{Position, Size};
use image::{Rgba, RgbaImage};
use std::sync::Arc;

/// The border always draws above every page.
const BORDER_Z: i32 = i32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

#[derive(Debug, Clone)]
pub enum LayerKind {
    PageImage {
        page_index: usize,
        bitmap: Arc<RgbaImage>,
    },
    BorderRect {
        size: Size,
        color: Rgba<u8>,
        stroke_width: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub id: LayerId,
    pub kind: LayerKind,
    pub visible: bool,
    pub position: Position,
    pub scale: Scale,
    pub z: i32,
    pub selectable: bool,
}

impl Layer {
    /// Size in logical units after scaling.
    pub fn size(&self) -> Size {
        match &self.kind {
            LayerKind::PageImage { bitmap, .. } => Size::new(
                bitmap.width() as f32 * self.scale.x,
                bitmap.height() as f32 * self.scale.y,
            ),
            LayerKind::BorderRect { size, .. } => Size::new(size.width * self.scale.x, size.height * self.scale.y),
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self.kind, LayerKind::PageImage { .. })
    }
}

/// Properties stamped onto every layer the manager creates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerDefaults {
    pub pages_selectable: bool,
    pub border: BorderStyle,
}

impl Default for LayerDefaults {
    fn default() -> Self {
        Self {
            pages_selectable: true,
            border: BorderStyle::default(),
        }
    }
}

impl LayerDefaults {
    fn page_layer(&self, id: LayerId, z: i32, bitmap: PageBitmap, device_pixel_ratio: f32) -> Layer {
        let scale = 1.0 / device_pixel_ratio;
        Layer {
            id,
            kind: LayerKind::PageImage {
                page_index: bitmap.page_index,
                bitmap: bitmap.image,
            },
            visible: false,
            position: Position::default(),
            scale: Scale { x: scale, y: scale },
            z,
            selectable: self.pages_selectable,
        }
    }

    fn border_layer(&self, id: LayerId, size: Size) -> Layer {
        Layer {
            id,
            kind: LayerKind::BorderRect {
                size,
                color: Rgba(self.border.color),
                stroke_width: self.border.width,
            },
            visible: true,
            position: Position::default(),
            scale: Scale { x: 1.0, y: 1.0 },
            z: BORDER_Z,
            selectable: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayerManager {
    defaults: LayerDefaults,
    layers: Vec<Layer>,
    /// Ids of page layers in page order.
    pages: Vec<LayerId>,
    border: Option<LayerId>,
    current: Option<usize>,
    next_id: usize,
}

impl LayerManager {
    pub fn new(defaults: LayerDefaults) -> Self {
        Self {
            defaults,
            layers: Vec::new(),
            pages: Vec::new(),
            border: None,
            current: None,
            next_id: 0,
        }
    }

    fn allocate_id(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a page drawn at `1 / device_pixel_ratio`. The first page added
    /// becomes current and visible; later pages start hidden.
    pub fn add_page_layer(&mut self, bitmap: PageBitmap, device_pixel_ratio: f32) -> LayerId {
        let id = self.allocate_id();
        let slot = self.pages.len();
        let mut layer = self
            .defaults
            .page_layer(id, slot as i32, bitmap, device_pixel_ratio);

        if self.current.is_none() {
            self.current = Some(slot);
            layer.visible = true;
        }

        self.layers.push(layer);
        self.pages.push(id);
        id
    }

    /// Add the decorative border, or resize it if one exists.
    pub fn add_border(&mut self, size: Size) -> LayerId {
        if let Some(id) = self.border {
            if let Some(layer) = self.layer_mut(id) {
                if let LayerKind::BorderRect { size: current, .. } = &mut layer.kind {
                    *current = size;
                }
            }
            return id;
        }

        let id = self.allocate_id();
        let layer = self.defaults.border_layer(id, size);
        self.layers.push(layer);
        self.border = Some(id);
        id
    }

    /// Make page `index` the only visible page layer.
    pub fn show_page(&mut self, index: usize) -> Result<()> {
        let target = *self.pages.get(index).ok_or(ViewerError::Bounds {
            index,
            page_count: self.pages.len(),
        })?;

        for layer in self.layers.iter_mut().filter(|l| l.is_page()) {
            layer.visible = layer.id == target;
        }
        self.current = Some(index);
        Ok(())
    }

    pub fn current_page(&self) -> Option<usize> {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_layer_ids(&self) -> Vec<LayerId> {
        self.pages.clone()
    }

    pub fn page_layer(&self, index: usize) -> Option<&Layer> {
        self.pages.get(index).and_then(|&id| self.layer(id))
    }

    pub fn visible_page_count(&self) -> usize {
        self.layers.iter().filter(|l| l.is_page() && l.visible).count()
    }

    pub fn border(&self) -> Option<LayerId> {
        self.border
    }

    pub fn border_visible(&self) -> Option<bool> {
        self.border.and_then(|id| self.layer(id)).map(|l| l.visible)
    }

    pub fn set_border_visible(&mut self, visible: bool) {
        if let Some(id) = self.border {
            if let Some(layer) = self.layer_mut(id) {
                layer.visible = visible;
            }
        }
    }

    /// Center every layer within `area`.
    pub fn center_all(&mut self, area: Size) {
        for layer in &mut self.layers {
            let size = layer.size();
            layer.position = Position::new(
                (area.width - size.width) / 2.0,
                (area.height - size.height) / 2.0,
            );
        }
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn is_selectable(&self, id: LayerId) -> bool {
        self.layer(id).is_some_and(|l| l.selectable)
    }

    pub fn positions(&self) -> Vec<(LayerId, Position)> {
        self.layers.iter().map(|l| (l.id, l.position)).collect()
    }

    pub fn set_position(&mut self, id: LayerId, position: Position) {
        if let Some(layer) = self.layer_mut(id) {
            layer.position = position;
        }
    }

    pub fn translate(&mut self, id: LayerId, dx: f32, dy: f32) {
        if let Some(layer) = self.layer_mut(id) {
            layer.position = layer.position.offset(dx, dy);
        }
    }

    /// Layers bottom to top.
    pub fn draw_order(&self) -> Vec<&Layer> {
        let mut ordered: Vec<&Layer> = self.layers.iter().collect();
        ordered.sort_by_key(|l| l.z);
        ordered
    }
}
