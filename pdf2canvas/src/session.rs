use crate::config::ViewerConfig;
use crate::decoder::{Decoder, Document, PdfBackend, PdfInput};
use crate::error::{Result, ViewerError};
use crate::export::{self, ExportedImage, PageExport};
use crate::layers::{LayerDefaults, LayerId, LayerManager};
use crate::rasterizer::{PageFilter, RasterizedDocument, Rasterizer};
use crate::surface;
use crate::viewport::{Size, Viewport};
use image::{Rgba, RgbaImage};
use std::path::Path;

/// What the host should show when no page is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerStatus {
    Empty,
    Loading,
    Ready,
}

impl ViewerStatus {
    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            ViewerStatus::Empty => Some("Upload PDF"),
            ViewerStatus::Loading => Some("loading..."),
            ViewerStatus::Ready => None,
        }
    }
}

/// Identifies one load request. Only the newest ticket may install its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// A decoded and rasterized document that has not been installed yet.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub document: Document,
    pub raster: RasterizedDocument,
}

/// Read a PDF from disk.
pub async fn read_input(path: &Path) -> Result<PdfInput> {
    let bytes = tokio::fs::read(path).await?;
    Ok(PdfInput::Bytes(bytes))
}

/// Decode and rasterize without touching any viewer state.
pub fn prepare<B: PdfBackend>(
    decoder: &Decoder<B>,
    rasterizer: &Rasterizer,
    input: PdfInput,
    filter: Option<&PageFilter>,
) -> Result<PreparedDocument> {
    let document = decoder.decode(input)?;
    let raster = rasterizer.rasterize_all(decoder, &document, filter)?;
    Ok(PreparedDocument { document, raster })
}

/// Everything that belongs to one loaded document.
#[derive(Debug, Clone)]
struct Canvas {
    document: Document,
    layers: LayerManager,
    viewport: Viewport,
    selection: Option<LayerId>,
}

/// A single viewing session: at most one document, its layers and view state.
pub struct Viewer<B> {
    config: ViewerConfig,
    decoder: Decoder<B>,
    canvas: Option<Canvas>,
    loading: bool,
    last_ticket: u64,
}

impl<B: PdfBackend> Viewer<B> {
    pub fn new(backend: B, config: ViewerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            decoder: Decoder::new(backend),
            canvas: None,
            loading: false,
            last_ticket: 0,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn decoder(&self) -> &Decoder<B> {
        &self.decoder
    }

    pub fn rasterizer(&self) -> Rasterizer {
        Rasterizer::new(self.config.quality, self.config.device_pixel_ratio)
            .with_policy(self.config.render_failure)
    }

    pub fn page_filter(&self) -> Option<PageFilter> {
        self.config.page_filter.clone().map(PageFilter::new)
    }

    pub fn status(&self) -> ViewerStatus {
        if self.loading {
            ViewerStatus::Loading
        } else if self.canvas.is_some() {
            ViewerStatus::Ready
        } else {
            ViewerStatus::Empty
        }
    }

    /// Decode, rasterize and install in one call.
    pub fn load_document(&mut self, input: impl Into<PdfInput>) -> Result<()> {
        let ticket = self.begin_load();
        let prepared = prepare(
            &self.decoder,
            &self.rasterizer(),
            input.into(),
            self.page_filter().as_ref(),
        );
        self.finish_load(ticket, prepared)
    }

    /// Start a load. Any load still in flight becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.last_ticket += 1;
        self.loading = true;
        LoadTicket(self.last_ticket)
    }

    /// Install the outcome of a load. On error, or for a stale ticket, the
    /// current document stays as it was.
    pub fn finish_load(&mut self, ticket: LoadTicket, prepared: Result<PreparedDocument>) -> Result<()> {
        if ticket.0 != self.last_ticket {
            tracing::warn!(ticket = ticket.0, latest = self.last_ticket, "discarding stale load");
            return Err(ViewerError::StaleLoad);
        }
        self.loading = false;

        let prepared = prepared.inspect_err(|e| tracing::error!("Failed to load PDF: {}", e))?;
        let canvas = self.build_canvas(prepared)?;
        tracing::info!(
            pages = canvas.layers.page_count(),
            natural_width = canvas.viewport.natural_size().width,
            natural_height = canvas.viewport.natural_size().height,
            "document loaded"
        );
        self.canvas = Some(canvas);
        Ok(())
    }

    fn build_canvas(&self, prepared: PreparedDocument) -> Result<Canvas> {
        let dpr = self.config.device_pixel_ratio;
        let PreparedDocument { document, raster } = prepared;

        let mut viewport = match raster.first_page_px {
            Some(px) => Viewport::from_first_page(px, dpr, self.config.margins, raster.pages.len()),
            None => Viewport::new(Size::default(), self.config.margins, 0),
        };
        viewport.set_zoom(self.config.initial_zoom)?;

        let mut layers = LayerManager::new(LayerDefaults {
            border: self.config.border,
            ..LayerDefaults::default()
        });
        for bitmap in raster.pages {
            layers.add_page_layer(bitmap, dpr);
        }
        if layers.page_count() > 0 {
            layers.add_border(viewport.natural_size());
        }
        layers.center_all(viewport.padded_size());

        Ok(Canvas {
            document,
            layers,
            viewport,
            selection: None,
        })
    }

    fn canvas(&self) -> Result<&Canvas> {
        self.canvas.as_ref().ok_or(ViewerError::NoDocument)
    }

    fn canvas_mut(&mut self) -> Result<&mut Canvas> {
        self.canvas.as_mut().ok_or(ViewerError::NoDocument)
    }

    pub fn document(&self) -> Option<&Document> {
        self.canvas.as_ref().map(|c| &c.document)
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.canvas.as_ref().map(|c| &c.viewport)
    }

    pub fn layers(&self) -> Option<&LayerManager> {
        self.canvas.as_ref().map(|c| &c.layers)
    }

    pub fn page_count(&self) -> usize {
        self.canvas.as_ref().map_or(0, |c| c.layers.page_count())
    }

    pub fn current_page(&self) -> usize {
        self.canvas.as_ref().map_or(0, |c| c.viewport.current_page())
    }

    pub fn show_page(&mut self, index: usize) -> Result<()> {
        let canvas = self.canvas_mut()?;
        canvas.viewport.set_page(index)?;
        canvas.layers.show_page(index)
    }

    /// Advance one page, clamped at the last page.
    pub fn next_page(&mut self) -> bool {
        match self.canvas.as_mut() {
            Some(canvas) => {
                if !canvas.viewport.next_page() {
                    return false;
                }
                let page = canvas.viewport.current_page();
                canvas.layers.show_page(page).is_ok()
            }
            None => false,
        }
    }

    /// Go back one page, clamped at the first page.
    pub fn previous_page(&mut self) -> bool {
        match self.canvas.as_mut() {
            Some(canvas) => {
                if !canvas.viewport.previous_page() {
                    return false;
                }
                let page = canvas.viewport.current_page();
                canvas.layers.show_page(page).is_ok()
            }
            None => false,
        }
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<()> {
        self.canvas_mut()?.viewport.set_zoom(zoom)
    }

    pub fn toggle_zoom(&mut self) -> Result<f32> {
        let levels = self.config.zoom_levels.clone();
        self.canvas_mut()?.viewport.toggle_zoom(&levels)
    }

    /// Select a layer. Non-selectable layers such as the border are ignored.
    pub fn select(&mut self, id: LayerId) -> Result<bool> {
        let canvas = self.canvas_mut()?;
        if canvas.layers.is_selectable(id) {
            canvas.selection = Some(id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn deselect(&mut self) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.selection = None;
        }
    }

    pub fn selection(&self) -> Option<LayerId> {
        self.canvas.as_ref().and_then(|c| c.selection)
    }

    fn background(&self) -> Rgba<u8> {
        Rgba(self.config.background)
    }

    /// The surface as currently laid out, for on-screen display. Zoom is left
    /// to the host, which scales this padded-size image.
    pub fn render_view(&self) -> Result<RgbaImage> {
        let canvas = self.canvas()?;
        Ok(surface::capture(
            &canvas.layers,
            canvas.viewport.padded_size(),
            1.0,
            self.background(),
        ))
    }

    /// The current page at natural size. A document without pages has no
    /// current page to capture.
    pub fn snapshot(&mut self) -> Result<RgbaImage> {
        let background = self.background();
        self.deselect();
        let canvas = self.canvas_mut()?;
        if canvas.layers.page_count() == 0 {
            return Err(ViewerError::Bounds {
                index: canvas.viewport.current_page(),
                page_count: 0,
            });
        }
        export::snapshot(&mut canvas.layers, &mut canvas.viewport, background)
    }

    pub fn export_png(&mut self) -> Result<ExportedImage> {
        let image = self.snapshot()?;
        let exported = ExportedImage::download(export::encode_png(&image)?);
        tracing::info!(file = %exported.file_name, bytes = exported.bytes.len(), "exported page");
        Ok(exported)
    }

    pub fn export_base64(&mut self) -> Result<String> {
        let image = self.snapshot()?;
        Ok(export::to_data_url(&export::encode_png(&image)?))
    }

    /// Export every page in order. The originally shown page comes back
    /// afterwards when `restore_page_after_export_all` is set; otherwise the
    /// view stays on the last page.
    pub fn export_all(&mut self) -> Result<Vec<PageExport>> {
        let original = self.current_page();
        let count = self.canvas()?.layers.page_count();

        let mut exports = Vec::with_capacity(count);
        for page in 0..count {
            self.show_page(page)?;
            let png = export::encode_png(&self.snapshot()?)?;
            exports.push(PageExport { page, png });
        }

        if self.config.restore_page_after_export_all && count > 0 {
            self.show_page(original)?;
        }
        tracing::info!(pages = exports.len(), "exported all pages");
        Ok(exports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::PageSize;
    use image::RgbaImage;
    use proptest::prelude::*;

    struct Blank;

    impl PdfBackend for Blank {
        fn page_sizes(&self, bytes: &[u8]) -> anyhow::Result<Vec<PageSize>> {
            let pages = bytes.iter().filter(|&&b| b == b'P').count() - 1;
            Ok(vec![PageSize { width: 50.0, height: 40.0 }; pages])
        }

        fn render(&self, _bytes: &[u8], _page_index: usize, width: u32, height: u32) -> anyhow::Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(width, height, Rgba([9, 9, 9, 255])))
        }
    }

    fn viewer() -> Viewer<Blank> {
        Viewer::new(Blank, ViewerConfig::default()).unwrap()
    }

    #[test]
    fn test_status_placeholder() {
        let mut viewer = viewer();
        assert_eq!(viewer.status().placeholder(), Some("Upload PDF"));

        let ticket = viewer.begin_load();
        assert_eq!(viewer.status().placeholder(), Some("loading..."));
        assert!(viewer.finish_load(ticket, Err(ViewerError::Decode("x".into()))).is_err());
        assert_eq!(viewer.status(), ViewerStatus::Empty);

        viewer.load_document(b"%PDF-1.4 P".to_vec()).unwrap();
        assert_eq!(viewer.status(), ViewerStatus::Ready);
        assert_eq!(viewer.status().placeholder(), None);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut viewer = viewer();
        let first = viewer.begin_load();
        let second = viewer.begin_load();

        let prepared = prepare(
            viewer.decoder(),
            &viewer.rasterizer(),
            PdfInput::Bytes(b"%PDF-1.4 PP".to_vec()),
            None,
        );
        assert!(matches!(viewer.finish_load(first, prepared), Err(ViewerError::StaleLoad)));
        assert_eq!(viewer.status(), ViewerStatus::Loading);

        let prepared = prepare(
            viewer.decoder(),
            &viewer.rasterizer(),
            PdfInput::Bytes(b"%PDF-1.4 PPP".to_vec()),
            None,
        );
        viewer.finish_load(second, prepared).unwrap();
        assert_eq!(viewer.page_count(), 3);
    }

    #[test]
    fn test_zero_page_document() {
        let mut viewer = viewer();
        viewer.load_document(b"%PDF-1.4".to_vec()).unwrap();
        assert_eq!(viewer.page_count(), 0);
        assert!(!viewer.next_page());
        assert!(!viewer.previous_page());
        assert_eq!(viewer.current_page(), 0);
        assert!(viewer.export_all().unwrap().is_empty());
        assert!(matches!(
            viewer.export_png(),
            Err(ViewerError::Bounds { index: 0, page_count: 0 })
        ));
        assert!(viewer.export_base64().is_err());
    }

    #[test]
    fn test_initial_zoom_applied_on_load() {
        let config = ViewerConfig {
            initial_zoom: 0.5,
            ..ViewerConfig::default()
        };
        let mut viewer = Viewer::new(Blank, config).unwrap();
        viewer.load_document(b"%PDF-1.4 PP".to_vec()).unwrap();

        let viewport = viewer.viewport().unwrap();
        assert_eq!(viewport.zoom(), 0.5);
        assert_eq!(viewport.surface_size(), viewport.padded_size().scaled(0.5));
    }

    #[test]
    fn test_selection_cleared_by_export() {
        let mut viewer = viewer();
        viewer.load_document(b"%PDF-1.4 P".to_vec()).unwrap();
        let layers = viewer.layers().unwrap();
        let page = layers.page_layer_ids()[0];
        let border = layers.border().unwrap();

        assert!(!viewer.select(border).unwrap());
        assert!(viewer.select(page).unwrap());
        assert_eq!(viewer.selection(), Some(page));

        viewer.export_png().unwrap();
        assert_eq!(viewer.selection(), None);
    }

    #[test]
    fn test_operations_without_document() {
        let mut viewer = viewer();
        assert!(matches!(viewer.show_page(0), Err(ViewerError::NoDocument)));
        assert!(matches!(viewer.set_zoom(0.5), Err(ViewerError::NoDocument)));
        assert!(matches!(viewer.export_png(), Err(ViewerError::NoDocument)));
        assert!(viewer.render_view().is_err());
    }

    fn pdf_with_pages(pages: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4 ".to_vec();
        bytes.extend(std::iter::repeat(b'P').take(pages));
        bytes
    }

    proptest! {
        #[test]
        fn exactly_one_page_visible(
            pages in 1usize..6,
            ops in prop::collection::vec((0u8..3, 0usize..8), 0..30),
        ) {
            let mut viewer = viewer();
            viewer.load_document(pdf_with_pages(pages)).unwrap();

            for (op, target) in ops {
                match op {
                    0 => { viewer.next_page(); }
                    1 => { viewer.previous_page(); }
                    _ => viewer.show_page(target % pages).unwrap(),
                }
                let layers = viewer.layers().unwrap();
                prop_assert_eq!(layers.visible_page_count(), 1);
                prop_assert!(viewer.current_page() < pages);
                prop_assert_eq!(layers.current_page(), Some(viewer.current_page()));
            }
        }
    }
}
