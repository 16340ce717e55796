//! Document decoding and per-page rendering.
//!
//! The decoder owns input normalization (data URLs, base64) and bounds
//! checking. The actual PDF engine sits behind [`PdfBackend`].

use crate::error::{Result, ViewerError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbaImage;
use std::sync::Arc;

pub const PDF_DATA_URL_PREFIX: &str = "data:application/pdf;base64,";

/// The header may be preceded by junk, but only within the first 1024 bytes.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Intrinsic page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Rasterization engine used by the [`Decoder`].
pub trait PdfBackend {
    /// Parse `bytes` and return the size of every page, in page order.
    fn page_sizes(&self, bytes: &[u8]) -> anyhow::Result<Vec<PageSize>>;

    /// Render one page (0-based) into a bitmap of exactly `width` x `height` pixels.
    fn render(
        &self,
        bytes: &[u8],
        page_index: usize,
        width: u32,
        height: u32,
    ) -> anyhow::Result<RgbaImage>;

    /// Render several pages. Results come back in request order, one per request,
    /// so a failed page does not hide the outcome of its siblings.
    fn render_many(
        &self,
        bytes: &[u8],
        requests: &[RenderRequest],
    ) -> Vec<anyhow::Result<RgbaImage>> {
        requests
            .iter()
            .map(|r| self.render(bytes, r.page_index, r.width, r.height))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
}

/// Raw input as delivered by the host.
#[derive(Debug, Clone)]
pub enum PdfInput {
    Bytes(Vec<u8>),
    /// Base64 text, with or without the `data:application/pdf;base64,` prefix.
    Encoded(String),
}

impl PdfInput {
    fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            PdfInput::Bytes(bytes) => Ok(bytes),
            PdfInput::Encoded(text) => {
                let payload = text.strip_prefix(PDF_DATA_URL_PREFIX).unwrap_or(&text);
                // MIME-style base64 wraps lines; the engine rejects any whitespace.
                let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                STANDARD
                    .decode(&payload)
                    .map_err(|e| ViewerError::Decode(format!("invalid base64: {}", e)))
            }
        }
    }
}

impl From<Vec<u8>> for PdfInput {
    fn from(bytes: Vec<u8>) -> Self {
        PdfInput::Bytes(bytes)
    }
}

impl From<String> for PdfInput {
    fn from(text: String) -> Self {
        PdfInput::Encoded(text)
    }
}

/// A decoded PDF. Cheap to clone; the bytes are shared.
#[derive(Clone)]
pub struct Document {
    bytes: Arc<[u8]>,
    pages: Vec<PageSize>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("page_count", &self.page_count())
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_size(&self, page_index: usize) -> Result<PageSize> {
        self.pages
            .get(page_index)
            .copied()
            .ok_or(ViewerError::Bounds {
                index: page_index,
                page_count: self.pages.len(),
            })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// One rendered page.
#[derive(Debug, Clone)]
pub struct PageBitmap {
    pub page_index: usize,
    pub image: Arc<RgbaImage>,
}

impl PageBitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Pixel size of `page` rendered at `scale`.
pub fn target_size(page: PageSize, scale: f32) -> (u32, u32) {
    let px = |v: f32| ((v * scale).round() as u32).max(1);
    (px(page.width), px(page.height))
}

#[derive(Debug, Clone)]
pub struct Decoder<B> {
    backend: B,
}

impl<B: PdfBackend> Decoder<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn decode(&self, input: impl Into<PdfInput>) -> Result<Document> {
        let input: PdfInput = input.into();
        let bytes = input.into_bytes()?;
        if !has_pdf_header(&bytes) {
            return Err(ViewerError::Decode("missing %PDF- header".into()));
        }

        let pages = self
            .backend
            .page_sizes(&bytes)
            .map_err(|e| ViewerError::Decode(format!("{:#}", e)))?;

        tracing::debug!(bytes = bytes.len(), pages = pages.len(), "decoded document");
        Ok(Document {
            bytes: bytes.into(),
            pages,
        })
    }

    pub fn render_page(&self, document: &Document, page_index: usize, scale: f32) -> Result<PageBitmap> {
        let request = self.request(document, page_index, scale)?;
        self.backend
            .render(document.bytes(), page_index, request.width, request.height)
            .map(|image| PageBitmap {
                page_index,
                image: Arc::new(image),
            })
            .map_err(|e| ViewerError::Render {
                page: page_index,
                reason: format!("{:#}", e),
            })
    }

    /// Render `pages` in one backend call. The outer error only reports bad
    /// indices; per-page failures are returned individually.
    pub fn render_pages(
        &self,
        document: &Document,
        pages: &[usize],
        scale: f32,
    ) -> Result<Vec<Result<PageBitmap>>> {
        let requests = pages
            .iter()
            .map(|&index| self.request(document, index, scale))
            .collect::<Result<Vec<_>>>()?;

        let rendered = self.backend.render_many(document.bytes(), &requests);
        Ok(requests
            .iter()
            .zip(rendered)
            .map(|(request, result)| {
                result
                    .map(|image| PageBitmap {
                        page_index: request.page_index,
                        image: Arc::new(image),
                    })
                    .map_err(|e| ViewerError::Render {
                        page: request.page_index,
                        reason: format!("{:#}", e),
                    })
            })
            .collect())
    }

    fn request(&self, document: &Document, page_index: usize, scale: f32) -> Result<RenderRequest> {
        let (width, height) = target_size(document.page_size(page_index)?, scale);
        Ok(RenderRequest {
            page_index,
            width,
            height,
        })
    }
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use base64::Engine as _;
    use image::Rgba;

    struct Letter;

    impl PdfBackend for Letter {
        fn page_sizes(&self, _bytes: &[u8]) -> anyhow::Result<Vec<PageSize>> {
            Ok(vec![
                PageSize { width: 612.0, height: 792.0 },
                PageSize { width: 100.0, height: 50.0 },
            ])
        }

        fn render(&self, _bytes: &[u8], page_index: usize, width: u32, height: u32) -> anyhow::Result<RgbaImage> {
            if page_index == 1 {
                bail!("corrupt content stream");
            }
            Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
        }
    }

    const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

    #[test]
    fn test_decode_raw_bytes() {
        let doc = Decoder::new(Letter).decode(PDF.to_vec()).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.bytes(), PDF);
    }

    #[test]
    fn test_decode_data_url_strips_prefix() {
        let url = format!("{}{}", PDF_DATA_URL_PREFIX, STANDARD.encode(PDF));
        let doc = Decoder::new(Letter).decode(url).unwrap();
        assert_eq!(doc.bytes(), PDF);

        let bare = STANDARD.encode(PDF);
        let doc = Decoder::new(Letter).decode(bare).unwrap();
        assert_eq!(doc.page_count(), 2);
    }

    #[test]
    fn test_decode_line_wrapped_base64() {
        let encoded = STANDARD.encode(PDF);
        let wrapped = encoded
            .as_bytes()
            .chunks(4)
            .enumerate()
            .map(|(i, chunk)| {
                let line = std::str::from_utf8(chunk).unwrap();
                if i % 2 == 0 { format!("{}\r\n", line) } else { format!("{}\n", line) }
            })
            .collect::<String>();

        let doc = Decoder::new(Letter)
            .decode(format!("{}\n{}", PDF_DATA_URL_PREFIX, wrapped))
            .unwrap();
        assert_eq!(doc.bytes(), PDF);
    }

    #[test]
    fn test_decode_rejects_non_pdf() {
        let err = Decoder::new(Letter).decode(b"GIF89a".to_vec()).unwrap_err();
        assert!(matches!(err, ViewerError::Decode(_)));

        let err = Decoder::new(Letter).decode("@@not base64@@".to_string()).unwrap_err();
        assert!(matches!(err, ViewerError::Decode(_)));
    }

    #[test]
    fn test_render_page_size_follows_scale() {
        let decoder = Decoder::new(Letter);
        let doc = decoder.decode(PDF.to_vec()).unwrap();
        let bitmap = decoder.render_page(&doc, 0, 1.5).unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (918, 1188));
    }

    #[test]
    fn test_render_page_errors() {
        let decoder = Decoder::new(Letter);
        let doc = decoder.decode(PDF.to_vec()).unwrap();

        assert!(matches!(
            decoder.render_page(&doc, 1, 1.0),
            Err(ViewerError::Render { page: 1, .. })
        ));
        assert!(matches!(
            decoder.render_page(&doc, 2, 1.0),
            Err(ViewerError::Bounds { index: 2, page_count: 2 })
        ));
    }

    #[test]
    fn test_render_pages_isolates_failures() {
        let decoder = Decoder::new(Letter);
        let doc = decoder.decode(PDF.to_vec()).unwrap();
        let results = decoder.render_pages(&doc, &[0, 1], 1.0).unwrap();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
