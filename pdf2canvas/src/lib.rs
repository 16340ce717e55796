//! Rasterize PDF pages onto a layered drawing surface, page through them,
//! zoom, and export the current page as a PNG at natural size.
//!
//! The pipeline runs leaf first:
//! [`decoder`] -> [`rasterizer`] -> [`layers`] -> [`viewport`] -> [`export`],
//! tied together by [`session::Viewer`].

pub mod config;
pub mod decoder;
pub mod error;
pub mod export;
pub mod layers;
pub mod rasterizer;
pub mod renderer;
pub mod session;
pub mod surface;
pub mod viewport;

pub use config::ViewerConfig;
pub use decoder::{Decoder, Document, PageBitmap, PageSize, PdfBackend, PdfInput};
pub use error::{Result, ViewerError};
pub use export::{ExportedImage, PageExport};
pub use renderer::PdfiumBackend;
pub use session::{Viewer, ViewerStatus};
pub use viewport::{Margins, Size, Viewport};
