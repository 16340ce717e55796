use crate::decoder::{PageSize, PdfBackend, RenderRequest};
use anyhow::{Context, Result};
use image::RgbaImage;
use pdfium_render::prelude::*;

/// PDF backend using pdfium-render.
///
/// `Pdfium` is neither `Send` nor `Sync`, so the library is bound for each call
/// instead of being stored. That keeps the backend usable from async tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumBackend;

impl PdfiumBackend {
    fn bind() -> Result<Pdfium> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .context("Failed to bind to PDFium library. Please install PDFium or download the library from https://github.com/bblanchon/pdfium-binaries")?;
        Ok(Pdfium::new(bindings))
    }

    fn render_one(document: &PdfDocument<'_>, request: &RenderRequest) -> Result<RgbaImage> {
        let index = u16::try_from(request.page_index).context("Page index out of bounds")?;
        let page = document
            .pages()
            .get(index)
            .context("Page index out of bounds")?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(request.width as i32)
            .set_target_height(request.height as i32)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page
            .render_with_config(&render_config)
            .context("Failed to render page")?;

        let img = bitmap.as_image().into_rgba8();
        if img.dimensions() == (request.width, request.height) {
            Ok(img)
        } else {
            // PDFium may round the secondary axis differently.
            Ok(image::imageops::resize(
                &img,
                request.width,
                request.height,
                image::imageops::FilterType::Triangle,
            ))
        }
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_sizes(&self, bytes: &[u8]) -> Result<Vec<PageSize>> {
        let pdfium = Self::bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .context("Failed to load PDF document")?;

        let sizes = document
            .pages()
            .iter()
            .map(|page| PageSize {
                width: page.width().value,
                height: page.height().value,
            })
            .collect();
        Ok(sizes)
    }

    fn render(&self, bytes: &[u8], page_index: usize, width: u32, height: u32) -> Result<RgbaImage> {
        let request = RenderRequest {
            page_index,
            width,
            height,
        };
        self.render_many(bytes, std::slice::from_ref(&request))
            .pop()
            .context("Renderer produced no output")?
    }

    fn render_many(&self, bytes: &[u8], requests: &[RenderRequest]) -> Vec<Result<RgbaImage>> {
        let outcome = Self::bind().and_then(|pdfium| {
            // The document borrows `pdfium`, so rendering has to happen in here.
            let document = pdfium
                .load_pdf_from_byte_slice(bytes, None)
                .context("Failed to load PDF document")?;
            let results = requests
                .iter()
                .map(|request| {
                    Self::render_one(&document, request)
                        .with_context(|| format!("page {}", request.page_index))
                })
                .collect::<Vec<_>>();
            Ok(results)
        });

        match outcome {
            Ok(results) => results,
            Err(e) => {
                let reason = format!("{:#}", e);
                requests
                    .iter()
                    .map(|_| Err(anyhow::anyhow!(reason.clone())))
                    .collect()
            }
        }
    }
}
