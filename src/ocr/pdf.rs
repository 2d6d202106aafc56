//! PDF page counting (lopdf) and page rasterization (pdfium).

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use pdfium_render::prelude::*;
use tracing::debug;

/// Turns PDF pages into images an OCR engine can read.
#[async_trait::async_trait]
pub trait PdfRasterizer: Send + Sync {
    fn page_count(&self, pdf: &[u8]) -> Result<usize>;

    /// Render the first `count` pages at `scale`, one PNG per page, in page order.
    async fn render_pages(&self, pdf: Arc<[u8]>, count: usize, scale: f32) -> Result<Vec<Vec<u8>>>;
}

/// Renders through the pdfium shared library on the blocking pool.
pub struct PdfiumRasterizer {
    library_path: Option<String>,
}

impl PdfiumRasterizer {
    /// `library_path` is the directory holding the pdfium library; `None` uses the system one.
    pub fn new(library_path: Option<String>) -> Self {
        Self { library_path }
    }

    fn bind(library_path: Option<&str>) -> Result<Pdfium> {
        let bindings = match library_path {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| anyhow!("Failed to bind pdfium: {:?}", e))?;
        Ok(Pdfium::new(bindings))
    }
}

#[async_trait::async_trait]
impl PdfRasterizer for PdfiumRasterizer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize> {
        let doc = lopdf::Document::load_mem(pdf)
            .map_err(|e| anyhow!("Failed to load PDF: {}", e))?;
        Ok(doc.get_pages().len())
    }

    /// Binds the library and parses the document once for all pages.
    async fn render_pages(&self, pdf: Arc<[u8]>, count: usize, scale: f32) -> Result<Vec<Vec<u8>>> {
        let library_path = self.library_path.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<Vec<u8>>> {
            let pdfium = Self::bind(library_path.as_deref())?;
            let document = pdfium
                .load_pdf_from_byte_slice(&pdf, None)
                .map_err(|e| anyhow!("Failed to open PDF: {:?}", e))?;
            let config = PdfRenderConfig::new().scale_page_by_factor(scale);

            (0..count)
                .map(|index| {
                    let page_index = u16::try_from(index).context("page index out of range")?;
                    let page = document
                        .pages()
                        .get(page_index)
                        .map_err(|e| anyhow!("Failed to load page {}: {:?}", index + 1, e))?;
                    let bitmap = page
                        .render_with_config(&config)
                        .map_err(|e| anyhow!("Failed to render page {}: {:?}", index + 1, e))?;
                    encode_png(bitmap.width() as u32, bitmap.height() as u32, bitmap.as_rgba_bytes())
                        .with_context(|| format!("page {}", index + 1))
                })
                .collect()
        })
        .await
        .context("PDF render task panicked")?
    }
}

fn encode_png(width: u32, height: u32, rgba: Vec<u8>) -> Result<Vec<u8>> {
    let raster = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("Rendered page has an unexpected buffer size"))?;

    let mut png = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(raster)
        .write_to(&mut png, image::ImageOutputFormat::Png)
        .context("Failed to encode page as PNG")?;

    debug!("Rendered page ({}x{})", width, height);
    Ok(png.into_inner())
}
