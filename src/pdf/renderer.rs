//! PDF rasterization via PDFium
//!
//! Provides the two inputs the stamping core needs from a PDF: page
//! dimensions in points (for PDF-native placement) and a decoded page
//! raster (for the compositing path).

use crate::error::{Error, Result};
use image::RgbaImage;
use pdfium_render::prelude::*;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    data: &'a [u8],
    password: Option<&str>,
) -> Result<PdfDocument<'a>> {
    pdfium
        .load_pdf_from_byte_slice(data, password)
        .map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::PasswordRequired
            }
            _ => Error::Pdfium {
                reason: format!("{}", e),
            },
        })
}

fn validate_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Page dimensions in points (1 point = 1/72 inch)
#[derive(Debug, Clone, Copy)]
pub struct PageSize {
    /// Page number (1-indexed)
    pub page: u32,
    pub width: f32,
    pub height: f32,
}

/// Return the dimensions of every page, in points.
pub fn page_sizes(data: &[u8], password: Option<&str>) -> Result<Vec<PageSize>> {
    validate_header(data)?;

    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data, password)?;

    let mut sizes = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        sizes.push(PageSize {
            page: index as u32 + 1,
            width: page.width().value,
            height: page.height().value,
        });
    }

    Ok(sizes)
}

/// Clamp a 1-indexed page selection to the available range.
///
/// Out-of-range selections snap to the last page rather than failing;
/// zero snaps to the first.
pub fn clamp_page(page: u32, page_count: u32) -> u32 {
    page.clamp(1, page_count.max(1))
}

/// Rasterize one page (1-indexed, clamped to the document) as RGBA.
/// Returns the raster together with the page number actually rendered,
/// so callers can report the post-clamp selection.
///
/// Sizing follows the same precedence as page-to-image conversion
/// elsewhere: explicit scale factor, then target width/height, then a
/// 1200px-width default.
pub fn render_page(
    data: &[u8],
    password: Option<&str>,
    page_number: u32,
    width: Option<u16>,
    height: Option<u16>,
    scale: Option<f32>,
) -> Result<(RgbaImage, u32)> {
    validate_header(data)?;

    let pdfium = create_pdfium()?;
    let document = load_document(&pdfium, data, password)?;

    let pages = document.pages();
    let page_count = pages.len() as u32;
    if page_count == 0 {
        return Err(Error::InvalidPdf {
            reason: "PDF has no pages".to_string(),
        });
    }

    let page_number = clamp_page(page_number, page_count);
    let page_index = page_number - 1;
    let page = pages.get(page_index as u16).map_err(|e| Error::Pdfium {
        reason: format!("Failed to get page {}: {}", page_number, e),
    })?;

    let config = if let Some(s) = scale {
        PdfRenderConfig::new().scale_page_by_factor(s)
    } else if let (Some(w), Some(h)) = (width, height) {
        PdfRenderConfig::new().set_target_size(w as i32, h as i32)
    } else if let Some(w) = width {
        PdfRenderConfig::new().set_target_width(w as i32)
    } else if let Some(h) = height {
        PdfRenderConfig::new().set_target_height(h as i32)
    } else {
        // Default: 1200px width
        PdfRenderConfig::new().set_target_width(1200)
    };

    let config = config.render_form_data(true).render_annotations(true);

    let bitmap = page.render_with_config(&config).map_err(|e| Error::Pdfium {
        reason: format!("Failed to render page {}: {}", page_number, e),
    })?;

    Ok((bitmap.as_image().to_rgba8(), page_number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_rejected() {
        let result = page_sizes(b"not a pdf", None);
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));

        let result = render_page(b"%PD", None, 1, None, None, None);
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn page_clamping() {
        assert_eq!(clamp_page(0, 5), 1);
        assert_eq!(clamp_page(1, 5), 1);
        assert_eq!(clamp_page(5, 5), 5);
        assert_eq!(clamp_page(99, 5), 5);
        assert_eq!(clamp_page(3, 0), 1);
    }
}
