//! PDF processing layer
//!
//! Rasterization via PDFium, writing via lopdf. The stamping core never
//! touches PDF data directly; it sees only page dimensions and decoded
//! rasters from this module.

mod renderer;
mod writer;

pub use renderer::{clamp_page, page_sizes, render_page, PageSize};
pub use writer::{page_count_from_bytes, page_size_from_bytes, raster_to_pdf, stamp_pdf_page};
