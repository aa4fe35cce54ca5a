//! Stamp MCP Server Library
//!
//! This crate provides MCP tools for stamping documents:
//! - `stamp_document`: Overlay a stamp image onto a document page and export a PDF
//! - `preview_stamp`: Render a composited preview of the stamped page
//! - `compute_placement`: Compute the stamp rectangle for a canvas
//! - `get_document_info`: Get page count and dimensions of a document
//! - `list_documents`: List stampable files in a directory

pub mod error;
pub mod pdf;
pub mod server;
pub mod source;
pub mod stamp;

pub use error::{Error, Result};
pub use server::{
    run_server, run_server_with_config, run_server_with_dirs, ServerConfig, SourceSpec,
    StampServer,
};
pub use stamp::{
    composite, compute_placement, BlendMode, CanvasSpec, Dimensions, PlacementMode,
    PlacementResult, DEFAULT_MARGIN,
};
