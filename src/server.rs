//! MCP Server implementation using rmcp

use crate::error::Error;
use crate::pdf::{
    clamp_page, page_count_from_bytes, page_size_from_bytes, page_sizes, raster_to_pdf,
    render_page, stamp_pdf_page,
};
use crate::source::{
    is_pdf, resolve_base64, resolve_cache, resolve_path, resolve_url, CacheManager, PayloadKind,
    ResolvedSource,
};
use crate::stamp::{
    composite, compute_placement, BlendMode, CanvasSpec, Dimensions, PlacementMode,
    PlacementResult, DEFAULT_MARGIN,
};
use anyhow::Result;
use base64::Engine;
use image::RgbaImage;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, service::RequestContext, tool, tool_handler, tool_router, RoleServer,
    ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Document or stamp source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum SourceSpec {
    /// File path (absolute or relative)
    Path {
        /// Path to the file
        path: String,
    },
    /// Base64 encoded data
    Base64 {
        /// Base64 encoded content
        base64: String,
    },
    /// URL to download from
    Url {
        /// URL of the file
        url: String,
    },
    /// Reference to cached data
    CacheRef {
        /// Cache key from previous operation
        cache_key: String,
    },
}

impl<'de> serde::Deserialize<'de> for SourceSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let Some(obj) = value.as_object() {
            if let Some(v) = obj.get("path") {
                if let Some(s) = v.as_str() {
                    return Ok(SourceSpec::Path {
                        path: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"path\" must be a string"));
            }
            if let Some(v) = obj.get("base64") {
                if let Some(s) = v.as_str() {
                    return Ok(SourceSpec::Base64 {
                        base64: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"base64\" must be a string"));
            }
            if let Some(v) = obj.get("url") {
                if let Some(s) = v.as_str() {
                    return Ok(SourceSpec::Url {
                        url: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"url\" must be a string"));
            }
            if let Some(v) = obj.get("cache_key") {
                if let Some(s) = v.as_str() {
                    return Ok(SourceSpec::CacheRef {
                        cache_key: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"cache_key\" must be a string"));
            }
            let keys: Vec<&String> = obj.keys().collect();
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", \"url\", or \"cache_key\", but got keys: {:?}",
                keys
            )))
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", \"url\", or \"cache_key\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )))
        }
    }
}

/// Security and resource configuration for the Stamp MCP Server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories to expose as stampable resources
    pub resource_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
    /// Maximum total bytes in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    /// Maximum render scale factor for preview_stamp (default: 10.0)
    pub max_image_scale: f32,
    /// Maximum total pixel area for rendered pages (default: 100_000_000)
    pub max_image_pixels: u64,
    /// Default margin from anchored edges, in canvas units (default: 50)
    pub default_margin: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            cache_max_bytes: 512 * 1024 * 1024,    // 512MB
            cache_max_entries: 100,
            max_image_scale: 10.0,
            max_image_pixels: 100_000_000,
            default_margin: DEFAULT_MARGIN,
        }
    }
}

/// Stamp MCP Server
#[derive(Clone)]
pub struct StampServer {
    cache: Arc<RwLock<CacheManager>>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types for stamp_document
// ============================================================================

/// Export path for the stamped result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Draw the stamp onto the existing PDF page, keeping vector content.
    /// Falls back to `raster` when the document is a plain image.
    #[default]
    Pdf,
    /// Rasterize the page, composite the stamp in pixel space, and wrap
    /// the result as a single-page PDF
    Raster,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StampDocumentParams {
    /// Document to stamp (PDF, PNG, or JPEG)
    pub document: SourceSpec,
    /// Stamp image (PNG or JPEG)
    pub stamp: SourceSpec,
    /// Page to stamp, 1-indexed; out-of-range values clamp to the last page (default: 1)
    #[serde(default = "default_page")]
    pub page: u32,
    /// Stamp anchor position (default: top-left corner)
    #[serde(default = "default_position")]
    pub position: PlacementMode,
    /// Stamp scale as percent of its natural size, in (0, 100] (default: 30)
    #[serde(default = "default_scale")]
    pub scale_percent: f32,
    /// Stamp opacity: 0 = invisible, 100 = fully opaque (default: 100)
    #[serde(default = "default_opacity")]
    pub opacity_percent: f32,
    /// Blend mode applied before alpha mixing (default: normal)
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Margin from anchored edges; defaults to the server config margin
    #[serde(default)]
    pub margin: Option<f32>,
    /// Export path: "pdf" or "raster" (default: pdf)
    #[serde(default)]
    pub output: OutputMode,
    /// Optional file path to write the stamped PDF to
    #[serde(default)]
    pub output_path: Option<String>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

fn default_page() -> u32 {
    1
}

fn default_position() -> PlacementMode {
    PlacementMode::TopLeft
}

fn default_scale() -> f32 {
    30.0
}

fn default_opacity() -> f32 {
    100.0
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StampDocumentResult {
    pub document: String,
    pub stamp: String,
    /// Page that was stamped (1-indexed, after clamping)
    pub page: u32,
    /// Resolved stamp rectangle in the output coordinate system
    pub placement: PlacementResult,
    /// Cache key of the stamped PDF, for chaining with other tools
    pub output_cache_key: String,
    pub output_page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for preview_stamp
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PreviewStampParams {
    /// Document to preview (PDF, PNG, or JPEG)
    pub document: SourceSpec,
    /// Stamp image (PNG or JPEG)
    pub stamp: SourceSpec,
    /// Page to preview, 1-indexed; out-of-range values clamp (default: 1)
    #[serde(default = "default_page")]
    pub page: u32,
    /// Stamp anchor position (default: top-left corner)
    #[serde(default = "default_position")]
    pub position: PlacementMode,
    /// Stamp scale as percent of its natural size, in (0, 100] (default: 30)
    #[serde(default = "default_scale")]
    pub scale_percent: f32,
    /// Stamp opacity: 0 = invisible, 100 = fully opaque (default: 100)
    #[serde(default = "default_opacity")]
    pub opacity_percent: f32,
    /// Blend mode applied before alpha mixing (default: normal)
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Margin from anchored edges; defaults to the server config margin
    #[serde(default)]
    pub margin: Option<f32>,
    /// Target render width in pixels (PDF documents only)
    #[serde(default)]
    pub width: Option<u16>,
    /// Target render height in pixels (PDF documents only)
    #[serde(default)]
    pub height: Option<u16>,
    /// Render scale factor (PDF documents only)
    #[serde(default)]
    pub scale: Option<f32>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PreviewStampResult {
    pub document: String,
    pub stamp: String,
    /// Page that was previewed (1-indexed, after clamping)
    pub page: u32,
    /// Resolved stamp rectangle in preview pixels
    pub placement: PlacementResult,
    /// Preview width in pixels
    pub width: u32,
    /// Preview height in pixels
    pub height: u32,
    /// Base64-encoded PNG preview
    pub data_base64: String,
    /// MIME type (always "image/png")
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for compute_placement
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ComputePlacementParams {
    /// Canvas width (pixels or page points)
    pub canvas_width: f32,
    /// Canvas height (pixels or page points)
    pub canvas_height: f32,
    /// true for raster/canvas coordinates (y grows downward), false for
    /// PDF page coordinates (y grows upward) (default: true)
    #[serde(default = "default_true")]
    pub origin_top_left: bool,
    /// Margin from anchored edges; defaults to the server config margin
    #[serde(default)]
    pub margin: Option<f32>,
    /// Natural stamp width, same unit as the canvas
    pub stamp_width: f32,
    /// Natural stamp height, same unit as the canvas
    pub stamp_height: f32,
    /// Stamp anchor position
    pub position: PlacementMode,
    /// Stamp scale as percent of its natural size, in (0, 100] (default: 100)
    #[serde(default = "default_full_scale")]
    pub scale_percent: f32,
}

fn default_true() -> bool {
    true
}

fn default_full_scale() -> f32 {
    100.0
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ComputePlacementResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_document_info
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDocumentInfoParams {
    /// Document to inspect (PDF, PNG, or JPEG)
    pub document: SourceSpec,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Cache the resolved document for chaining
    #[serde(default)]
    pub cache: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PageSizeInfo {
    /// Page number (1-indexed)
    pub page: u32,
    /// Page width (points for PDFs, pixels for images)
    pub width: f32,
    /// Page height (points for PDFs, pixels for images)
    pub height: f32,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GetDocumentInfoResult {
    pub document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// "pdf" or "image"
    pub kind: String,
    pub page_count: u32,
    pub pages: Vec<PageSizeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for list_documents
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDocumentsParams {
    /// Directory to search for stampable files (PDF, PNG, JPEG)
    pub directory: String,
    /// Search subdirectories recursively (default: false)
    #[serde(default)]
    pub recursive: bool,
    /// Filename pattern to filter (e.g., "invoice*.pdf"). Supports glob patterns.
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DocumentFileInfo {
    /// Full path to the file
    pub path: String,
    /// Filename only
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (ISO 8601 format)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ListDocumentsResult {
    /// Directory that was searched
    pub directory: String,
    /// List of stampable files found
    pub files: Vec<DocumentFileInfo>,
    /// Total number of files found
    pub total_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl StampServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new StampServer with specified resource directories
    pub fn with_resource_dirs(dirs: Vec<String>) -> Self {
        Self::with_config(ServerConfig {
            resource_dirs: dirs,
            ..ServerConfig::default()
        })
    }

    /// Create a new StampServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let cache = CacheManager::new(config.cache_max_entries, config.cache_max_bytes);
        Self {
            cache: Arc::new(RwLock::new(cache)),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Overlay a stamp image onto a document and export a PDF
    #[tool(
        description = "Overlay a stamp image (signature, seal, watermark) onto a document page and export the result as a PDF. The document may be a PDF or a plain image; the stamp must be a PNG or JPEG. Position is a named anchor (top-left, top-right, bottom-left, bottom-right, center) or custom coordinates. Output mode \"pdf\" draws the stamp onto the existing page; \"raster\" rasterizes the page first and composites in pixel space (required for blend modes other than normal to affect pixels directly). Password-protected PDFs are only supported with output=\"raster\" (plus \"password\"); the \"pdf\" output path rejects them. The output is always cached (output_cache_key) for chaining.

Source format: \"document\" and \"stamp\" must each be one of {\"path\": \"/absolute/path\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn stamp_document(
        &self,
        Parameters(params): Parameters<StampDocumentParams>,
    ) -> String {
        let result = self
            .process_stamp_document(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "stamp_document failed");
                StampDocumentResult {
                    document: Self::source_name(&params.document),
                    stamp: Self::source_name(&params.stamp),
                    page: params.page,
                    placement: PlacementResult {
                        x: 0.0,
                        y: 0.0,
                        width: 0.0,
                        height: 0.0,
                    },
                    output_cache_key: String::new(),
                    output_page_count: 0,
                    output_path: None,
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Render a composited preview of the stamped page
    #[tool(
        description = "Render a preview of the stamped page as a PNG image (base64). Rasterizes the selected page, composites the stamp with the requested position, scale, opacity, and blend mode, and returns the pixels without producing a PDF. Useful for iterating on placement before calling stamp_document.

Source format: \"document\" and \"stamp\" must each be one of {\"path\": \"/absolute/path\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn preview_stamp(&self, Parameters(params): Parameters<PreviewStampParams>) -> String {
        let result = self
            .process_preview_stamp(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "preview_stamp failed");
                PreviewStampResult {
                    document: Self::source_name(&params.document),
                    stamp: Self::source_name(&params.stamp),
                    page: params.page,
                    placement: PlacementResult {
                        x: 0.0,
                        y: 0.0,
                        width: 0.0,
                        height: 0.0,
                    },
                    width: 0,
                    height: 0,
                    data_base64: String::new(),
                    mime_type: "image/png".to_string(),
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Compute a stamp placement rectangle without touching any document
    #[tool(
        description = "Compute the stamp placement rectangle for a canvas, without processing any document. Returns the top-left corner and scaled dimensions in the requested coordinate system (origin_top_left=true for raster pixels, false for PDF page points). The rectangle is never clamped to the canvas; oversized or edge-anchored stamps may extend outside. Useful for driving an external PDF writer."
    )]
    async fn compute_placement(
        &self,
        Parameters(params): Parameters<ComputePlacementParams>,
    ) -> String {
        let canvas = CanvasSpec {
            dimensions: Dimensions::new(params.canvas_width, params.canvas_height),
            margin: params.margin.unwrap_or(self.config.default_margin),
            origin_top_left: params.origin_top_left,
        };
        let stamp = Dimensions::new(params.stamp_width, params.stamp_height);

        let result = match compute_placement(&canvas, stamp, params.position, params.scale_percent)
        {
            Ok(placement) => ComputePlacementResult {
                placement: Some(placement),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "compute_placement failed");
                ComputePlacementResult {
                    placement: None,
                    error: Some(e.client_message()),
                }
            }
        };

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Get page count and dimensions of a document
    #[tool(
        description = "Get the page count and per-page dimensions of a document. PDF pages are reported in points (1/72 inch); plain images report one page in pixels. Use the dimensions with compute_placement for custom coordinates.

Source format: \"document\" must be one of {\"path\": \"/absolute/path\"}, {\"url\": \"https://...\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn get_document_info(
        &self,
        Parameters(params): Parameters<GetDocumentInfoParams>,
    ) -> String {
        let result = self
            .process_get_document_info(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "get_document_info failed");
                GetDocumentInfoResult {
                    document: Self::source_name(&params.document),
                    cache_key: None,
                    kind: String::new(),
                    page_count: 0,
                    pages: vec![],
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// List stampable files in a directory
    #[tool(
        description = "List stampable files (PDF, PNG, JPEG) in a directory. Supports recursive search and glob filename patterns."
    )]
    async fn list_documents(
        &self,
        Parameters(params): Parameters<ListDocumentsParams>,
    ) -> String {
        let result = self.process_list_documents(&params).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "list_documents failed");
            ListDocumentsResult {
                directory: params.directory.clone(),
                files: vec![],
                total_count: 0,
                error: Some(e.client_message()),
            }
        });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn source_name(source: &SourceSpec) -> String {
        match source {
            SourceSpec::Path { path } => path.clone(),
            SourceSpec::Base64 { .. } => "<base64>".to_string(),
            SourceSpec::Url { url } => url.clone(),
            SourceSpec::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }

    async fn resolve_source(
        &self,
        source: &SourceSpec,
        kind: PayloadKind,
    ) -> crate::error::Result<ResolvedSource> {
        match source {
            SourceSpec::Path { path } => {
                self.validate_path_access(path)?;
                resolve_path(path, kind)
            }
            SourceSpec::Base64 { base64 } => resolve_base64(base64, kind),
            SourceSpec::Url { url } => {
                resolve_url(
                    url,
                    kind,
                    self.config.allow_private_urls,
                    self.config.max_download_bytes,
                )
                .await
            }
            SourceSpec::CacheRef { cache_key } => resolve_cache(cache_key, &self.cache).await,
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<std::path::PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(std::path::PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<std::path::PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(std::path::PathBuf::from(path));
        }

        let path_obj = std::path::Path::new(path);
        let parent = path_obj.parent().unwrap_or(std::path::Path::new("."));

        let canonical_parent =
            std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;

        let canonical_target =
            canonical_parent.join(path_obj.file_name().unwrap_or(std::ffi::OsStr::new("")));

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical_target.starts_with(&canonical_dir) {
                    return Ok(canonical_target);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    /// Write output data to a file path, with sandbox validation.
    fn write_output(
        &self,
        output_path: &Option<String>,
        data: &[u8],
    ) -> crate::error::Result<Option<String>> {
        if let Some(ref path_str) = output_path {
            self.validate_output_path_access(path_str)?;

            let path = Path::new(path_str);

            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }

            std::fs::write(path, data)?;
            Ok(Some(path_str.clone()))
        } else {
            Ok(None)
        }
    }

    fn validate_render_limits(
        &self,
        width: Option<u16>,
        height: Option<u16>,
        scale: Option<f32>,
    ) -> crate::error::Result<()> {
        if let Some(scale) = scale {
            if scale <= 0.0 || scale > self.config.max_image_scale {
                return Err(Error::ImageDimensionExceeded {
                    detail: format!(
                        "scale must be between 0.0 (exclusive) and {} (inclusive), got {}",
                        self.config.max_image_scale, scale
                    ),
                });
            }
        }
        if let (Some(w), Some(h)) = (width, height) {
            let pixel_area = w as u64 * h as u64;
            if pixel_area > self.config.max_image_pixels {
                return Err(Error::ImageDimensionExceeded {
                    detail: format!(
                        "pixel area {}x{} = {} exceeds maximum {} pixels",
                        w, h, pixel_area, self.config.max_image_pixels
                    ),
                });
            }
        }
        Ok(())
    }

    fn decode_stamp(data: &[u8]) -> crate::error::Result<RgbaImage> {
        let img = image::load_from_memory(data).map_err(|e| Error::InvalidImage {
            reason: format!("{}", e),
        })?;
        Ok(img.to_rgba8())
    }

    fn decode_document_image(data: &[u8]) -> crate::error::Result<RgbaImage> {
        let img = image::load_from_memory(data).map_err(|e| Error::InvalidPdf {
            reason: format!("document image decode failed: {}", e),
        })?;
        Ok(img.to_rgba8())
    }

    async fn cache_output(&self, data: Vec<u8>) -> String {
        let cache_guard = self.cache.write().await;
        let key = cache_guard.generate_unique_key();
        cache_guard.put(key.clone(), data);
        key
    }

    pub async fn process_stamp_document(
        &self,
        params: &StampDocumentParams,
    ) -> crate::error::Result<StampDocumentResult> {
        let document = self
            .resolve_source(&params.document, PayloadKind::Document)
            .await?;
        let stamp = self
            .resolve_source(&params.stamp, PayloadKind::StampImage)
            .await?;

        let document_name = document.source_name.clone();
        let stamp_name = stamp.source_name.clone();

        let margin = params.margin.unwrap_or(self.config.default_margin);
        let page = params.page;
        let position = params.position;
        let scale_percent = params.scale_percent;
        let opacity_percent = params.opacity_percent;
        let blend_mode = params.blend_mode;
        let output = params.output;
        let password = params.password.clone();

        let doc_data = document.data;
        let stamp_data = stamp.data;

        let (output_data, placement, stamped_page) =
            tokio::task::spawn_blocking(move || {
                let stamp_raster = Self::decode_stamp(&stamp_data)?;

                if output == OutputMode::Pdf && is_pdf(&doc_data) {
                    // PDF-native path: place in page points, bottom-left
                    // origin. Stamp pixels map 1:1 to points.
                    let target = clamp_page(page, page_count_from_bytes(&doc_data)?);
                    let (page_w, page_h) = page_size_from_bytes(&doc_data, target)?;
                    let canvas = CanvasSpec::pdf_page(page_w, page_h).with_margin(margin);
                    let stamp_dims = Dimensions::new(
                        stamp_raster.width() as f32,
                        stamp_raster.height() as f32,
                    );
                    let placement =
                        compute_placement(&canvas, stamp_dims, position, scale_percent)?;

                    let out = stamp_pdf_page(
                        &doc_data,
                        &stamp_raster,
                        target,
                        &placement,
                        opacity_percent,
                        blend_mode,
                    )?;
                    Ok::<_, Error>((out, placement, target))
                } else {
                    // Raster path: rasterize (or decode) the page,
                    // composite in pixel space, wrap as a one-page PDF.
                    let (page_raster, target) = if is_pdf(&doc_data) {
                        render_page(&doc_data, password.as_deref(), page, None, None, None)?
                    } else {
                        (Self::decode_document_image(&doc_data)?, 1)
                    };

                    let canvas = CanvasSpec::raster(
                        page_raster.width() as f32,
                        page_raster.height() as f32,
                    )
                    .with_margin(margin);
                    let stamp_dims = Dimensions::new(
                        stamp_raster.width() as f32,
                        stamp_raster.height() as f32,
                    );
                    let placement =
                        compute_placement(&canvas, stamp_dims, position, scale_percent)?;

                    let composited = composite(
                        &page_raster,
                        &stamp_raster,
                        &placement,
                        opacity_percent,
                        blend_mode,
                    )?;
                    let out = raster_to_pdf(&composited)?;
                    Ok::<_, Error>((out, placement, target))
                }
            })
            .await
            .map_err(|e| Error::Pdfium {
                reason: format!("Task join error: {}", e),
            })??;

        let output_page_count = lopdf::Document::load_mem(&output_data)
            .map(|d| d.get_pages().len() as u32)
            .unwrap_or(0);

        let output_cache_key = self.cache_output(output_data.clone()).await;
        let output_path = self.write_output(&params.output_path, &output_data)?;

        Ok(StampDocumentResult {
            document: document_name,
            stamp: stamp_name,
            page: stamped_page,
            placement,
            output_cache_key,
            output_page_count,
            output_path,
            error: None,
        })
    }

    pub async fn process_preview_stamp(
        &self,
        params: &PreviewStampParams,
    ) -> crate::error::Result<PreviewStampResult> {
        self.validate_render_limits(params.width, params.height, params.scale)?;

        let document = self
            .resolve_source(&params.document, PayloadKind::Document)
            .await?;
        let stamp = self
            .resolve_source(&params.stamp, PayloadKind::StampImage)
            .await?;

        let document_name = document.source_name.clone();
        let stamp_name = stamp.source_name.clone();

        let margin = params.margin.unwrap_or(self.config.default_margin);
        let page = params.page;
        let position = params.position;
        let scale_percent = params.scale_percent;
        let opacity_percent = params.opacity_percent;
        let blend_mode = params.blend_mode;
        let width = params.width;
        let height = params.height;
        let scale = params.scale;
        let password = params.password.clone();

        let doc_data = document.data;
        let stamp_data = stamp.data;

        let (png_base64, placement, img_w, img_h, shown_page) =
            tokio::task::spawn_blocking(move || {
            let stamp_raster = Self::decode_stamp(&stamp_data)?;

            let (page_raster, shown_page) = if is_pdf(&doc_data) {
                render_page(&doc_data, password.as_deref(), page, width, height, scale)?
            } else {
                (Self::decode_document_image(&doc_data)?, 1)
            };

            let canvas =
                CanvasSpec::raster(page_raster.width() as f32, page_raster.height() as f32)
                    .with_margin(margin);
            let stamp_dims =
                Dimensions::new(stamp_raster.width() as f32, stamp_raster.height() as f32);
            let placement = compute_placement(&canvas, stamp_dims, position, scale_percent)?;

            let composited = composite(
                &page_raster,
                &stamp_raster,
                &placement,
                opacity_percent,
                blend_mode,
            )?;

            let (w, h) = composited.dimensions();
            let mut png_bytes = Vec::new();
            composited
                .write_to(
                    &mut std::io::Cursor::new(&mut png_bytes),
                    image::ImageFormat::Png,
                )
                .map_err(|e| Error::InvalidImage {
                    reason: format!("failed to encode preview PNG: {}", e),
                })?;

            let encoded = base64::engine::general_purpose::STANDARD.encode(&png_bytes);
            Ok::<_, Error>((encoded, placement, w, h, shown_page))
        })
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        Ok(PreviewStampResult {
            document: document_name,
            stamp: stamp_name,
            page: shown_page,
            placement,
            width: img_w,
            height: img_h,
            data_base64: png_base64,
            mime_type: "image/png".to_string(),
            error: None,
        })
    }

    pub async fn process_get_document_info(
        &self,
        params: &GetDocumentInfoParams,
    ) -> crate::error::Result<GetDocumentInfoResult> {
        let document = self
            .resolve_source(&params.document, PayloadKind::Document)
            .await?;
        let document_name = document.source_name.clone();

        let cache_key = if params.cache {
            Some(self.cache_output(document.data.clone()).await)
        } else {
            None
        };

        let data = document.data;
        let password = params.password.clone();

        let (kind, pages) = tokio::task::spawn_blocking(move || {
            if is_pdf(&data) {
                let sizes = page_sizes(&data, password.as_deref())?;
                let pages = sizes
                    .into_iter()
                    .map(|s| PageSizeInfo {
                        page: s.page,
                        width: s.width,
                        height: s.height,
                    })
                    .collect::<Vec<_>>();
                Ok::<_, Error>(("pdf".to_string(), pages))
            } else {
                let raster = Self::decode_document_image(&data)?;
                let pages = vec![PageSizeInfo {
                    page: 1,
                    width: raster.width() as f32,
                    height: raster.height() as f32,
                }];
                Ok::<_, Error>(("image".to_string(), pages))
            }
        })
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        Ok(GetDocumentInfoResult {
            document: document_name,
            cache_key,
            kind,
            page_count: pages.len() as u32,
            pages,
            error: None,
        })
    }

    fn is_stampable_file(path: &Path) -> bool {
        matches!(
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .as_deref(),
            Some("pdf") | Some("png") | Some("jpg") | Some("jpeg")
        )
    }

    pub fn process_list_documents(
        &self,
        params: &ListDocumentsParams,
    ) -> crate::error::Result<ListDocumentsResult> {
        let dir = Path::new(&params.directory);
        if !dir.is_dir() {
            return Err(Error::DocumentNotFound {
                path: params.directory.clone(),
            });
        }

        let pattern = params
            .pattern
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| Error::SourceResolution {
                reason: format!("Invalid glob pattern: {}", e),
            })?;

        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current)? {
                let entry = entry?;
                let path = entry.path();

                if path.is_dir() {
                    if params.recursive {
                        pending.push(path);
                    }
                    continue;
                }

                if !Self::is_stampable_file(&path) {
                    continue;
                }

                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string();

                if let Some(ref pattern) = pattern {
                    if !pattern.matches(&name) {
                        continue;
                    }
                }

                let metadata = entry.metadata()?;
                let modified = metadata
                    .modified()
                    .ok()
                    .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());

                files.push(DocumentFileInfo {
                    path: path.display().to_string(),
                    name,
                    size: metadata.len(),
                    modified,
                });
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        let total_count = files.len() as u32;

        Ok(ListDocumentsResult {
            directory: params.directory.clone(),
            files,
            total_count,
            error: None,
        })
    }
}

impl Default for StampServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for StampServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Stamp MCP Server overlays a stamp image onto document pages (PDF or image) \
                 and exports the result as a PDF. Stampable files in configured directories \
                 are also exposed as resources."
                    .into(),
            ),
        }
    }

    /// List stampable files from configured directories
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let mut resources = Vec::new();

        for dir in self.config.resource_dirs.iter() {
            let params = ListDocumentsParams {
                directory: dir.clone(),
                recursive: true,
                pattern: None,
            };

            if let Ok(list_result) = self.process_list_documents(&params) {
                for file in list_result.files {
                    let uri = format!("file://{}", file.path);
                    let mime_type = if file.name.to_ascii_lowercase().ends_with(".pdf") {
                        "application/pdf"
                    } else {
                        "image/*"
                    };
                    let mut resource = RawResource::new(uri.clone(), file.name.clone());
                    resource.mime_type = Some(mime_type.to_string());
                    resource.description = Some(format!(
                        "Stampable file ({} bytes){}",
                        file.size,
                        file.modified
                            .as_ref()
                            .map(|m| format!(", modified: {}", m))
                            .unwrap_or_default()
                    ));
                    resource.size = Some(file.size as u32);

                    resources.push(Annotated {
                        raw: resource,
                        annotations: None,
                    });
                }
            }
        }

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: Default::default(),
        })
    }

    /// Read a document resource and return its page information
    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let uri = &request.uri;

        let path = if uri.starts_with("file://") {
            uri.strip_prefix("file://").unwrap_or(uri)
        } else {
            return Err(ErrorData::invalid_params(
                "Only file:// URIs are supported",
                None,
            ));
        };

        // Check if the path is within a configured resource directory (using canonicalize to prevent traversal)
        let is_allowed = if self.config.resource_dirs.is_empty() {
            true
        } else if let Ok(canonical_path) = std::fs::canonicalize(path) {
            self.config.resource_dirs.iter().any(|dir| {
                std::fs::canonicalize(dir)
                    .map(|cd| canonical_path.starts_with(&cd))
                    .unwrap_or(false)
            })
        } else {
            false
        };

        if !is_allowed {
            return Err(ErrorData::invalid_params(
                "Resource not found in configured directories",
                None,
            ));
        }

        let source = SourceSpec::Path {
            path: path.to_string(),
        };

        match self
            .process_get_document_info(&GetDocumentInfoParams {
                document: source,
                password: None,
                cache: false,
            })
            .await
        {
            Ok(info) => {
                let text = serde_json::to_string_pretty(&info).unwrap_or_default();
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::TextResourceContents {
                        uri: uri.clone(),
                        mime_type: Some("application/json".to_string()),
                        text,
                        meta: Default::default(),
                    }],
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "read_resource failed");
                Err(ErrorData::internal_error(e.client_message(), None))
            }
        }
    }
}

/// Run the MCP server without resource directories
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with specified resource directories
pub async fn run_server_with_dirs(resource_dirs: Vec<String>) -> Result<()> {
    run_server_with_config(ServerConfig {
        resource_dirs,
        ..ServerConfig::default()
    })
    .await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = StampServer::with_config(config);

    tracing::info!("Stamp MCP Server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_base64(image: &RgbaImage) -> String {
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    }

    fn white_page(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
    }

    fn red_stamp(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([200, 0, 0, 255]))
    }

    #[test]
    fn source_spec_deserializes_each_variant() {
        let s: SourceSpec = serde_json::from_str(r#"{"path": "/tmp/doc.pdf"}"#).unwrap();
        assert!(matches!(s, SourceSpec::Path { .. }));

        let s: SourceSpec = serde_json::from_str(r#"{"base64": "aGk="}"#).unwrap();
        assert!(matches!(s, SourceSpec::Base64 { .. }));

        let s: SourceSpec = serde_json::from_str(r#"{"url": "https://example.com/a.pdf"}"#)
            .unwrap();
        assert!(matches!(s, SourceSpec::Url { .. }));

        let s: SourceSpec = serde_json::from_str(r#"{"cache_key": "abc"}"#).unwrap();
        assert!(matches!(s, SourceSpec::CacheRef { .. }));
    }

    #[test]
    fn source_spec_rejects_unknown_shapes() {
        assert!(serde_json::from_str::<SourceSpec>(r#""just a string""#).is_err());
        assert!(serde_json::from_str::<SourceSpec>(r#"{"wrong": "key"}"#).is_err());
        assert!(serde_json::from_str::<SourceSpec>(r#"{"path": 42}"#).is_err());
    }

    #[test]
    fn placement_mode_deserializes_tagged() {
        let m: PlacementMode = serde_json::from_str(r#"{"mode": "bottom-right"}"#).unwrap();
        assert_eq!(m, PlacementMode::BottomRight);

        let m: PlacementMode =
            serde_json::from_str(r#"{"mode": "custom", "x": 10.0, "y": 20.0}"#).unwrap();
        assert_eq!(m, PlacementMode::Custom { x: 10.0, y: 20.0 });
    }

    #[tokio::test]
    async fn stamp_document_raster_path_end_to_end() {
        let server = StampServer::new();

        let params = StampDocumentParams {
            document: SourceSpec::Base64 {
                base64: png_base64(&white_page(200, 300)),
            },
            stamp: SourceSpec::Base64 {
                base64: png_base64(&red_stamp(40, 20)),
            },
            page: 1,
            position: PlacementMode::BottomRight,
            scale_percent: 50.0,
            opacity_percent: 100.0,
            blend_mode: BlendMode::Normal,
            margin: Some(10.0),
            output: OutputMode::Raster,
            output_path: None,
            password: None,
        };

        let result = server.process_stamp_document(&params).await.unwrap();
        assert!(!result.output_cache_key.is_empty());
        assert_eq!(result.output_page_count, 1);
        // 200 - 20 - 10, 300 - 10 - 10
        assert_eq!(result.placement.x, 170.0);
        assert_eq!(result.placement.y, 280.0);
        assert_eq!(result.placement.width, 20.0);
        assert_eq!(result.placement.height, 10.0);

        // Output is chainable through the cache
        let cached = server
            .cache
            .read()
            .await
            .get(&result.output_cache_key)
            .unwrap();
        assert_eq!(&cached[0..4], b"%PDF");
    }

    #[tokio::test]
    async fn stamp_document_pdf_native_path_end_to_end() {
        let server = StampServer::new();

        // Build a one-page PDF document to stamp
        let base_pdf = raster_to_pdf(&white_page(612, 792)).unwrap();
        let params = StampDocumentParams {
            document: SourceSpec::Base64 {
                base64: base64::engine::general_purpose::STANDARD.encode(&base_pdf),
            },
            stamp: SourceSpec::Base64 {
                base64: png_base64(&red_stamp(200, 100)),
            },
            page: 1,
            position: PlacementMode::TopLeft,
            scale_percent: 30.0,
            opacity_percent: 80.0,
            blend_mode: BlendMode::Normal,
            margin: None,
            output: OutputMode::Pdf,
            output_path: None,
            password: None,
        };

        let result = server.process_stamp_document(&params).await.unwrap();
        assert_eq!(result.output_page_count, 1);
        // Bottom-left origin: top-left anchor sits at height - h - margin
        assert_eq!(result.placement.x, 50.0);
        assert_eq!(result.placement.y, 792.0 - 30.0 - 50.0);
    }

    #[tokio::test]
    async fn result_page_reports_clamped_value() {
        let server = StampServer::new();

        // One-page PDF stamped with page=99 reports the page actually used
        let base_pdf = raster_to_pdf(&white_page(200, 200)).unwrap();
        let result = server
            .process_stamp_document(&StampDocumentParams {
                document: SourceSpec::Base64 {
                    base64: base64::engine::general_purpose::STANDARD.encode(&base_pdf),
                },
                stamp: SourceSpec::Base64 {
                    base64: png_base64(&red_stamp(20, 20)),
                },
                page: 99,
                position: PlacementMode::Center,
                scale_percent: 100.0,
                opacity_percent: 100.0,
                blend_mode: BlendMode::Normal,
                margin: None,
                output: OutputMode::Pdf,
                output_path: None,
                password: None,
            })
            .await
            .unwrap();
        assert_eq!(result.page, 1);

        // Image documents always stamp their single page
        let result = server
            .process_stamp_document(&StampDocumentParams {
                document: SourceSpec::Base64 {
                    base64: png_base64(&white_page(100, 100)),
                },
                stamp: SourceSpec::Base64 {
                    base64: png_base64(&red_stamp(10, 10)),
                },
                page: 42,
                position: PlacementMode::Center,
                scale_percent: 100.0,
                opacity_percent: 100.0,
                blend_mode: BlendMode::Normal,
                margin: None,
                output: OutputMode::Raster,
                output_path: None,
                password: None,
            })
            .await
            .unwrap();
        assert_eq!(result.page, 1);
    }

    #[tokio::test]
    async fn preview_page_reports_clamped_value() {
        let server = StampServer::new();

        let result = server
            .process_preview_stamp(&PreviewStampParams {
                document: SourceSpec::Base64 {
                    base64: png_base64(&white_page(50, 50)),
                },
                stamp: SourceSpec::Base64 {
                    base64: png_base64(&red_stamp(10, 10)),
                },
                page: 7,
                position: PlacementMode::Center,
                scale_percent: 100.0,
                opacity_percent: 100.0,
                blend_mode: BlendMode::Normal,
                margin: None,
                width: None,
                height: None,
                scale: None,
                password: None,
            })
            .await
            .unwrap();
        assert_eq!(result.page, 1);
    }

    #[tokio::test]
    async fn stamp_document_rejects_bad_scale() {
        let server = StampServer::new();

        let params = StampDocumentParams {
            document: SourceSpec::Base64 {
                base64: png_base64(&white_page(100, 100)),
            },
            stamp: SourceSpec::Base64 {
                base64: png_base64(&red_stamp(10, 10)),
            },
            page: 1,
            position: PlacementMode::Center,
            scale_percent: 0.0,
            opacity_percent: 100.0,
            blend_mode: BlendMode::Normal,
            margin: None,
            output: OutputMode::Raster,
            output_path: None,
            password: None,
        };

        let result = server.process_stamp_document(&params).await;
        assert!(matches!(result, Err(Error::InvalidScale { .. })));
    }

    #[tokio::test]
    async fn preview_returns_png_for_image_document() {
        let server = StampServer::new();

        let params = PreviewStampParams {
            document: SourceSpec::Base64 {
                base64: png_base64(&white_page(100, 100)),
            },
            stamp: SourceSpec::Base64 {
                base64: png_base64(&red_stamp(10, 10)),
            },
            page: 1,
            position: PlacementMode::Center,
            scale_percent: 100.0,
            opacity_percent: 100.0,
            blend_mode: BlendMode::Normal,
            margin: None,
            width: None,
            height: None,
            scale: None,
            password: None,
        };

        let result = server.process_preview_stamp(&params).await.unwrap();
        assert_eq!(result.width, 100);
        assert_eq!(result.height, 100);
        assert_eq!(result.mime_type, "image/png");

        let png = base64::engine::general_purpose::STANDARD
            .decode(&result.data_base64)
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        // Centered 10x10 stamp at (45, 45)
        assert_eq!(*decoded.get_pixel(50, 50), Rgba([200, 0, 0, 255]));
        assert_eq!(*decoded.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn preview_rejects_excessive_scale() {
        let server = StampServer::new();

        let params = PreviewStampParams {
            document: SourceSpec::Base64 {
                base64: png_base64(&white_page(10, 10)),
            },
            stamp: SourceSpec::Base64 {
                base64: png_base64(&red_stamp(4, 4)),
            },
            page: 1,
            position: PlacementMode::Center,
            scale_percent: 100.0,
            opacity_percent: 100.0,
            blend_mode: BlendMode::Normal,
            margin: None,
            width: None,
            height: None,
            scale: Some(100.0),
            password: None,
        };

        let result = server.process_preview_stamp(&params).await;
        assert!(matches!(result, Err(Error::ImageDimensionExceeded { .. })));
    }

    #[tokio::test]
    async fn document_info_reports_image_dimensions() {
        let server = StampServer::new();

        let params = GetDocumentInfoParams {
            document: SourceSpec::Base64 {
                base64: png_base64(&white_page(320, 240)),
            },
            password: None,
            cache: true,
        };

        let result = server.process_get_document_info(&params).await.unwrap();
        assert_eq!(result.kind, "image");
        assert_eq!(result.page_count, 1);
        assert_eq!(result.pages[0].width, 320.0);
        assert_eq!(result.pages[0].height, 240.0);
        assert!(result.cache_key.is_some());
    }

    #[tokio::test]
    async fn list_documents_filters_extensions_and_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("b.png"), b"fake").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("c.jpeg"), b"fake").unwrap();

        let server = StampServer::new();

        let flat = server
            .process_list_documents(&ListDocumentsParams {
                directory: dir.path().display().to_string(),
                recursive: false,
                pattern: None,
            })
            .unwrap();
        assert_eq!(flat.total_count, 2);

        let recursive = server
            .process_list_documents(&ListDocumentsParams {
                directory: dir.path().display().to_string(),
                recursive: true,
                pattern: None,
            })
            .unwrap();
        assert_eq!(recursive.total_count, 3);

        let filtered = server
            .process_list_documents(&ListDocumentsParams {
                directory: dir.path().display().to_string(),
                recursive: true,
                pattern: Some("*.pdf".to_string()),
            })
            .unwrap();
        assert_eq!(filtered.total_count, 1);
        assert_eq!(filtered.files[0].name, "a.pdf");
    }

    #[tokio::test]
    async fn list_documents_missing_directory_fails() {
        let server = StampServer::new();
        let result = server.process_list_documents(&ListDocumentsParams {
            directory: "/nonexistent/dir".to_string(),
            recursive: false,
            pattern: None,
        });
        assert!(matches!(result, Err(Error::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn path_access_denied_outside_resource_dirs() {
        let allowed = tempfile::tempdir().unwrap();
        let forbidden = tempfile::tempdir().unwrap();
        let secret = forbidden.path().join("secret.pdf");
        std::fs::write(&secret, b"%PDF-1.4").unwrap();

        let server = StampServer::with_resource_dirs(vec![allowed
            .path()
            .display()
            .to_string()]);

        let result = server.validate_path_access(&secret.display().to_string());
        assert!(matches!(result, Err(Error::PathAccessDenied { .. })));
    }

    #[tokio::test]
    async fn output_path_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("stamped.pdf");

        let server = StampServer::new();
        let written = server
            .write_output(&Some(out_path.display().to_string()), b"%PDF-1.4 data")
            .unwrap();
        assert!(written.is_some());
        assert_eq!(std::fs::read(&out_path).unwrap(), b"%PDF-1.4 data");
    }
}
