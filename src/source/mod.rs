//! Source resolution and caching for documents and stamp images

mod cache;
mod resolver;

pub use cache::CacheManager;
pub use resolver::{
    is_pdf, resolve_base64, resolve_cache, resolve_path, resolve_url, PayloadKind,
    ResolvedSource,
};
