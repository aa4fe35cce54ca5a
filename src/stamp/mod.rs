//! Stamp placement and compositing core
//!
//! Pure, stateless functions: a placement calculator that turns a logical
//! position/size specification into a concrete rectangle, and a compositor
//! that alpha-blends a resampled stamp raster onto a document raster.
//! Neither performs I/O or logging; failures are typed and returned.

mod blend;
mod compositor;
mod placement;

pub use blend::BlendMode;
pub use compositor::composite;
pub use placement::{
    compute_placement, CanvasSpec, Dimensions, PlacementMode, PlacementResult, DEFAULT_MARGIN,
};
