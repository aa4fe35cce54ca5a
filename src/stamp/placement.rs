//! Stamp placement calculator
//!
//! Converts a logical placement specification (anchor mode, margin, scale)
//! into a concrete rectangle in the target coordinate system. The same
//! math serves both raster compositing (top-left origin) and PDF page
//! placement (bottom-left origin).

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Width/height pair in pixels or page points.
///
/// Units are never mixed within one computation: a raster placement uses
/// pixels throughout, a PDF-native placement uses points throughout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    pub width: f32,
    pub height: f32,
}

impl Dimensions {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Named anchor point or explicit coordinate for the stamp position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case", tag = "mode")]
pub enum PlacementMode {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    /// Literal coordinates in the target coordinate system.
    ///
    /// These are passed through untouched: they are NOT adjusted for the
    /// coordinate origin and the margin does not apply. The caller must
    /// supply them in the same system the result will be consumed in
    /// (top-left origin for rasters, bottom-left origin for PDF pages).
    Custom { x: f32, y: f32 },
}

/// Target surface for a placement computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CanvasSpec {
    /// Canvas dimensions (pixels for rasters, points for PDF pages)
    pub dimensions: Dimensions,
    /// Offset from each anchored edge, same unit as the dimensions
    #[serde(default = "default_margin")]
    pub margin: f32,
    /// true for raster/canvas systems (y grows downward), false for
    /// PDF page coordinates (y grows upward)
    #[serde(default = "default_true")]
    pub origin_top_left: bool,
}

/// Default offset from anchored edges.
pub const DEFAULT_MARGIN: f32 = 50.0;

fn default_margin() -> f32 {
    DEFAULT_MARGIN
}

fn default_true() -> bool {
    true
}

impl CanvasSpec {
    /// Top-left-origin canvas (raster compositing path).
    pub fn raster(width: f32, height: f32) -> Self {
        Self {
            dimensions: Dimensions::new(width, height),
            margin: DEFAULT_MARGIN,
            origin_top_left: true,
        }
    }

    /// Bottom-left-origin canvas (PDF page placement path).
    pub fn pdf_page(width: f32, height: f32) -> Self {
        Self {
            dimensions: Dimensions::new(width, height),
            margin: DEFAULT_MARGIN,
            origin_top_left: false,
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }
}

/// Resolved stamp rectangle: top-left corner in the target coordinate
/// system plus the final scaled stamp dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlacementResult {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Compute the stamp rectangle for the given canvas, stamp dimensions,
/// placement mode, and scale percentage.
///
/// The result is deliberately not clamped to the canvas: a stamp larger
/// than the canvas (or anchored near an edge) may produce coordinates
/// outside `[0, width] x [0, height]`. The compositor skips out-of-bounds
/// pixels; PDF writers draw the rectangle as given.
pub fn compute_placement(
    canvas: &CanvasSpec,
    stamp: Dimensions,
    mode: PlacementMode,
    scale_percent: f32,
) -> Result<PlacementResult> {
    if !(scale_percent > 0.0 && scale_percent <= 100.0) {
        return Err(Error::InvalidScale {
            value: scale_percent,
        });
    }
    let Dimensions { width, height } = canvas.dimensions;
    if !(width > 0.0) || !(height > 0.0) {
        return Err(Error::InvalidCanvas { width, height });
    }

    let scaled_w = stamp.width * scale_percent / 100.0;
    let scaled_h = stamp.height * scale_percent / 100.0;
    let margin = canvas.margin;

    // The y rule for "top" and "bottom" flips with the coordinate origin;
    // x is origin-independent.
    let top_y = if canvas.origin_top_left {
        margin
    } else {
        height - scaled_h - margin
    };
    let bottom_y = if canvas.origin_top_left {
        height - scaled_h - margin
    } else {
        margin
    };
    let left_x = margin;
    let right_x = width - scaled_w - margin;

    let (x, y) = match mode {
        PlacementMode::TopLeft => (left_x, top_y),
        PlacementMode::TopRight => (right_x, top_y),
        PlacementMode::BottomLeft => (left_x, bottom_y),
        PlacementMode::BottomRight => (right_x, bottom_y),
        PlacementMode::Center => ((width - scaled_w) / 2.0, (height - scaled_h) / 2.0),
        PlacementMode::Custom { x, y } => (x, y),
    };

    Ok(PlacementResult {
        x,
        y,
        width: scaled_w,
        height: scaled_h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn canvas_800x1000() -> CanvasSpec {
        CanvasSpec::raster(800.0, 1000.0)
    }

    #[test]
    fn scale_out_of_range_rejected() {
        let stamp = Dimensions::new(200.0, 100.0);
        for bad in [0.0, -10.0, 100.1, f32::NAN] {
            let result =
                compute_placement(&canvas_800x1000(), stamp, PlacementMode::Center, bad);
            assert!(matches!(result, Err(Error::InvalidScale { .. })), "{bad}");
        }
    }

    #[test]
    fn degenerate_canvas_rejected() {
        let stamp = Dimensions::new(200.0, 100.0);
        let canvas = CanvasSpec::raster(0.0, 1000.0);
        let result = compute_placement(&canvas, stamp, PlacementMode::Center, 50.0);
        assert!(matches!(result, Err(Error::InvalidCanvas { .. })));

        let canvas = CanvasSpec::raster(800.0, -1.0);
        let result = compute_placement(&canvas, stamp, PlacementMode::Center, 50.0);
        assert!(matches!(result, Err(Error::InvalidCanvas { .. })));
    }

    #[test]
    fn bottom_right_example_scenario() {
        // canvas 800x1000, stamp 200x100 at 30% -> 60x30, margin 50
        let stamp = Dimensions::new(200.0, 100.0);
        let result =
            compute_placement(&canvas_800x1000(), stamp, PlacementMode::BottomRight, 30.0)
                .unwrap();
        assert_eq!(
            result,
            PlacementResult {
                x: 690.0,
                y: 920.0,
                width: 60.0,
                height: 30.0
            }
        );
    }

    #[test]
    fn top_left_on_pdf_page_example_scenario() {
        // US Letter page in points, bottom-left origin
        let canvas = CanvasSpec::pdf_page(612.0, 792.0);
        let stamp = Dimensions::new(200.0, 100.0);
        let result = compute_placement(&canvas, stamp, PlacementMode::TopLeft, 30.0).unwrap();
        assert_eq!(result.x, 50.0);
        assert_eq!(result.y, 792.0 - 30.0 - 50.0);
    }

    #[rstest]
    #[case(PlacementMode::TopLeft, 50.0, 50.0)]
    #[case(PlacementMode::TopRight, 800.0 - 60.0 - 50.0, 50.0)]
    #[case(PlacementMode::BottomLeft, 50.0, 1000.0 - 30.0 - 50.0)]
    #[case(PlacementMode::BottomRight, 800.0 - 60.0 - 50.0, 1000.0 - 30.0 - 50.0)]
    #[case(PlacementMode::Center, (800.0 - 60.0) / 2.0, (1000.0 - 30.0) / 2.0)]
    fn corner_modes_sit_exactly_margin_from_edges(
        #[case] mode: PlacementMode,
        #[case] expected_x: f32,
        #[case] expected_y: f32,
    ) {
        let stamp = Dimensions::new(200.0, 100.0);
        let result = compute_placement(&canvas_800x1000(), stamp, mode, 30.0).unwrap();
        assert_eq!(result.x, expected_x);
        assert_eq!(result.y, expected_y);
    }

    #[test]
    fn origin_flip_swaps_top_and_bottom_rows() {
        let stamp = Dimensions::new(200.0, 100.0);
        let raster = CanvasSpec::raster(800.0, 1000.0);
        let page = CanvasSpec::pdf_page(800.0, 1000.0);

        let top_raster =
            compute_placement(&raster, stamp, PlacementMode::TopLeft, 30.0).unwrap();
        let bottom_page =
            compute_placement(&page, stamp, PlacementMode::BottomLeft, 30.0).unwrap();
        assert_eq!(top_raster.y, bottom_page.y);

        let bottom_raster =
            compute_placement(&raster, stamp, PlacementMode::BottomLeft, 30.0).unwrap();
        let top_page = compute_placement(&page, stamp, PlacementMode::TopLeft, 30.0).unwrap();
        assert_eq!(bottom_raster.y, top_page.y);
    }

    #[test]
    fn center_is_origin_independent() {
        let stamp = Dimensions::new(200.0, 100.0);
        let raster = CanvasSpec::raster(800.0, 1000.0);
        let page = CanvasSpec::pdf_page(800.0, 1000.0);
        let a = compute_placement(&raster, stamp, PlacementMode::Center, 30.0).unwrap();
        let b = compute_placement(&page, stamp, PlacementMode::Center, 30.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_coordinates_pass_through_untouched() {
        let stamp = Dimensions::new(200.0, 100.0);
        let mode = PlacementMode::Custom { x: 12.5, y: -3.0 };
        for canvas in [
            CanvasSpec::raster(800.0, 1000.0),
            CanvasSpec::pdf_page(800.0, 1000.0),
        ] {
            let result = compute_placement(&canvas, stamp, mode, 100.0).unwrap();
            assert_eq!(result.x, 12.5);
            assert_eq!(result.y, -3.0);
        }
    }

    #[test]
    fn oversized_stamp_goes_negative_without_clamping() {
        // canvas 100x100, stamp scaled to 150x150, centered -> (-25, -25)
        let canvas = CanvasSpec::raster(100.0, 100.0);
        let stamp = Dimensions::new(150.0, 150.0);
        let result = compute_placement(&canvas, stamp, PlacementMode::Center, 100.0).unwrap();
        assert_eq!(
            result,
            PlacementResult {
                x: -25.0,
                y: -25.0,
                width: 150.0,
                height: 150.0
            }
        );
    }

    #[test]
    fn placement_is_deterministic() {
        let stamp = Dimensions::new(123.0, 77.0);
        let canvas = CanvasSpec::raster(800.0, 1000.0).with_margin(17.0);
        let a = compute_placement(&canvas, stamp, PlacementMode::TopRight, 42.0).unwrap();
        let b = compute_placement(&canvas, stamp, PlacementMode::TopRight, 42.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_margin_respected() {
        let canvas = CanvasSpec::raster(800.0, 1000.0).with_margin(10.0);
        let stamp = Dimensions::new(200.0, 100.0);
        let result = compute_placement(&canvas, stamp, PlacementMode::TopLeft, 50.0).unwrap();
        assert_eq!(result.x, 10.0);
        assert_eq!(result.y, 10.0);
    }
}
