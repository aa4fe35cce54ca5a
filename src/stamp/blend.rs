//! Per-channel blend formulas
//!
//! Separable modes only: each channel blends independently on normalized
//! values, so one dispatch serves both the raster compositor and the
//! naming of PDF graphics-state blend modes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-pixel color-combination function applied before alpha mixing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Standard alpha-over: the stamp color replaces the document color
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl BlendMode {
    /// Blend one normalized channel: `s` is the stamp value, `d` the
    /// document value, both in [0, 1].
    #[inline]
    pub fn apply(self, s: f32, d: f32) -> f32 {
        match self {
            BlendMode::Normal => s,
            BlendMode::Multiply => s * d,
            BlendMode::Screen => s + d - s * d,
            BlendMode::Overlay => {
                if d <= 0.5 {
                    2.0 * s * d
                } else {
                    1.0 - 2.0 * (1.0 - s) * (1.0 - d)
                }
            }
            BlendMode::Darken => s.min(d),
            BlendMode::Lighten => s.max(d),
        }
    }
}
