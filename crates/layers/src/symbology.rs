use model::Style;
use serde::Deserialize;

/// Layer-wide drawing parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayerSymbology {
    /// Multiplied into every resolved alpha.
    pub opacity: f32,
    /// Style used for features without their own override.
    pub style: Option<Style>,
}

impl LayerSymbology {
    pub fn new(opacity: f32, style: Option<Style>) -> Self {
        Self { opacity, style }
    }

    /// Opacity clamped to `[0, 1]`; NaN counts as fully transparent.
    pub fn opacity(&self) -> f32 {
        if self.opacity.is_nan() {
            return 0.0;
        }
        self.opacity.clamp(0.0, 1.0)
    }
}

impl Default for LayerSymbology {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            style: None,
        }
    }
}
