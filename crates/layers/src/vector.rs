use model::{AltitudeMode, Style};
use serde::Deserialize;

use crate::layer::{Layer, LayerId};
use crate::symbology::LayerSymbology;

/// Settings inherited from the data source backing a layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Lowest-priority altitude default, below every override.
    pub altitude_mode: Option<AltitudeMode>,
}

/// Configuration of a 2D vector layer projected into the 3D scene.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorLayer {
    id: LayerId,
    #[serde(default)]
    pub symbology: LayerSymbology,
    /// Layer-level altitude override.
    #[serde(default)]
    pub altitude_mode: Option<AltitudeMode>,
    #[serde(default)]
    pub source: SourceConfig,
}

impl VectorLayer {
    pub fn new(id: u64) -> Self {
        Self {
            id: LayerId(id),
            symbology: LayerSymbology::default(),
            altitude_mode: None,
            source: SourceConfig::default(),
        }
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.symbology.opacity = opacity;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.symbology.style = Some(style);
        self
    }

    pub fn with_altitude_mode(mut self, mode: AltitudeMode) -> Self {
        self.altitude_mode = Some(mode);
        self
    }

    pub fn with_source_altitude_mode(mut self, mode: AltitudeMode) -> Self {
        self.source.altitude_mode = Some(mode);
        self
    }

    pub fn opacity(&self) -> f32 {
        self.symbology.opacity()
    }

    pub fn style(&self) -> Option<&Style> {
        self.symbology.style.as_ref()
    }
}

impl Layer for VectorLayer {
    fn id(&self) -> LayerId {
        self.id
    }
}
