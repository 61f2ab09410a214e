use serde::Deserialize;

/// Linear RGBA, every channel in `[0, 1]`.
pub type Color = [f32; 4];

pub const BLACK: Color = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fill {
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Stroke {
    pub color: Color,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub dash: Option<Vec<f32>>,
}

/// Unresolved vector style, as attached to a feature or a layer.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Style {
    #[serde(default)]
    pub fill: Option<Fill>,
    #[serde(default)]
    pub stroke: Option<Stroke>,
}

impl Style {
    pub fn fill(color: Color) -> Self {
        Self {
            fill: Some(Fill { color }),
            stroke: None,
        }
    }

    pub fn stroke(color: Color, width: Option<f32>) -> Self {
        Self {
            fill: None,
            stroke: Some(Stroke {
                color,
                width,
                dash: None,
            }),
        }
    }

    pub fn with_fill(mut self, color: Color) -> Self {
        self.fill = Some(Fill { color });
        self
    }

    pub fn with_stroke(mut self, color: Color, width: Option<f32>) -> Self {
        self.stroke = Some(Stroke {
            color,
            width,
            dash: None,
        });
        self
    }
}

/// How a geometry's height relates to the ground.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AltitudeMode {
    /// Coordinates' own altitude, absolute.
    #[default]
    None,
    /// Draped on the ground; coordinate altitude is ignored.
    ClampToGround,
    /// Coordinate altitude measured from the ground.
    RelativeToGround,
}

impl AltitudeMode {
    /// Parses the property-bag spelling; unknown text is `None` (not set).
    pub fn parse(s: &str) -> Option<AltitudeMode> {
        match s {
            "none" => Some(AltitudeMode::None),
            "clampToGround" => Some(AltitudeMode::ClampToGround),
            "relativeToGround" => Some(AltitudeMode::RelativeToGround),
            _ => None,
        }
    }

    pub fn is_clamped(self) -> bool {
        self == AltitudeMode::ClampToGround
    }
}

#[cfg(test)]
mod tests {
    use super::{AltitudeMode, Style};

    #[test]
    fn altitude_mode_parse() {
        assert_eq!(
            AltitudeMode::parse("clampToGround"),
            Some(AltitudeMode::ClampToGround)
        );
        assert_eq!(
            AltitudeMode::parse("relativeToGround"),
            Some(AltitudeMode::RelativeToGround)
        );
        assert_eq!(AltitudeMode::parse("none"), Some(AltitudeMode::None));
        assert_eq!(AltitudeMode::parse("CLAMP"), None);
    }

    #[test]
    fn style_deserializes_optional_channels() {
        let style: Style =
            serde_json::from_str(r#"{"stroke": {"color": [1, 0, 0, 1]}}"#).expect("parse style");
        assert!(style.fill.is_none());
        let stroke = style.stroke.expect("stroke");
        assert_eq!(stroke.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(stroke.width, None);
    }
}
