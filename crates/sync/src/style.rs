use layers::VectorLayer;
use model::{BLACK, Color, Feature, GeometryKind, Style};
use render::{GeometryRole, Material};

use crate::config::SyncConfig;

/// Style after override resolution and layer opacity.
///
/// `fill` is absent when the winning style has no fill; `stroke` always
/// exists and is fully transparent when the style has no stroke, so an
/// outline that loses its stroke fades out instead of lingering.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDescriptor {
    pub fill: Option<Color>,
    pub stroke: Color,
    pub stroke_width: f32,
    pub dash: Option<Vec<f32>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Channel {
    Fill,
    Stroke,
}

fn default_style() -> Style {
    Style::fill(BLACK).with_stroke(BLACK, None)
}

fn with_opacity(mut color: Color, opacity: f32) -> Color {
    let alpha = if color[3].is_nan() {
        0.0
    } else {
        color[3].clamp(0.0, 1.0)
    };
    color[3] = alpha * opacity;
    color
}

impl StyleDescriptor {
    /// Feature override, then layer style, then the black default.
    pub fn resolve(feature: &Feature, layer: &VectorLayer, config: &SyncConfig) -> Self {
        let default;
        let style = match feature.style().or(layer.style()) {
            Some(style) => style,
            None => {
                default = default_style();
                &default
            }
        };
        let opacity = layer.opacity();

        let fill = style.fill.as_ref().map(|f| with_opacity(f.color, opacity));
        let (stroke, stroke_width, dash) = match &style.stroke {
            Some(s) => (
                with_opacity(s.color, opacity),
                s.width.unwrap_or(config.default_feature_size),
                s.dash.clone(),
            ),
            None => (
                [BLACK[0], BLACK[1], BLACK[2], 0.0],
                config.default_feature_size,
                None,
            ),
        };

        Self {
            fill,
            stroke,
            stroke_width,
            dash,
        }
    }

    /// Material for `role` of a geometry of `kind`; `None` means "no entry".
    pub fn material(&self, kind: GeometryKind, role: GeometryRole) -> Option<Material> {
        match channel(kind, role) {
            Channel::Stroke => Some(Material {
                color: self.stroke,
                width: self.stroke_width,
                dash: self.dash.clone(),
            }),
            Channel::Fill => self
                .fill
                .map(|color| Material::solid(color, self.stroke_width)),
        }
    }
}

fn channel(kind: GeometryKind, role: GeometryRole) -> Channel {
    if role.is_outline() {
        return Channel::Stroke;
    }
    match (role, kind) {
        (
            GeometryRole::Geom,
            GeometryKind::LineString
            | GeometryKind::MultiLineString
            | GeometryKind::DynamicLineString,
        ) => Channel::Stroke,
        _ => Channel::Fill,
    }
}

/// One-shot resolution for a single role.
pub fn resolve_style(
    feature: &Feature,
    kind: GeometryKind,
    layer: &VectorLayer,
    role: GeometryRole,
    config: &SyncConfig,
) -> Option<Material> {
    StyleDescriptor::resolve(feature, layer, config).material(kind, role)
}
