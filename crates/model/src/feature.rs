use serde::Deserialize;

use crate::geometry::Geometry;
use crate::properties::{ALTITUDE_MODE_KEY, ALTITUDE_MODES_KEY, DYNAMIC_KEY, Properties, RADIUS_KEY};
use crate::style::{AltitudeMode, Style};

/// Stable identity of a feature in the 2D model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "feature#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    id: FeatureId,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    style: Option<Style>,
}

impl Feature {
    pub fn new(id: FeatureId, geometry: Option<Geometry>) -> Self {
        Self {
            id,
            geometry,
            properties: Properties::new(),
            style: None,
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        self.geometry.as_mut()
    }

    /// Replaces the geometry; its revision continues from the old one.
    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        let floor = self.geometry.as_ref().map_or(0, Geometry::max_revision);
        self.geometry = geometry.map(|mut g| {
            g.advance_past(floor);
            g
        });
    }

    /// Continues geometry revisions from `previous` when this feature
    /// replaces it wholesale.
    pub(crate) fn supersede(&mut self, previous: &Feature) {
        let floor = previous.geometry.as_ref().map_or(0, Geometry::max_revision);
        if let Some(g) = self.geometry.as_mut() {
            g.advance_past(floor);
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Feature-level style override.
    pub fn style(&self) -> Option<&Style> {
        self.style.as_ref()
    }

    pub fn set_style(&mut self, style: Option<Style>) {
        self.style = style;
    }

    pub fn is_dynamic(&self) -> bool {
        self.properties.bool(DYNAMIC_KEY).unwrap_or(false)
    }

    /// Ellipsoid radius for point geometries, if the feature asks for one.
    pub fn ellipsoid_radius(&self) -> Option<f64> {
        self.properties
            .number(RADIUS_KEY)
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    pub fn altitude_mode(&self) -> Option<AltitudeMode> {
        self.properties
            .text(ALTITUDE_MODE_KEY)
            .and_then(AltitudeMode::parse)
    }

    /// Per-part overrides; `None` entries leave that part to the next level.
    pub fn altitude_modes(&self) -> Vec<Option<AltitudeMode>> {
        self.properties
            .list(ALTITUDE_MODES_KEY)
            .map(|items| {
                items
                    .iter()
                    .map(|v| v.as_text().and_then(AltitudeMode::parse))
                    .collect()
            })
            .unwrap_or_default()
    }
}
