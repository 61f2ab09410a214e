use model::{AltitudeMode, Feature, GeometryRef, ShapeRef};
use render::{GeometryRole, PrimitiveClass};

use super::leaf::{LeafPlanner, RolePlan};
use super::shapes;
use crate::style::StyleDescriptor;

/// Line strings draw their stroke as a single polyline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinePlanner;

impl LeafPlanner for LinePlanner {
    fn plans<'g>(
        &self,
        _feature: &Feature,
        geometry: GeometryRef<'g>,
        style: &StyleDescriptor,
        altitude: AltitudeMode,
    ) -> Vec<RolePlan<'g>> {
        let ShapeRef::LineString(coords) = geometry.shape else {
            return Vec::new();
        };
        vec![RolePlan::new(
            GeometryRole::Geom,
            PrimitiveClass::polyline(altitude.is_clamped()),
            style.material(geometry.kind, GeometryRole::Geom),
            move || shapes::line(coords, altitude),
        )]
    }
}
