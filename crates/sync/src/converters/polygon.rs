use model::{AltitudeMode, Feature, GeometryRef, ShapeRef};
use render::{GeometryRole, PrimitiveClass};

use super::leaf::{LeafPlanner, RolePlan};
use super::shapes;
use crate::style::StyleDescriptor;

/// Polygons draw a triangulated fill and a polyline outline of every ring.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolygonPlanner;

impl LeafPlanner for PolygonPlanner {
    fn plans<'g>(
        &self,
        _feature: &Feature,
        geometry: GeometryRef<'g>,
        style: &StyleDescriptor,
        altitude: AltitudeMode,
    ) -> Vec<RolePlan<'g>> {
        let clamped = altitude.is_clamped();
        let kind = geometry.kind;
        match geometry.shape {
            ShapeRef::Polygon(rings) => vec![
                RolePlan::new(
                    GeometryRole::Geom,
                    PrimitiveClass::polygon(clamped),
                    style.material(kind, GeometryRole::Geom),
                    move || shapes::polygon_fill(rings, altitude),
                ),
                RolePlan::new(
                    GeometryRole::GeomOutline,
                    PrimitiveClass::polyline(clamped),
                    style.material(kind, GeometryRole::GeomOutline),
                    move || shapes::polygon_outline(rings, altitude),
                ),
            ],
            // Merged into one fill and one outline, as dynamic areas are.
            ShapeRef::MultiPolygon(polygons) => vec![
                RolePlan::new(
                    GeometryRole::Geom,
                    PrimitiveClass::polygon(clamped),
                    style.material(kind, GeometryRole::Geom),
                    move || shapes::multipolygon_fill(polygons, altitude),
                ),
                RolePlan::new(
                    GeometryRole::GeomOutline,
                    PrimitiveClass::polyline(clamped),
                    style.material(kind, GeometryRole::GeomOutline),
                    move || shapes::multipolygon_outline(polygons, altitude),
                ),
            ],
            _ => Vec::new(),
        }
    }
}
