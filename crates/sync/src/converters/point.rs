use model::{AltitudeMode, Feature, GeometryRef, ShapeRef};
use render::{GeometryRole, PrimitiveClass};

use super::leaf::{LeafPlanner, RolePlan};
use super::shapes;
use crate::style::StyleDescriptor;

/// Points draw as billboards, or as an ellipsoid with a ground ring when
/// the feature sets a radius.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointPlanner;

impl LeafPlanner for PointPlanner {
    fn plans<'g>(
        &self,
        feature: &Feature,
        geometry: GeometryRef<'g>,
        style: &StyleDescriptor,
        altitude: AltitudeMode,
    ) -> Vec<RolePlan<'g>> {
        let ShapeRef::Point(position) = geometry.shape else {
            return Vec::new();
        };
        let kind = geometry.kind;

        let Some(radius) = feature.ellipsoid_radius() else {
            return vec![RolePlan::new(
                GeometryRole::Geom,
                PrimitiveClass::Billboard,
                style.material(kind, GeometryRole::Geom),
                move || Some(shapes::billboard(position, altitude)),
            )];
        };
        vec![
            RolePlan::new(
                GeometryRole::Ellipsoid,
                PrimitiveClass::Ellipsoid,
                style.material(kind, GeometryRole::Ellipsoid),
                move || Some(shapes::ellipsoid(position, radius, altitude)),
            ),
            RolePlan::new(
                GeometryRole::EllipsoidOutline,
                PrimitiveClass::polyline(altitude.is_clamped()),
                style.material(kind, GeometryRole::EllipsoidOutline),
                move || shapes::ellipse_outline(position, radius, altitude),
            ),
        ]
    }
}
