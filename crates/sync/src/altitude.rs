use layers::VectorLayer;
use model::{AltitudeMode, Feature};
use render::PrimitiveClass;

/// Resolves the altitude mode of part `part_index` of `feature`.
///
/// First set value wins: the per-part list, the feature override, the layer
/// override, the source default. An index past the end of the per-part list
/// reads the list's first element; a null element defers to the next level.
pub fn resolve_altitude(layer: &VectorLayer, feature: &Feature, part_index: usize) -> AltitudeMode {
    let per_part = feature.altitude_modes();
    per_part
        .get(part_index)
        .or(per_part.first())
        .copied()
        .flatten()
        .or_else(|| feature.altitude_mode())
        .or(layer.altitude_mode)
        .or(layer.source.altitude_mode)
        .unwrap_or_default()
}

/// Whether a primitive of class `existing` must be replaced to honor
/// `new_mode`, because the ground and free variants are distinct native
/// classes.
pub fn is_primitive_class_changing(new_mode: AltitudeMode, existing: PrimitiveClass) -> bool {
    existing.has_ground_variant() && existing.is_ground() != new_mode.is_clamped()
}

#[cfg(test)]
mod tests {
    use super::{is_primitive_class_changing, resolve_altitude};
    use layers::VectorLayer;
    use model::{AltitudeMode, Feature, FeatureId, Properties, PropertyValue};
    use render::PrimitiveClass;

    fn text(s: &str) -> PropertyValue {
        PropertyValue::Text(s.to_string())
    }

    fn feature(props: Properties) -> Feature {
        Feature::new(FeatureId(1), None).with_properties(props)
    }

    #[test]
    fn part_override_beats_every_other_level() {
        let layer = VectorLayer::new(1)
            .with_altitude_mode(AltitudeMode::None)
            .with_source_altitude_mode(AltitudeMode::None);
        let f = feature(
            Properties::new()
                .with("altitudeMode", text("relativeToGround"))
                .with("altitudeModes", PropertyValue::List(vec![text("clampToGround")])),
        );
        assert_eq!(resolve_altitude(&layer, &f, 0), AltitudeMode::ClampToGround);
    }

    #[test]
    fn falls_through_levels_in_order() {
        let source_only =
            VectorLayer::new(1).with_source_altitude_mode(AltitudeMode::RelativeToGround);
        let plain = feature(Properties::new());
        assert_eq!(
            resolve_altitude(&source_only, &plain, 0),
            AltitudeMode::RelativeToGround
        );

        let layered = source_only.clone().with_altitude_mode(AltitudeMode::ClampToGround);
        assert_eq!(resolve_altitude(&layered, &plain, 0), AltitudeMode::ClampToGround);

        let featured = feature(Properties::new().with("altitudeMode", text("none")));
        assert_eq!(resolve_altitude(&layered, &featured, 0), AltitudeMode::None);

        assert_eq!(
            resolve_altitude(&VectorLayer::new(2), &plain, 3),
            AltitudeMode::None
        );
    }

    #[test]
    fn out_of_range_index_reads_first_element() {
        let f = feature(Properties::new().with(
            "altitudeModes",
            PropertyValue::List(vec![text("clampToGround"), text("relativeToGround")]),
        ));
        let layer = VectorLayer::new(1);
        assert_eq!(resolve_altitude(&layer, &f, 1), AltitudeMode::RelativeToGround);
        assert_eq!(resolve_altitude(&layer, &f, 7), AltitudeMode::ClampToGround);
    }

    #[test]
    fn null_part_entry_defers_to_feature() {
        let f = feature(
            Properties::new()
                .with("altitudeMode", text("relativeToGround"))
                .with(
                    "altitudeModes",
                    PropertyValue::List(vec![text("clampToGround"), PropertyValue::Null]),
                ),
        );
        let layer = VectorLayer::new(1);
        assert_eq!(resolve_altitude(&layer, &f, 1), AltitudeMode::RelativeToGround);
    }

    #[test]
    fn class_change_only_between_ground_and_free() {
        assert!(is_primitive_class_changing(
            AltitudeMode::ClampToGround,
            PrimitiveClass::Polyline
        ));
        assert!(is_primitive_class_changing(
            AltitudeMode::RelativeToGround,
            PrimitiveClass::GroundPolygon
        ));
        assert!(!is_primitive_class_changing(
            AltitudeMode::None,
            PrimitiveClass::PolygonMesh
        ));
        assert!(!is_primitive_class_changing(
            AltitudeMode::ClampToGround,
            PrimitiveClass::GroundPolyline
        ));
        assert!(!is_primitive_class_changing(
            AltitudeMode::ClampToGround,
            PrimitiveClass::Billboard
        ));
    }
}
