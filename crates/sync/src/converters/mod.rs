//! Geometry converters and the registry that dispatches to them.

pub mod leaf;
pub mod line;
pub mod point;
pub mod polygon;
pub mod recursive;
pub mod shapes;

use std::collections::{BTreeSet, HashMap};

use layers::VectorLayer;
use model::{Feature, FeatureId, GeometryKind, GeometryRef};
use render::GeometryRole;
use runtime::Metrics;
use tracing::{debug, warn};

use crate::altitude::{is_primitive_class_changing, resolve_altitude};
use crate::config::SyncConfig;
use crate::counters;
use crate::dynamic::{AdapterOutcome, DynamicAdapter, DynamicPlanner};
use crate::scene_context::{EntryKey, GeometryPath, SceneContext, SceneEntry};
use crate::style::StyleDescriptor;

pub use leaf::{LeafConverter, LeafPlanner, RolePlan};
pub use line::LinePlanner;
pub use point::PointPlanner;
pub use polygon::PolygonPlanner;
pub use recursive::RecursiveConverter;

/// Everything a converter may touch, passed explicitly down the recursion.
pub struct ConvertContext<'a> {
    pub scene: &'a mut SceneContext,
    pub layer: &'a VectorLayer,
    pub config: &'a SyncConfig,
    pub registry: &'a ConverterRegistry,
    pub metrics: &'a mut Metrics,
    /// Kinds already reported as unsupported; each is logged once.
    pub unsupported: &'a mut BTreeSet<GeometryKind>,
}

/// Where a (sub)geometry's entries live in the scene context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub feature: FeatureId,
    pub path: GeometryPath,
}

impl Slot {
    pub fn root(feature: FeatureId) -> Self {
        Self {
            feature,
            path: GeometryPath::root(),
        }
    }

    pub fn child(&self, index: u32) -> Self {
        Self {
            feature: self.feature,
            path: self.path.child(index),
        }
    }

    pub fn key(&self, role: GeometryRole) -> EntryKey {
        EntryKey::new(self.feature, self.path.clone(), role)
    }

    pub fn part_index(&self) -> usize {
        self.path.part_index()
    }
}

/// Uniform create/update/retrieve/delete contract of one geometry kind.
pub trait GeometryConverter {
    /// Builds and registers the primitives for `geometry`. Returns `false`
    /// for degenerate geometry or a renderer failure, leaving no entries at
    /// `slot`.
    fn create(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> bool;

    /// Brings existing primitives up to date, rebuilding vertex data only
    /// when the geometry revision changed. Returns `false` when the entries
    /// cannot be updated in place and must be recreated.
    fn update(
        &self,
        feature: &Feature,
        slot: &Slot,
        geometry: GeometryRef<'_>,
        style: &StyleDescriptor,
        ctx: &mut ConvertContext<'_>,
    ) -> bool;

    /// Current entries at or below `slot`, without side effects.
    fn retrieve(&self, slot: &Slot, ctx: &ConvertContext<'_>) -> Vec<(EntryKey, SceneEntry)> {
        ctx.scene.entries_under(slot.feature, &slot.path)
    }

    /// Disposes every primitive at or below `slot`.
    fn delete(&self, slot: &Slot, ctx: &mut ConvertContext<'_>) -> usize {
        ctx.scene.remove_subtree(slot.feature, &slot.path)
    }
}

/// Dispatch table from geometry kind to converter, built once.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: HashMap<GeometryKind, Box<dyn GeometryConverter>>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converters for every [`GeometryKind`].
    pub fn standard() -> Self {
        Self::new()
            .with(GeometryKind::Point, LeafConverter(PointPlanner))
            .with(GeometryKind::LineString, LeafConverter(LinePlanner))
            .with(GeometryKind::Polygon, LeafConverter(PolygonPlanner))
            .with(GeometryKind::MultiPoint, RecursiveConverter)
            .with(GeometryKind::MultiLineString, RecursiveConverter)
            .with(GeometryKind::MultiPolygon, RecursiveConverter)
            .with(GeometryKind::GeometryCollection, RecursiveConverter)
            .with(GeometryKind::DynamicLineString, LeafConverter(DynamicPlanner))
            .with(GeometryKind::DynamicPolygon, LeafConverter(DynamicPlanner))
            .with(GeometryKind::DynamicMultiPolygon, LeafConverter(DynamicPlanner))
    }

    /// Installs `converter` for `kind`, returning the one it replaces.
    pub fn register(
        &mut self,
        kind: GeometryKind,
        converter: impl GeometryConverter + 'static,
    ) -> Option<Box<dyn GeometryConverter>> {
        self.converters.insert(kind, Box::new(converter))
    }

    pub fn with(mut self, kind: GeometryKind, converter: impl GeometryConverter + 'static) -> Self {
        self.register(kind, converter);
        self
    }

    pub fn get(&self, kind: GeometryKind) -> Option<&dyn GeometryConverter> {
        self.converters.get(&kind).map(|c| c.as_ref())
    }

    pub fn kinds(&self) -> Vec<GeometryKind> {
        let mut kinds: Vec<GeometryKind> = self.converters.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Existing entries that cannot be carried over to `geometry` in place.
fn is_structural_change(
    feature: &Feature,
    slot: &Slot,
    geometry: GeometryRef<'_>,
    existing: &[(EntryKey, SceneEntry)],
    ctx: &ConvertContext<'_>,
) -> bool {
    if geometry.kind.is_composite() {
        // A leaf used to live here.
        return existing.iter().any(|(key, _)| key.path == slot.path);
    }
    let altitude = resolve_altitude(ctx.layer, feature, slot.part_index());
    existing.iter().any(|(key, entry)| {
        key.path != slot.path
            || entry.kind != geometry.kind
            || is_primitive_class_changing(altitude, entry.class)
    })
}

/// Converts `geometry` at `slot`: create when nothing exists there, update
/// otherwise, and delete then create when the kind or the altitude class
/// changed or the update gave up.
///
/// On a feature flagged `dynamic`, every line or polygon (at the root or as
/// a part) is promoted to its dynamic kind and tried in place first.
pub fn convert(
    feature: &Feature,
    slot: &Slot,
    geometry: GeometryRef<'_>,
    style: &StyleDescriptor,
    ctx: &mut ConvertContext<'_>,
) -> bool {
    let geometry = match geometry.kind.dynamic_variant() {
        Some(kind) if feature.is_dynamic() => geometry.with_kind(kind),
        _ => geometry,
    };
    if geometry.kind.is_dynamic() {
        match DynamicAdapter.apply(feature, slot, geometry, style, ctx) {
            AdapterOutcome::NoOp | AdapterOutcome::Patched => return true,
            AdapterOutcome::NeedsConversion => {}
        }
    }

    let registry = ctx.registry;
    let Some(converter) = registry.get(geometry.kind) else {
        if ctx.unsupported.insert(geometry.kind) {
            warn!(kind = ?geometry.kind, "no converter registered for geometry kind");
        }
        ctx.scene.remove_subtree(slot.feature, &slot.path);
        return false;
    };

    let existing = converter.retrieve(slot, ctx);
    if existing.is_empty() {
        return converter.create(feature, slot, geometry, style, ctx);
    }

    if is_structural_change(feature, slot, geometry, &existing, ctx) {
        debug!(
            feature = %slot.feature,
            path = %slot.path,
            kind = ?geometry.kind,
            "recreating primitives after kind or altitude class change"
        );
        return recreate(converter, feature, slot, geometry, style, ctx);
    }

    if converter.update(feature, slot, geometry, style, ctx) {
        return true;
    }
    if geometry.kind.is_composite() {
        // Every part already fell back on its own.
        return false;
    }
    recreate(converter, feature, slot, geometry, style, ctx)
}

fn recreate(
    converter: &dyn GeometryConverter,
    feature: &Feature,
    slot: &Slot,
    geometry: GeometryRef<'_>,
    style: &StyleDescriptor,
    ctx: &mut ConvertContext<'_>,
) -> bool {
    converter.delete(slot, ctx);
    if !geometry.kind.is_composite() {
        ctx.metrics.inc_counter(counters::RECREATED, 1);
    }
    converter.create(feature, slot, geometry, style, ctx)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{ConvertContext, ConverterRegistry, Slot, convert};
    use crate::config::SyncConfig;
    use crate::counters;
    use crate::scene_context::{GeometryPath, SceneContext};
    use crate::style::StyleDescriptor;
    use layers::VectorLayer;
    use model::{
        AltitudeMode, Feature, FeatureId, Geometry, GeometryKind, GeometryShape, Position, Style,
    };
    use render::{GeometryRole, PrimitiveClass};
    use runtime::Metrics;

    struct Harness {
        scene: SceneContext,
        layer: VectorLayer,
        config: SyncConfig,
        registry: ConverterRegistry,
        metrics: Metrics,
        unsupported: BTreeSet<GeometryKind>,
    }

    impl Harness {
        fn new(registry: ConverterRegistry) -> Self {
            let config = SyncConfig::default();
            Self {
                scene: SceneContext::new(&config),
                layer: VectorLayer::new(1)
                    .with_style(Style::fill([0.0, 0.0, 1.0, 1.0]).with_stroke([1.0; 4], Some(2.0))),
                config,
                registry,
                metrics: Metrics::new(),
                unsupported: BTreeSet::new(),
            }
        }

        fn convert(&mut self, feature: &Feature) -> bool {
            let style = StyleDescriptor::resolve(feature, &self.layer, &self.config);
            let Some(geometry) = feature.geometry() else {
                return false;
            };
            let mut ctx = ConvertContext {
                scene: &mut self.scene,
                layer: &self.layer,
                config: &self.config,
                registry: &self.registry,
                metrics: &mut self.metrics,
                unsupported: &mut self.unsupported,
            };
            convert(feature, &Slot::root(feature.id()), geometry.as_ref(), &style, &mut ctx)
        }
    }

    fn square(offset: f64) -> Vec<Position> {
        vec![
            Position::lon_lat(offset, 0.0),
            Position::lon_lat(offset + 1.0, 0.0),
            Position::lon_lat(offset + 1.0, 1.0),
            Position::lon_lat(offset, 1.0),
            Position::lon_lat(offset, 0.0),
        ]
    }

    #[test]
    fn standard_registry_covers_every_kind() {
        assert_eq!(ConverterRegistry::standard().kinds().len(), 10);
    }

    #[test]
    fn creates_then_skips_unchanged_geometry() {
        let mut h = Harness::new(ConverterRegistry::standard());
        let feature = Feature::new(FeatureId(1), Some(Geometry::polygon(vec![square(0.0)])));

        assert!(h.convert(&feature));
        assert_eq!(h.scene.len(), 2);
        assert_eq!(h.metrics.counter(counters::CREATED), 2);
        let mutations = h.scene.collection(GeometryRole::Geom).stats().mutations();

        assert!(h.convert(&feature));
        assert_eq!(h.metrics.counter(counters::SKIPPED), 1);
        assert_eq!(
            h.scene.collection(GeometryRole::Geom).stats().mutations(),
            mutations
        );
    }

    #[test]
    fn degenerate_line_leaves_no_entries() {
        let mut h = Harness::new(ConverterRegistry::standard());
        let mut feature = Feature::new(
            FeatureId(2),
            Some(Geometry::line_string(vec![
                Position::lon_lat(0.0, 0.0),
                Position::lon_lat(1.0, 0.0),
            ])),
        );
        assert!(h.convert(&feature));
        assert_eq!(h.scene.len(), 1);

        feature.set_geometry(Some(Geometry::line_string(vec![Position::lon_lat(0.0, 0.0)])));
        assert!(!h.convert(&feature));
        assert!(h.scene.is_empty());
        assert!(h.scene.collection(GeometryRole::Geom).is_empty());
    }

    #[test]
    fn altitude_class_change_recreates() {
        let mut h = Harness::new(ConverterRegistry::standard());
        let line = Geometry::line_string(vec![
            Position::lon_lat(0.0, 0.0),
            Position::lon_lat(1.0, 0.0),
        ]);
        let feature = Feature::new(FeatureId(3), Some(line));
        assert!(h.convert(&feature));
        let key = Slot::root(FeatureId(3)).key(GeometryRole::Geom);
        let before = *h.scene.lookup(&key).expect("entry");
        assert_eq!(before.class, PrimitiveClass::Polyline);

        h.layer = h.layer.clone().with_altitude_mode(AltitudeMode::ClampToGround);
        assert!(h.convert(&feature));
        let after = *h.scene.lookup(&key).expect("entry");
        assert_eq!(after.class, PrimitiveClass::GroundPolyline);
        assert_ne!(before.handle, after.handle);
        assert_eq!(h.metrics.counter(counters::RECREATED), 1);
        assert_eq!(h.scene.collection(GeometryRole::Geom).len(), 1);
    }

    #[test]
    fn unsupported_kind_is_reported_once_and_skipped() {
        let registry = ConverterRegistry::new().with(
            GeometryKind::Point,
            super::LeafConverter(super::PointPlanner),
        );
        let mut h = Harness::new(registry);
        let line = Feature::new(
            FeatureId(4),
            Some(Geometry::line_string(vec![
                Position::lon_lat(0.0, 0.0),
                Position::lon_lat(1.0, 0.0),
            ])),
        );
        assert!(!h.convert(&line));
        assert!(!h.convert(&line));
        assert_eq!(h.unsupported.len(), 1);
        assert!(h.scene.is_empty());
    }

    #[test]
    fn leaf_replacing_a_collection_drops_the_children() {
        let mut h = Harness::new(ConverterRegistry::standard());
        let mut feature = Feature::new(
            FeatureId(5),
            Some(Geometry::new(GeometryShape::MultiPoint(vec![
                Position::lon_lat(0.0, 0.0),
                Position::lon_lat(1.0, 0.0),
            ]))),
        );
        assert!(h.convert(&feature));
        assert_eq!(h.scene.len(), 2);

        feature.set_geometry(Some(Geometry::point(Position::lon_lat(5.0, 5.0))));
        assert!(h.convert(&feature));
        let entries = h.scene.entries_under(FeatureId(5), &GeometryPath::root());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].0.path.is_root());
        assert_eq!(h.scene.check_consistency(), Ok(()));
    }
}
