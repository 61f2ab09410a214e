use std::collections::BTreeSet;

use layers::VectorLayer;
use model::{
    AltitudeMode, Feature, FeatureChange, FeatureId, FeatureStore, Geometry, GeometryKind,
    GeometryShape, Position, Properties, PropertyValue, Style,
};
use pretty_assertions::assert_eq;
use render::{GeometryRole, PrimitiveClass};
use runtime::{EventBus, Frame, REPAINT};
use sync::converters::{LeafConverter, LinePlanner};
use sync::{
    ConverterRegistry, GeometryPath, PassSummary, Slot, SyncConfig, SyncState, Synchronizer,
    counters,
};

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

fn frame(i: u64) -> Frame {
    Frame::new(i, 1.0 / 60.0)
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

fn line(offset: f64) -> Geometry {
    Geometry::line_string(vec![
        Position::lon_lat(offset, 0.0),
        Position::lon_lat(offset + 1.0, 1.0),
    ])
}

fn styled_layer() -> VectorLayer {
    VectorLayer::new(1).with_style(Style::fill(BLUE).with_stroke(RED, Some(2.0)))
}

fn total_mutations(sync: &Synchronizer) -> u64 {
    GeometryRole::ALL
        .iter()
        .map(|role| sync.scene().collection(*role).stats().mutations())
        .sum()
}

fn total_primitives(sync: &Synchronizer) -> usize {
    GeometryRole::ALL
        .iter()
        .map(|role| sync.scene().collection(*role).len())
        .sum()
}

fn pass(sync: &mut Synchronizer, store: &mut FeatureStore, bus: &mut EventBus) -> PassSummary {
    let changes = store.drain_changes();
    sync.run_pass(store, &changes, frame(0), bus)
}

#[test]
fn stroke_only_clamped_polygon_gets_a_faded_ground_outline_and_no_fill() {
    let layer = VectorLayer::new(1)
        .with_opacity(0.5)
        .with_altitude_mode(AltitudeMode::ClampToGround);
    let mut sync = Synchronizer::new(layer, SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(
        Feature::new(FeatureId(1), Some(Geometry::polygon(vec![square(0.0)])))
            .with_style(Style::stroke(RED, None)),
    );

    let summary = pass(&mut sync, &mut store, &mut bus);
    assert!(summary.complete);
    assert_eq!(sync.scene().len(), 1);

    let slot = Slot::root(FeatureId(1));
    assert!(sync.scene().lookup(&slot.key(GeometryRole::Geom)).is_none());
    let outline = slot.key(GeometryRole::GeomOutline);
    let entry = sync.scene().lookup(&outline).copied().expect("outline entry");
    assert_eq!(entry.class, PrimitiveClass::GroundPolyline);
    let primitive = sync.scene().primitive(&outline).expect("outline primitive");
    assert_eq!(primitive.material.alpha(), 0.5);
    assert_eq!(primitive.material.color[..3], [1.0_f32, 0.0, 0.0]);
    assert_eq!(bus.count(REPAINT), 1);
}

#[test]
fn unchanged_revision_causes_no_renderer_mutations() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    let polygon = Geometry::polygon(vec![square(0.0)]);
    store.insert(Feature::new(FeatureId(1), Some(polygon)));
    store.insert(Feature::new(FeatureId(2), Some(line(3.0))));
    pass(&mut sync, &mut store, &mut bus);
    let before = total_mutations(&sync);

    let changes = [
        FeatureChange::changed(FeatureId(1)),
        FeatureChange::changed(FeatureId(2)),
    ];
    for i in 1..3 {
        let summary = sync.run_pass(&store, &changes, frame(i), &mut bus);
        assert_eq!(summary.converted, 2);
    }
    assert_eq!(total_mutations(&sync), before);
    assert_eq!(sync.metrics().counter(counters::SKIPPED), 4);
    assert_eq!(sync.pass_metrics().counter(counters::SKIPPED), 2);
    assert_eq!(sync.pass_metrics().counter(counters::CREATED), 0);
    assert_eq!(sync.metrics().gauge(counters::ENTRIES), Some(3));
}

#[test]
fn every_leaf_of_nested_collections_gets_its_own_entries() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    let nested = Geometry::collection(vec![
        Geometry::polygon(vec![square(0.0)]),
        Geometry::new(GeometryShape::MultiPoint(vec![
            Position::lon_lat(5.0, 5.0),
            Position::lon_lat(6.0, 5.0),
        ])),
    ]);
    let geometry = Geometry::collection(vec![
        Geometry::point(Position::lon_lat(1.0, 1.0)),
        line(2.0),
        nested,
    ]);
    let leaves = geometry.as_ref().leaf_count();
    assert_eq!(leaves, 5);
    store.insert(Feature::new(FeatureId(9), Some(geometry)));

    pass(&mut sync, &mut store, &mut bus);
    let entries = sync.scene().entries_under(FeatureId(9), &GeometryPath::root());
    let paths: BTreeSet<GeometryPath> = entries.iter().map(|(k, _)| k.path.clone()).collect();
    assert_eq!(paths.len(), leaves);
    // The polygon owns a fill and an outline; every other leaf one primitive.
    assert_eq!(entries.len(), leaves + 1);
    assert!(paths.contains(&GeometryPath::root().child(2).child(1).child(0)));
    assert_eq!(sync.scene().check_consistency(), Ok(()));
}

#[test]
fn shrinking_a_collection_drops_the_removed_parts() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(
        FeatureId(3),
        Some(Geometry::collection(vec![line(0.0), line(1.0), line(2.0)])),
    ));
    pass(&mut sync, &mut store, &mut bus);
    assert_eq!(sync.scene().len(), 3);

    store.update(FeatureId(3), |f| {
        if let Some(g) = f.geometry_mut() {
            g.set_shape(GeometryShape::GeometryCollection(vec![line(0.0)]));
        }
    });
    pass(&mut sync, &mut store, &mut bus);
    assert_eq!(sync.scene().len(), 1);
    assert_eq!(total_primitives(&sync), 1);
}

#[test]
fn geometry_override_wins_per_part() {
    let layer = styled_layer()
        .with_altitude_mode(AltitudeMode::None)
        .with_source_altitude_mode(AltitudeMode::RelativeToGround);
    let mut sync = Synchronizer::new(layer, SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    let props = Properties::new()
        .with("altitudeMode", PropertyValue::Text("none".into()))
        .with(
            "altitudeModes",
            PropertyValue::List(vec![
                PropertyValue::Text("clampToGround".into()),
                PropertyValue::Null,
            ]),
        );
    store.insert(
        Feature::new(
            FeatureId(4),
            Some(Geometry::new(GeometryShape::MultiLineString(vec![
                vec![Position::lon_lat(0.0, 0.0), Position::lon_lat(1.0, 0.0)],
                vec![Position::lon_lat(0.0, 1.0), Position::lon_lat(1.0, 1.0)],
            ]))),
        )
        .with_properties(props),
    );
    pass(&mut sync, &mut store, &mut bus);

    let root = Slot::root(FeatureId(4));
    let class_of = |i: u32| {
        sync.scene()
            .lookup(&root.child(i).key(GeometryRole::Geom))
            .map(|e| e.class)
    };
    assert_eq!(class_of(0), Some(PrimitiveClass::GroundPolyline));
    assert_eq!(class_of(1), Some(PrimitiveClass::Polyline));
}

#[test]
fn hidden_feature_is_swept_without_a_removal_notification() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(FeatureId(1), Some(line(0.0))));
    store.insert(Feature::new(FeatureId(2), Some(line(1.0))));
    pass(&mut sync, &mut store, &mut bus);
    assert_eq!(sync.scene().feature_ids(), vec![FeatureId(1), FeatureId(2)]);

    store.set_visible(FeatureId(2), false);
    assert!(store.pending_changes().is_empty());
    let summary = pass(&mut sync, &mut store, &mut bus);

    assert_eq!(summary.swept, 1);
    assert_eq!(sync.scene().feature_ids(), vec![FeatureId(1)]);
    assert_eq!(sync.scene().collection(GeometryRole::Geom).len(), 1);
    assert_eq!(sync.metrics().counter(counters::SWEPT), 1);
    assert_eq!(sync.scene().check_consistency(), Ok(()));

    store.set_visible(FeatureId(2), true);
    pass(&mut sync, &mut store, &mut bus);
    assert_eq!(sync.scene().feature_ids(), vec![FeatureId(1), FeatureId(2)]);
}

#[test]
fn removal_is_applied_before_recreation_in_the_same_batch() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(FeatureId(1), Some(line(0.0))));
    pass(&mut sync, &mut store, &mut bus);
    let key = Slot::root(FeatureId(1)).key(GeometryRole::Geom);
    let first = sync.scene().lookup(&key).map(|e| e.handle);

    store.remove(FeatureId(1));
    store.insert(Feature::new(FeatureId(1), Some(line(0.5))));
    let summary = pass(&mut sync, &mut store, &mut bus);

    assert_eq!(summary.removed, 1);
    assert_eq!(summary.converted, 1);
    let stats = sync.scene().collection(GeometryRole::Geom).stats();
    assert_eq!((stats.added, stats.removed), (2, 1));
    assert_eq!(sync.scene().collection(GeometryRole::Geom).len(), 1);
    assert_ne!(sync.scene().lookup(&key).map(|e| e.handle), first);
}

#[test]
fn chunked_pass_repaints_per_chunk_and_sweeps_once() {
    let config = SyncConfig {
        chunk_size: 2,
        ..SyncConfig::default()
    };
    let mut sync = Synchronizer::new(styled_layer(), config);
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    for id in 0..5 {
        store.insert(Feature::new(FeatureId(id), Some(line(id as f64))));
    }
    sync.enqueue(&store.drain_changes());

    let first = sync.run_chunk(&store, frame(0), &mut bus);
    assert!(!first.complete);
    assert_eq!(first.processed, 2);
    assert_eq!(sync.state(), SyncState::Reconciling);
    assert_eq!(sync.scene().len(), 2);

    // Removed from the model before its chunk came up, without a notification.
    store.set_visible(FeatureId(4), false);

    let second = sync.run_chunk(&store, frame(1), &mut bus);
    assert!(!second.complete);
    let last = sync.run_chunk(&store, frame(2), &mut bus);
    assert!(last.complete);
    assert_eq!(last.processed, 5);
    assert_eq!(last.converted, 4);
    assert_eq!(sync.state(), SyncState::Idle);
    assert_eq!(sync.scene().len(), 4);
    let hidden = Slot::root(FeatureId(4)).key(GeometryRole::Geom);
    assert!(sync.scene().lookup(&hidden).is_none());
    assert_eq!(bus.count(REPAINT), 3);
}

#[test]
fn renderer_failure_skips_the_feature_until_it_changes_again() {
    let config = SyncConfig {
        max_primitives_per_role: Some(1),
        ..SyncConfig::default()
    };
    let mut sync = Synchronizer::new(styled_layer(), config);
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(FeatureId(1), Some(line(0.0))));
    store.insert(Feature::new(FeatureId(2), Some(line(1.0))));

    let summary = pass(&mut sync, &mut store, &mut bus);
    assert_eq!((summary.converted, summary.failed), (1, 1));
    assert_eq!(sync.scene().feature_ids(), vec![FeatureId(1)]);
    assert_eq!(sync.scene().check_consistency(), Ok(()));

    store.remove(FeatureId(1));
    store.update(FeatureId(2), |_| {});
    pass(&mut sync, &mut store, &mut bus);
    assert_eq!(sync.scene().feature_ids(), vec![FeatureId(2)]);
}

#[test]
fn missing_geometry_deletes_existing_entries() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(FeatureId(1), Some(line(0.0))));
    pass(&mut sync, &mut store, &mut bus);

    store.update(FeatureId(1), |f| f.set_geometry(None));
    let summary = pass(&mut sync, &mut store, &mut bus);
    assert_eq!(summary.failed, 0);
    assert!(sync.scene().is_empty());
    assert_eq!(total_primitives(&sync), 0);
}

#[test]
fn dynamic_track_keeps_its_primitive_while_it_grows() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(
        Feature::new(FeatureId(1), Some(line(0.0)))
            .with_properties(Properties::new().with("dynamic", PropertyValue::Bool(true))),
    );
    pass(&mut sync, &mut store, &mut bus);
    let key = Slot::root(FeatureId(1)).key(GeometryRole::Geom);
    let entry = sync.scene().lookup(&key).copied().expect("track entry");
    assert_eq!(entry.kind, GeometryKind::DynamicLineString);

    for tick in 1..=10 {
        store.update(FeatureId(1), |f| {
            if let Some(g) = f.geometry_mut() {
                g.push_position(Position::lon_lat(1.0 + tick as f64 * 0.01, 1.0));
            }
        });
        pass(&mut sync, &mut store, &mut bus);
    }

    let after = sync.scene().lookup(&key).copied().expect("track entry");
    assert_eq!(after.handle, entry.handle);
    assert_eq!(
        sync.scene().primitive(&key).map(|p| p.shape.positions().len()),
        Some(12)
    );
    let stats = sync.scene().collection(GeometryRole::Geom).stats();
    assert_eq!((stats.added, stats.removed, stats.patched), (1, 0, 10));
}

#[test]
fn unsupported_kind_is_skipped_without_disturbing_the_batch() {
    let registry =
        ConverterRegistry::new().with(GeometryKind::LineString, LeafConverter(LinePlanner));
    let mut sync = Synchronizer::with_registry(styled_layer(), SyncConfig::default(), registry);
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    let point = |lon| Some(Geometry::point(Position::lon_lat(lon, 0.0)));
    store.insert(Feature::new(FeatureId(1), point(0.0)));
    store.insert(Feature::new(FeatureId(2), Some(line(0.0))));
    store.insert(Feature::new(FeatureId(3), point(1.0)));

    let summary = pass(&mut sync, &mut store, &mut bus);
    assert!(summary.complete);
    assert_eq!((summary.converted, summary.failed), (1, 2));
    assert_eq!(sync.scene().feature_ids(), vec![FeatureId(2)]);
}

#[test]
fn layer_opacity_change_rewrites_materials_only() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(FeatureId(1), Some(Geometry::polygon(vec![square(0.0)]))));
    pass(&mut sync, &mut store, &mut bus);
    let fill = Slot::root(FeatureId(1)).key(GeometryRole::Geom);
    let handle = sync.scene().lookup(&fill).map(|e| e.handle);

    sync.set_layer(styled_layer().with_opacity(0.25), &store);
    assert_eq!(sync.pending(), 1);
    let summary = sync.run_pass(&store, &[], frame(1), &mut bus);

    assert_eq!(summary.converted, 1);
    assert_eq!(sync.scene().lookup(&fill).map(|e| e.handle), handle);
    let primitive = sync.scene().primitive(&fill).expect("fill");
    assert_eq!(primitive.material.alpha(), 0.25);
    let stats = sync.scene().collection(GeometryRole::Geom).stats();
    assert_eq!((stats.added, stats.removed, stats.patched), (1, 0, 1));
}

#[test]
fn replacing_a_collection_rebuilds_its_children() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(FeatureId(5), Some(Geometry::collection(vec![line(0.0)]))));
    pass(&mut sync, &mut store, &mut bus);
    let child = Slot::root(FeatureId(5)).child(0).key(GeometryRole::Geom);
    let positions = |sync: &Synchronizer| {
        sync.scene()
            .primitive(&child)
            .map(|p| p.shape.positions().to_vec())
    };
    let before = positions(&sync);

    store.update(FeatureId(5), |f| {
        f.set_geometry(Some(Geometry::collection(vec![line(50.0)])))
    });
    pass(&mut sync, &mut store, &mut bus);
    let replaced = positions(&sync);
    assert_ne!(replaced, before);

    // Wholesale replacement through the store, then back to the first shape.
    store.insert(Feature::new(FeatureId(5), Some(Geometry::collection(vec![line(0.0)]))));
    pass(&mut sync, &mut store, &mut bus);
    assert_eq!(positions(&sync), before);
}

#[test]
fn zero_chunk_size_still_completes() {
    let config = SyncConfig {
        chunk_size: 0,
        ..SyncConfig::default()
    };
    let mut sync = Synchronizer::new(styled_layer(), config);
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    store.insert(Feature::new(FeatureId(1), Some(line(0.0))));
    store.insert(Feature::new(FeatureId(2), Some(line(1.0))));
    sync.enqueue(&store.drain_changes());

    assert!(!sync.run_chunk(&store, frame(0), &mut bus).complete);
    let summary = sync.run_chunk(&store, frame(1), &mut bus);
    assert!(summary.complete);
    assert_eq!(summary.converted, 2);
    assert_eq!(sync.state(), SyncState::Idle);
}

#[test]
fn dynamic_flag_reaches_collection_parts() {
    let mut sync = Synchronizer::new(styled_layer(), SyncConfig::default());
    let mut store = FeatureStore::new();
    let mut bus = EventBus::new();
    let track = Geometry::collection(vec![line(0.0), Geometry::point(Position::lon_lat(9.0, 9.0))]);
    store.insert(
        Feature::new(FeatureId(6), Some(track))
            .with_properties(Properties::new().with("dynamic", PropertyValue::Bool(true))),
    );
    pass(&mut sync, &mut store, &mut bus);
    let key = Slot::root(FeatureId(6)).child(0).key(GeometryRole::Geom);
    let entry = sync.scene().lookup(&key).copied().expect("track entry");
    assert_eq!(entry.kind, GeometryKind::DynamicLineString);

    store.update(FeatureId(6), |f| {
        if let Some(g) = f.geometry_mut() {
            g.edit(|shape| {
                if let GeometryShape::GeometryCollection(parts) = shape {
                    parts[0] = line(0.5);
                }
            });
        }
    });
    pass(&mut sync, &mut store, &mut bus);

    let after = sync.scene().lookup(&key).copied().expect("track entry");
    assert_eq!(after.handle, entry.handle);
    let stats = sync.scene().collection(GeometryRole::Geom).stats();
    // Parts share the collection's revision, so both are rewritten in place.
    assert_eq!((stats.added, stats.removed, stats.patched), (2, 0, 2));
}
