use std::collections::{BTreeSet, HashSet, VecDeque};

use layers::{Layer, VectorLayer};
use model::{ChangeKind, FeatureChange, FeatureId, FeatureSource, GeometryKind};
use runtime::{EventBus, Frame, FrameBudget, Metrics, REPAINT};
use serde::Serialize;
use tracing::debug;

use crate::config::SyncConfig;
use crate::converters::{ConvertContext, ConverterRegistry, Slot, convert};
use crate::counters;
use crate::scene_context::SceneContext;
use crate::style::StyleDescriptor;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// Working through removals and pending features; may span chunks.
    Reconciling,
    Sweeping,
}

/// Outcome of a pass, or of the chunks of a pass so far.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Added/changed features taken off the queue.
    pub processed: usize,
    /// Removal notifications applied.
    pub removed: usize,
    pub converted: usize,
    pub failed: usize,
    /// Entries purged by the sweep.
    pub swept: usize,
    /// `false` while features are still queued for a later chunk.
    pub complete: bool,
}

/// Drives passes that project one vector layer's features into the scene.
///
/// A pass applies removals, then reconciles queued features in arrival order
/// (optionally across several budgeted chunks), then sweeps every entry that
/// was neither processed nor still present in the source, and finally emits
/// a repaint.
pub struct Synchronizer {
    layer: VectorLayer,
    config: SyncConfig,
    registry: ConverterRegistry,
    scene: SceneContext,
    state: SyncState,
    pending: VecDeque<FeatureId>,
    queued: HashSet<FeatureId>,
    removals: BTreeSet<FeatureId>,
    touched: HashSet<FeatureId>,
    unsupported: BTreeSet<GeometryKind>,
    /// Totals over every completed pass.
    metrics: Metrics,
    /// Counters of the pass in progress, folded into `metrics` on completion.
    pass_metrics: Metrics,
    summary: PassSummary,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("scene", &self.scene)
            .finish()
    }
}

impl Synchronizer {
    pub fn new(layer: VectorLayer, config: SyncConfig) -> Self {
        Self::with_registry(layer, config, ConverterRegistry::standard())
    }

    pub fn with_registry(
        layer: VectorLayer,
        config: SyncConfig,
        registry: ConverterRegistry,
    ) -> Self {
        let scene = SceneContext::new(&config);
        Self::with_scene(layer, config, registry, scene)
    }

    /// Uses a caller-built scene context, e.g. one wrapping the host
    /// renderer's own collections.
    pub fn with_scene(
        layer: VectorLayer,
        config: SyncConfig,
        registry: ConverterRegistry,
        scene: SceneContext,
    ) -> Self {
        Self {
            layer,
            config,
            registry,
                    scene,
            state: SyncState::Idle,
            pending: VecDeque::new(),
            queued: HashSet::new(),
            removals: BTreeSet::new(),
            touched: HashSet::new(),
            unsupported: BTreeSet::new(),
            metrics: Metrics::new(),
            pass_metrics: Metrics::new(),
            summary: PassSummary::default(),
        }
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Counters of the last completed pass, or of the one still in progress.
    pub fn pass_metrics(&self) -> &Metrics {
        &self.pass_metrics
    }

    pub fn layer(&self) -> &VectorLayer {
        &self.layer
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Features queued but not yet reconciled.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Swaps the layer configuration and queues every feature of `source`,
    /// since opacity, style and altitude defaults affect all of them.
    pub fn set_layer(&mut self, layer: VectorLayer, source: &dyn FeatureSource) {
        self.layer = layer;
        let ids = source.feature_ids();
        debug!(layer = ?self.layer.id(), features = ids.len(), "layer reconfigured");
        for id in ids {
            self.queue(id);
        }
    }

    fn queue(&mut self, id: FeatureId) {
        if self.queued.insert(id) {
            self.pending.push_back(id);
        }
    }

    /// Queues a batch of notifications. Repeated ids coalesce; removals are
    /// kept apart and applied before any creation of the next pass or chunk.
    pub fn enqueue(&mut self, changes: &[FeatureChange]) {
        for change in changes {
            match change.kind {
                ChangeKind::Removed => {
                    self.removals.insert(change.id);
                }
                ChangeKind::Added | ChangeKind::Changed => self.queue(change.id),
            }
        }
    }

    /// Queues `changes` and runs a complete pass.
    pub fn run_pass(
        &mut self,
        source: &dyn FeatureSource,
        changes: &[FeatureChange],
        frame: Frame,
        bus: &mut EventBus,
    ) -> PassSummary {
        self.enqueue(changes);
        self.run_pass_with_budget(source, frame, bus, &mut FrameBudget::unlimited())
    }

    /// Runs one chunk of at most `chunk_size` features.
    pub fn run_chunk(
        &mut self,
        source: &dyn FeatureSource,
        frame: Frame,
        bus: &mut EventBus,
    ) -> PassSummary {
        // A zero-sized chunk would never make progress.
        let mut budget = FrameBudget::new(self.config.chunk_size.max(1));
        self.run_pass_with_budget(source, frame, bus, &mut budget)
    }

    /// Works through queued removals and features until `budget` runs out.
    ///
    /// Each feature costs one unit. If work remains, a repaint is emitted for
    /// the chunk and an incomplete summary returned; the next call resumes.
    /// Otherwise the pass is finished with a sweep and a final repaint.
    pub fn run_pass_with_budget(
        &mut self,
        source: &dyn FeatureSource,
        frame: Frame,
        bus: &mut EventBus,
        budget: &mut FrameBudget,
    ) -> PassSummary {
        if self.state == SyncState::Idle {
            self.state = SyncState::Reconciling;
            self.summary = PassSummary::default();
            self.pass_metrics.clear();
            self.touched.clear();
        }

        for id in std::mem::take(&mut self.removals) {
            self.delete_feature(id);
            self.summary.removed += 1;
        }

        while let Some(&id) = self.pending.front() {
            if !budget.try_consume(1) {
                break;
            }
            self.pending.pop_front();
            self.queued.remove(&id);
            self.reconcile(source, id);
        }

        if !self.pending.is_empty() {
            debug!(
                spent = budget.spent_units(),
                pending = self.pending.len(),
                "chunk budget exhausted"
            );
            bus.emit(
                frame,
                REPAINT,
                format!("chunk done, {} features pending", self.pending.len()),
            );
            return self.summary;
        }

        self.state = SyncState::Sweeping;
        for id in self.scene.feature_ids() {
            if !self.touched.contains(&id) && source.contains(id) {
                self.scene.mark_feature_live(id);
            }
        }
        let swept = self.scene.sweep();
        if swept > 0 {
            debug!(swept, "swept stale scene entries");
        }
        self.pass_metrics.inc_counter(counters::SWEPT, swept as u64);
        self.pass_metrics
            .set_gauge(counters::ENTRIES, self.scene.len() as i64);
        self.metrics.merge(&self.pass_metrics);

        self.summary.swept = swept;
        self.summary.complete = true;
        bus.emit(frame, REPAINT, "pass complete");
        self.state = SyncState::Idle;
        self.summary
    }

    fn delete_feature(&mut self, id: FeatureId) -> usize {
        let removed = self.scene.remove_feature(id);
        self.pass_metrics
            .inc_counter(counters::DELETED, removed as u64);
        removed
    }

    fn reconcile(&mut self, source: &dyn FeatureSource, id: FeatureId) {
        self.summary.processed += 1;
        self.touched.insert(id);

        // Removed (or filtered out) since it was queued.
        let Some(feature) = source.feature(id) else {
            let removed = self.delete_feature(id);
            if removed > 0 {
                debug!(feature = %id, removed, "feature gone before conversion");
            }
            return;
        };
        let Some(geometry) = feature.geometry() else {
            self.delete_feature(id);
            return;
        };

        let style = StyleDescriptor::resolve(feature, &self.layer, &self.config);
        let view = geometry.as_ref();

        let slot = Slot::root(id);
        let mut ctx = ConvertContext {
            scene: &mut self.scene,
            layer: &self.layer,
            config: &self.config,
            registry: &self.registry,
            metrics: &mut self.pass_metrics,
            unsupported: &mut self.unsupported,
        };
        if convert(feature, &slot, view, &style, &mut ctx) {
            self.summary.converted += 1;
            return;
        }
        self.summary.failed += 1;
        self.pass_metrics.inc_counter(counters::FAILED, 1);
        let removed = self.delete_feature(id);
        debug!(
            feature = %id,
            kind = ?view.kind,
            removed,
            "feature not rendered this pass"
        );
    }
}
