use std::collections::{BTreeMap, BTreeSet};

use crate::feature::{Feature, FeatureId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// One notification of the change feed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FeatureChange {
    pub id: FeatureId,
    pub kind: ChangeKind,
}

impl FeatureChange {
    pub fn added(id: FeatureId) -> Self {
        Self {
            id,
            kind: ChangeKind::Added,
        }
    }

    pub fn changed(id: FeatureId) -> Self {
        Self {
            id,
            kind: ChangeKind::Changed,
        }
    }

    pub fn removed(id: FeatureId) -> Self {
        Self {
            id,
            kind: ChangeKind::Removed,
        }
    }
}

/// Read access to the current (visibility-filtered) state of the 2D model.
///
/// The synchronizer consults it for freshness checks before converting a
/// feature, and to learn which untouched features are still present.
pub trait FeatureSource {
    fn feature(&self, id: FeatureId) -> Option<&Feature>;

    fn feature_ids(&self) -> Vec<FeatureId>;

    fn contains(&self, id: FeatureId) -> bool {
        self.feature(id).is_some()
    }
}

/// In-memory feature model with a change feed.
///
/// Hidden features are filtered out of every read and their visibility
/// changes do not produce removal notifications, matching a layer filter.
#[derive(Debug, Default)]
pub struct FeatureStore {
    features: BTreeMap<FeatureId, Feature>,
    hidden: BTreeSet<FeatureId>,
    pending: Vec<FeatureChange>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a feature.
    pub fn insert(&mut self, mut feature: Feature) {
        let id = feature.id();
        if let Some(previous) = self.features.get(&id) {
            feature.supersede(previous);
        }
        let existed = self.features.insert(id, feature).is_some();
        if self.hidden.contains(&id) {
            return;
        }
        self.pending.push(if existed {
            FeatureChange::changed(id)
        } else {
            FeatureChange::added(id)
        });
    }

    pub fn remove(&mut self, id: FeatureId) -> Option<Feature> {
        let removed = self.features.remove(&id)?;
        if !self.hidden.remove(&id) {
            self.pending.push(FeatureChange::removed(id));
        }
        Some(removed)
    }

    /// Mutates a feature in place and records a change notification.
    ///
    /// Returns `false` if the feature does not exist.
    pub fn update(&mut self, id: FeatureId, f: impl FnOnce(&mut Feature)) -> bool {
        let Some(feature) = self.features.get_mut(&id) else {
            return false;
        };
        f(feature);
        if !self.hidden.contains(&id) {
            self.pending.push(FeatureChange::changed(id));
        }
        true
    }

    /// Mutates a feature without notifying; the next full pass will not see
    /// the edit until a change for `id` is delivered.
    pub fn update_silently(&mut self, id: FeatureId, f: impl FnOnce(&mut Feature)) -> bool {
        let Some(feature) = self.features.get_mut(&id) else {
            return false;
        };
        f(feature);
        true
    }

    /// Shows or hides a feature. Hiding is silent; showing re-announces the
    /// feature as added.
    pub fn set_visible(&mut self, id: FeatureId, visible: bool) {
        if !self.features.contains_key(&id) {
            return;
        }
        if visible {
            if self.hidden.remove(&id) {
                self.pending.push(FeatureChange::added(id));
            }
        } else {
            self.hidden.insert(id);
        }
    }

    pub fn is_visible(&self, id: FeatureId) -> bool {
        self.features.contains_key(&id) && !self.hidden.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn pending_changes(&self) -> &[FeatureChange] {
        &self.pending
    }

    pub fn drain_changes(&mut self) -> Vec<FeatureChange> {
        std::mem::take(&mut self.pending)
    }
}

impl FeatureSource for FeatureStore {
    fn feature(&self, id: FeatureId) -> Option<&Feature> {
        if self.hidden.contains(&id) {
            return None;
        }
        self.features.get(&id)
    }

    fn feature_ids(&self) -> Vec<FeatureId> {
        self.features
            .keys()
            .filter(|id| !self.hidden.contains(id))
            .copied()
            .collect()
    }
}
