use std::collections::{BTreeSet, HashMap};

use model::{AltitudeMode, FeatureId, GeometryKind, Revision};
use render::{
    GeometryRole, Primitive, PrimitiveArena, PrimitiveClass, PrimitiveCollection, PrimitiveHandle,
    RenderError,
};

use crate::config::SyncConfig;

/// Position of a (sub)geometry inside its feature's geometry tree.
///
/// The root geometry has the empty path; child `i` of a composite at path
/// `p` lives at `p.child(i)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeometryPath(Vec<u32>);

impl GeometryPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: u32) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    /// Index of the top-level part this path belongs to (0 for the root).
    pub fn part_index(&self) -> usize {
        self.0.first().copied().unwrap_or(0) as usize
    }

    pub fn starts_with(&self, prefix: &GeometryPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl std::fmt::Display for GeometryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey {
    pub feature: FeatureId,
    pub path: GeometryPath,
    pub role: GeometryRole,
}

impl EntryKey {
    pub fn new(feature: FeatureId, path: GeometryPath, role: GeometryRole) -> Self {
        Self {
            feature,
            path,
            role,
        }
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} {:?}", self.feature, self.path, self.role)
    }
}

/// Bookkeeping for one primitive owned on behalf of a geometry role.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SceneEntry {
    pub handle: PrimitiveHandle,
    pub class: PrimitiveClass,
    pub kind: GeometryKind,
    pub altitude: AltitudeMode,
    /// Geometry revision the primitive was last built from.
    pub revision: Revision,
    /// Set when processed during the current pass; cleared by [`SceneContext::sweep`].
    pub live: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    /// The handle does not name a live primitive of the role's collection.
    DeadHandle { key: EntryKey },
    Render(RenderError),
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterError::DeadHandle { key } => {
                write!(f, "cannot register {key}: primitive handle is not live")
            }
            RegisterError::Render(e) => write!(f, "renderer rejected primitive: {e}"),
        }
    }
}

impl std::error::Error for RegisterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegisterError::Render(e) => Some(e),
            RegisterError::DeadHandle { .. } => None,
        }
    }
}

impl From<RenderError> for RegisterError {
    fn from(e: RenderError) -> Self {
        RegisterError::Render(e)
    }
}

/// Violations found by [`SceneContext::check_consistency`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// An entry references a primitive the renderer no longer holds.
    DanglingEntry(EntryKey),
    /// The entry's recorded class differs from the primitive's.
    ClassMismatch(EntryKey),
    /// A primitive in a role collection that no entry references.
    OrphanPrimitive {
        role: GeometryRole,
        handle: PrimitiveHandle,
    },
    /// The per-feature index and the entry table disagree.
    IndexMismatch(FeatureId),
}

impl std::fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyError::DanglingEntry(key) => {
                write!(f, "{key} references a disposed primitive")
            }
            ConsistencyError::ClassMismatch(key) => {
                write!(f, "{key} records the wrong primitive class")
            }
            ConsistencyError::OrphanPrimitive { role, handle } => {
                write!(f, "{role:?} primitive {handle:?} has no entry")
            }
            ConsistencyError::IndexMismatch(id) => {
                write!(f, "entry index out of sync for {id}")
            }
        }
    }
}

impl std::error::Error for ConsistencyError {}

/// Renderer-side state backing one vector layer.
///
/// Owns one primitive collection per [`GeometryRole`] and the entry table
/// that maps `(feature, path, role)` to the primitive built for it. Every
/// entry's primitive is live in its role collection; every removal goes
/// through the collection.
pub struct SceneContext {
    collections: Vec<Box<dyn PrimitiveCollection>>,
    entries: HashMap<EntryKey, SceneEntry>,
    by_feature: HashMap<FeatureId, BTreeSet<(GeometryPath, GeometryRole)>>,
}

impl std::fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneContext")
            .field("entries", &self.entries.len())
            .field("features", &self.by_feature.len())
            .finish()
    }
}

impl SceneContext {
    pub fn new(config: &SyncConfig) -> Self {
        let limit = config.max_primitives_per_role;
        Self::with_collections(|_| match limit {
            Some(max) => Box::new(PrimitiveArena::with_capacity_limit(max)),
            None => Box::new(PrimitiveArena::new()),
        })
    }

    /// Builds a context around caller-provided collections, one per role.
    pub fn with_collections(
        mut make: impl FnMut(GeometryRole) -> Box<dyn PrimitiveCollection>,
    ) -> Self {
        Self {
            collections: GeometryRole::ALL.iter().map(|role| make(*role)).collect(),
            entries: HashMap::new(),
            by_feature: HashMap::new(),
        }
    }

    pub fn collection(&self, role: GeometryRole) -> &dyn PrimitiveCollection {
        self.collections[role.index()].as_ref()
    }

    fn collection_mut(&mut self, role: GeometryRole) -> &mut dyn PrimitiveCollection {
        self.collections[role.index()].as_mut()
    }

    /// Inserts or replaces the entry for `key`.
    ///
    /// `entry.handle` must be live in the role's collection. A replaced entry
    /// with a different handle has its primitive disposed.
    pub fn register(&mut self, key: EntryKey, entry: SceneEntry) -> Result<(), RegisterError> {
        if !self.collection(key.role).contains(entry.handle) {
            return Err(RegisterError::DeadHandle { key });
        }
        let stale = self
            .entries
            .get(&key)
            .map(|old| old.handle)
            .filter(|handle| *handle != entry.handle);
        if let Some(stale) = stale {
            self.collection_mut(key.role).remove(stale);
        }
        self.by_feature
            .entry(key.feature)
            .or_default()
            .insert((key.path.clone(), key.role));
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Adds `primitive` to the role collection and registers it as live.
    pub fn insert(
        &mut self,
        key: EntryKey,
        primitive: Primitive,
        kind: GeometryKind,
        altitude: AltitudeMode,
        revision: Revision,
    ) -> Result<PrimitiveHandle, RegisterError> {
        let class = primitive.class;
        let handle = self.collection_mut(key.role).add(primitive)?;
        self.register(
            key,
            SceneEntry {
                handle,
                class,
                kind,
                altitude,
                revision,
                live: true,
            },
        )?;
        Ok(handle)
    }

    pub fn lookup(&self, key: &EntryKey) -> Option<&SceneEntry> {
        self.entries.get(key)
    }

    pub fn primitive(&self, key: &EntryKey) -> Option<&Primitive> {
        let entry = self.entries.get(key)?;
        self.collection(key.role).get(entry.handle)
    }

    pub fn mark_live(&mut self, key: &EntryKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.live = true;
                true
            }
            None => false,
        }
    }

    /// Marks every entry of `feature` live; returns how many there were.
    pub fn mark_feature_live(&mut self, feature: FeatureId) -> usize {
        let Some(slots) = self.by_feature.get(&feature) else {
            return 0;
        };
        let mut marked = 0;
        for (path, role) in slots {
            let key = EntryKey::new(feature, path.clone(), *role);
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.live = true;
                marked += 1;
            }
        }
        marked
    }

    /// Mutates the primitive behind `key` in place, records `revision` and
    /// `altitude`, and marks the entry live.
    pub fn patch(
        &mut self,
        key: &EntryKey,
        revision: Revision,
        altitude: AltitudeMode,
        mut f: impl FnMut(&mut Primitive),
    ) -> bool {
        let Some(handle) = self.entries.get(key).map(|e| e.handle) else {
            return false;
        };
        if !self.collection_mut(key.role).patch(handle, &mut f) {
            return false;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.revision = revision;
            entry.altitude = altitude;
            entry.live = true;
        }
        true
    }

    /// Disposes the primitive behind `key` and forgets the entry.
    pub fn remove(&mut self, key: &EntryKey) -> Option<SceneEntry> {
        let entry = self.entries.remove(key)?;
        self.collection_mut(key.role).remove(entry.handle);
        if let Some(slots) = self.by_feature.get_mut(&key.feature) {
            slots.remove(&(key.path.clone(), key.role));
            if slots.is_empty() {
                self.by_feature.remove(&key.feature);
            }
        }
        Some(entry)
    }

    fn remove_where(
        &mut self,
        feature: FeatureId,
        mut pred: impl FnMut(&GeometryPath) -> bool,
    ) -> usize {
        let keys: Vec<EntryKey> = match self.by_feature.get(&feature) {
            Some(slots) => slots
                .iter()
                .filter(|(path, _)| pred(path))
                .map(|(path, role)| EntryKey::new(feature, path.clone(), *role))
                .collect(),
            None => return 0,
        };
        keys.iter().filter(|key| self.remove(key).is_some()).count()
    }

    pub fn remove_feature(&mut self, feature: FeatureId) -> usize {
        self.remove_where(feature, |_| true)
    }

    /// Removes every entry at or below `path`.
    pub fn remove_subtree(&mut self, feature: FeatureId, path: &GeometryPath) -> usize {
        self.remove_where(feature, |p| p.starts_with(path))
    }

    /// Removes the subtrees of children `first..` of the composite at
    /// `parent`, e.g. after a collection shrank.
    pub fn remove_children_from(
        &mut self,
        feature: FeatureId,
        parent: &GeometryPath,
        first: u32,
    ) -> usize {
        let depth = parent.depth();
        self.remove_where(feature, |p| {
            p.starts_with(parent) && p.indices().get(depth).is_some_and(|i| *i >= first)
        })
    }

    /// Entries at or below `path`, in key order.
    pub fn entries_under(
        &self,
        feature: FeatureId,
        path: &GeometryPath,
    ) -> Vec<(EntryKey, SceneEntry)> {
        let Some(slots) = self.by_feature.get(&feature) else {
            return Vec::new();
        };
        slots
            .iter()
            .filter(|(p, _)| p.starts_with(path))
            .filter_map(|(p, role)| {
                let key = EntryKey::new(feature, p.clone(), *role);
                let entry = *self.entries.get(&key)?;
                Some((key, entry))
            })
            .collect()
    }

    /// Entries registered exactly at `path`.
    pub fn entries_at(
        &self,
        feature: FeatureId,
        path: &GeometryPath,
    ) -> Vec<(EntryKey, SceneEntry)> {
        self.entries_under(feature, path)
            .into_iter()
            .filter(|(key, _)| key.path == *path)
            .collect()
    }

    pub fn feature_entry_count(&self, feature: FeatureId) -> usize {
        self.by_feature.get(&feature).map_or(0, BTreeSet::len)
    }

    /// Features with at least one entry, sorted.
    pub fn feature_ids(&self) -> Vec<FeatureId> {
        let mut ids: Vec<FeatureId> = self.by_feature.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes entries not marked live since the last sweep, then clears
    /// every liveness flag. Returns the number of entries removed.
    pub fn sweep(&mut self) -> usize {
        let mut stale: Vec<EntryKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.live)
            .map(|(key, _)| key.clone())
            .collect();
        stale.sort();
        for key in &stale {
            self.remove(key);
        }
        for entry in self.entries.values_mut() {
            entry.live = false;
        }
        stale.len()
    }

    /// Verifies that entries and role collections reference each other
    /// one-to-one.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        let mut keys: Vec<&EntryKey> = self.entries.keys().collect();
        keys.sort();
        for key in keys {
            let entry = &self.entries[key];
            let Some(primitive) = self.collection(key.role).get(entry.handle) else {
                return Err(ConsistencyError::DanglingEntry(key.clone()));
            };
            if primitive.class != entry.class {
                return Err(ConsistencyError::ClassMismatch(key.clone()));
            }
            let indexed = self
                .by_feature
                .get(&key.feature)
                .is_some_and(|slots| slots.contains(&(key.path.clone(), key.role)));
            if !indexed {
                return Err(ConsistencyError::IndexMismatch(key.feature));
            }
        }

        let indexed: usize = self.by_feature.values().map(BTreeSet::len).sum();
        if indexed != self.entries.len() {
            let mut ids = self.feature_ids();
            ids.retain(|id| {
                self.by_feature[id].iter().any(|(path, role)| {
                    !self
                        .entries
                        .contains_key(&EntryKey::new(*id, path.clone(), *role))
                })
            });
            if let Some(id) = ids.first() {
                return Err(ConsistencyError::IndexMismatch(*id));
            }
        }

        for role in GeometryRole::ALL {
            let collection = self.collection(role);
            let owned = self.entries.iter().filter(|(k, _)| k.role == role).count();
            if collection.len() != owned {
                let referenced: BTreeSet<PrimitiveHandle> = self
                    .entries
                    .iter()
                    .filter(|(k, _)| k.role == role)
                    .map(|(_, e)| e.handle)
                    .collect();
                if let Some(handle) = collection
                    .handles()
                    .into_iter()
                    .find(|h| !referenced.contains(h))
                {
                    return Err(ConsistencyError::OrphanPrimitive { role, handle });
                }
            }
        }
        Ok(())
    }
}
