use foundation::handles::Handle;

use crate::primitive::Primitive;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveHandle(pub Handle);

/// Native primitive construction failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    EmptyBuffer,
    NonFinitePosition { index: usize },
    IndexOutOfRange { index: u32, vertices: usize },
    ShapeClassMismatch,
    CapacityExceeded { max: usize },
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::EmptyBuffer => write!(f, "primitive has no vertices"),
            RenderError::NonFinitePosition { index } => {
                write!(f, "vertex {index} is not finite")
            }
            RenderError::IndexOutOfRange { index, vertices } => {
                write!(f, "mesh index {index} out of range for {vertices} vertices")
            }
            RenderError::ShapeClassMismatch => {
                write!(f, "vertex layout does not match primitive class")
            }
            RenderError::CapacityExceeded { max } => {
                write!(f, "collection is full (max {max} primitives)")
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Running totals of collection mutations.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub added: u64,
    pub removed: u64,
    pub patched: u64,
}

impl CollectionStats {
    /// Every operation that touched renderer memory.
    pub fn mutations(&self) -> u64 {
        self.added + self.removed + self.patched
    }
}

/// The renderer's native collection that the 3D scene iterates for drawing.
pub trait PrimitiveCollection {
    fn add(&mut self, primitive: Primitive) -> Result<PrimitiveHandle, RenderError>;

    /// Disposes a primitive. Returns it if the handle was alive.
    fn remove(&mut self, handle: PrimitiveHandle) -> Option<Primitive>;

    fn get(&self, handle: PrimitiveHandle) -> Option<&Primitive>;

    /// Mutates a live primitive in place. Returns `false` for stale handles.
    fn patch(&mut self, handle: PrimitiveHandle, f: &mut dyn FnMut(&mut Primitive)) -> bool;

    fn len(&self) -> usize;

    fn handles(&self) -> Vec<PrimitiveHandle>;

    fn stats(&self) -> CollectionStats;

    fn contains(&self, handle: PrimitiveHandle) -> bool {
        self.get(handle).is_some()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Slot {
    handle: PrimitiveHandle,
    primitive: Option<Primitive>,
}

/// Slot arena with generational handles and an optional capacity limit.
///
/// Freed slots are reused; their generation is bumped so stale handles are
/// rejected.
#[derive(Debug, Default)]
pub struct PrimitiveArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    max_primitives: Option<usize>,
    stats: CollectionStats,
}

impl PrimitiveArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(max_primitives: usize) -> Self {
        Self {
            max_primitives: Some(max_primitives),
            ..Self::default()
        }
    }

    fn validate(&self, primitive: &Primitive) -> Result<(), RenderError> {
        if let Some(max) = self.max_primitives
            && self.len >= max
        {
            return Err(RenderError::CapacityExceeded { max });
        }
        if !primitive.shape_matches_class() {
            return Err(RenderError::ShapeClassMismatch);
        }
        let positions = primitive.shape.positions();
        if positions.is_empty() {
            return Err(RenderError::EmptyBuffer);
        }
        if let Some(index) = positions.iter().position(|p| !p.is_finite()) {
            return Err(RenderError::NonFinitePosition { index });
        }
        if let crate::PrimitiveShape::Mesh { indices, .. } = &primitive.shape
            && let Some(bad) = indices.iter().find(|i| **i as usize >= positions.len())
        {
            return Err(RenderError::IndexOutOfRange {
                index: *bad,
                vertices: positions.len(),
            });
        }
        Ok(())
    }

    fn slot(&self, handle: PrimitiveHandle) -> Option<&Slot> {
        self.slots
            .get(handle.0.index() as usize)
            .filter(|s| s.handle == handle)
    }
}

impl PrimitiveCollection for PrimitiveArena {
    fn add(&mut self, primitive: Primitive) -> Result<PrimitiveHandle, RenderError> {
        self.validate(&primitive)?;

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.handle = PrimitiveHandle(slot.handle.0.next_generation());
                slot.primitive = Some(primitive);
                slot.handle
            }
            None => {
                let handle = PrimitiveHandle(Handle::new(self.slots.len() as u32, 0));
                self.slots.push(Slot {
                    handle,
                    primitive: Some(primitive),
                });
                handle
            }
        };
        self.len += 1;
        self.stats.added += 1;
        Ok(handle)
    }

    fn remove(&mut self, handle: PrimitiveHandle) -> Option<Primitive> {
        let index = handle.0.index();
        let slot = self
            .slots
            .get_mut(index as usize)
            .filter(|s| s.handle == handle)?;
        let primitive = slot.primitive.take()?;
        self.free.push(index);
        self.len -= 1;
        self.stats.removed += 1;
        Some(primitive)
    }

    fn get(&self, handle: PrimitiveHandle) -> Option<&Primitive> {
        self.slot(handle)?.primitive.as_ref()
    }

    fn patch(&mut self, handle: PrimitiveHandle, f: &mut dyn FnMut(&mut Primitive)) -> bool {
        let Some(primitive) = self
            .slots
            .get_mut(handle.0.index() as usize)
            .filter(|s| s.handle == handle)
            .and_then(|s| s.primitive.as_mut())
        else {
            return false;
        };
        f(primitive);
        self.stats.patched += 1;
        true
    }

    fn len(&self) -> usize {
        self.len
    }

    fn handles(&self) -> Vec<PrimitiveHandle> {
        self.slots
            .iter()
            .filter(|s| s.primitive.is_some())
            .map(|s| s.handle)
            .collect()
    }

    fn stats(&self) -> CollectionStats {
        self.stats
    }
}
