/// Generational handle: `(index, generation)`.
///
/// A slot may be reused after its occupant is released; the generation is
/// bumped on every reuse so stale handles never alias a newer occupant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32, u32);

impl Handle {
    pub fn new(index: u32, generation: u32) -> Self {
        Handle(index, generation)
    }

    pub fn index(&self) -> u32 {
        self.0
    }

    pub fn generation(&self) -> u32 {
        self.1
    }

    /// Handle for the same slot, one generation later.
    pub fn next_generation(self) -> Self {
        Handle(self.0, self.1.wrapping_add(1))
    }
}
