//! Live 2D vector feature model observed by the synchronization engine.
//!
//! The engine only ever reads from this crate. Mutations happen through
//! [`FeatureStore`], which records the change feed the engine consumes.

pub mod feature;
pub mod geometry;
pub mod properties;
pub mod store;
pub mod style;

pub use feature::*;
pub use geometry::*;
pub use properties::*;
pub use store::*;
pub use style::*;
