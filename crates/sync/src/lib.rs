//! Keeps a 3D scene's primitive collections in step with a live 2D vector
//! feature model.
//!
//! [`Synchronizer`] is the entry point: it consumes change notifications,
//! resolves style and altitude, dispatches each geometry through the
//! [`ConverterRegistry`] and sweeps primitives whose features went away.

pub mod altitude;
pub mod config;
pub mod converters;
pub mod dynamic;
pub mod scene_context;
pub mod style;
pub mod synchronizer;

pub use altitude::*;
pub use config::*;
pub use converters::{ConvertContext, ConverterRegistry, GeometryConverter, Slot, convert};
pub use dynamic::*;
pub use scene_context::*;
pub use style::*;
pub use synchronizer::*;

/// Metric names recorded into [`runtime::Metrics`].
pub mod counters {
    /// Primitives added for a geometry seen for the first time.
    pub const CREATED: &str = "sync.created";
    /// Leaf geometries whose primitives were patched in place.
    pub const UPDATED: &str = "sync.updated";
    /// Leaf geometries processed without touching the renderer.
    pub const SKIPPED: &str = "sync.skipped";
    /// Leaf geometries destroyed and rebuilt after a kind or class change.
    pub const RECREATED: &str = "sync.recreated";
    /// Features that could not be rendered this pass.
    pub const FAILED: &str = "sync.failed";
    /// Primitives removed for deleted or empty features.
    pub const DELETED: &str = "sync.deleted";
    /// Entries purged by the end-of-pass sweep.
    pub const SWEPT: &str = "sync.swept";
    /// Gauge: entries in the scene context after the last completed pass.
    pub const ENTRIES: &str = "sync.entries";
}
