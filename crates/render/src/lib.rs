//! Renderer-side primitives and the collections the 3D scene draws from.
//!
//! The synchronization engine only adds, patches and removes primitives
//! through [`PrimitiveCollection`]; it never replaces a collection wholesale.

pub mod collection;
pub mod primitive;

pub use collection::*;
pub use primitive::*;
