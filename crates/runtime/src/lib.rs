pub mod budget;
pub mod event_bus;
pub mod frame;
pub mod metrics;

pub use budget::*;
pub use event_bus::*;
pub use frame::*;
pub use metrics::*;
