//! Application systems
//!
//! Per-frame systems driven by the demo loop.

mod culling;

pub use culling::{CullingSystem, FrameReport};
