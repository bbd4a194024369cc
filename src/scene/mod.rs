//! Scene construction utilities
//!
//! This module provides a fluent API for building demo scenes.

mod scene_builder;

pub use scene_builder::{BuiltScene, SceneBuilder};
