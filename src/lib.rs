//! vrscene application layer
//!
//! Configuration, demo scene construction and per-frame systems on top of
//! the `vrscene_core` scene graph and `vrscene_physics` handles.

pub mod config;
pub mod scene;
pub mod systems;
