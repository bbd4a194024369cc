//! Scene graph error types

use thiserror::Error;

/// Errors raised by structural scene-graph operations
///
/// Component attach/detach failures are not errors; those calls return `bool`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Attaching `child` under `parent` would make a node its own ancestor
    #[error("cycle of scene objects is not allowed: '{child}' is an ancestor of '{parent}'")]
    CycleDetected { parent: String, child: String },

    /// Child index past the end of the child list
    #[error("child index {index} out of range (children: {len})")]
    OutOfRange { index: usize, len: usize },

    /// The node is already owned by another parent
    #[error("scene object '{0}' already has a parent")]
    AlreadyHasParent(String),

    /// The node is not a direct child of the receiver
    #[error("scene object '{child}' is not a child of '{parent}'")]
    NotAChild { parent: String, child: String },
}
