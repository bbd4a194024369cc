//! 3D Mathematics Library
//!
//! Small, dependency-light math types for the vrscene scene graph.
//!
//! ## Core Types
//!
//! - [`Vec3`] - 3D vector with x, y, z components
//! - [`Quat`] - unit quaternion rotation
//! - [`Mat4`] - column-major 4x4 matrix with free-function helpers in [`mat4`]

mod vec3;
mod quat;
pub mod mat4;

pub use vec3::Vec3;
pub use quat::Quat;
pub use mat4::Mat4;
