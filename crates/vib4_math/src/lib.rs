//! 4D math primitives for the vib4 engine
//!
//! This crate provides the types the engine core composes transforms with:
//!
//! - [`Vec4`] - 4-component vector (x, y, z, w; w is the ana/kata axis)
//! - [`Rotor4`] - rotation in 4D space, expressed over the six rotation planes
//! - [`mat4`] - column-major 4x4 matrix helpers
//! - [`Affine4`] - a 4x4 linear block plus a translation column
//!
//! A plain 4x4 matrix cannot carry a 4D translation, so [`Affine4`] is the
//! type the scene graph caches: it composes as `world = parent_world * local`
//! with the translation handled explicitly.

mod vec4;
mod rotor4;
pub mod mat4;
mod affine4;

pub use vec4::Vec4;
pub use rotor4::{Rotor4, RotationPlane};
pub use mat4::Mat4;
pub use affine4::Affine4;
