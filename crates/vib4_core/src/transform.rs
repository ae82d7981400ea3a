//! Local transform state (position, rotation, scale)
//!
//! A `Transform4` is the authored state of a scene node. The matrices the
//! engine caches are derived from it: `to_affine` composes
//! translation * rotation * scale.

use vib4_math::{mat4, Affine4, Rotor4, Vec4};
use serde::{Serialize, Deserialize};

/// Position, rotation, and per-axis scale in 4D space
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform4 {
    /// Position in 4D space
    pub position: Vec4,
    /// Rotation as a 4D rotor
    pub rotation: Rotor4,
    /// Per-axis scale factors
    pub scale: Vec4,
}

impl Default for Transform4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform4 {
    /// Identity transform (no translation, rotation, or scaling)
    pub fn identity() -> Self {
        Self {
            position: Vec4::ZERO,
            rotation: Rotor4::IDENTITY,
            scale: Vec4::ONE,
        }
    }

    /// Transform with just a position
    pub fn from_position(position: Vec4) -> Self {
        Self {
            position,
            rotation: Rotor4::IDENTITY,
            scale: Vec4::ONE,
        }
    }

    /// Transform with position and rotation
    pub fn from_position_rotation(position: Vec4, rotation: Rotor4) -> Self {
        Self {
            position,
            rotation,
            scale: Vec4::ONE,
        }
    }

    /// Set a uniform scale, builder style
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec4::splat(scale);
        self
    }

    /// Build the affine matrix: translation * rotation * scale
    pub fn to_affine(&self) -> Affine4 {
        Affine4::new(
            mat4::mul(self.rotation.to_matrix(), mat4::from_scale(self.scale)),
            self.position,
        )
    }

    /// Transform a point from local space to parent space.
    ///
    /// Applies scale, then rotation, then translation.
    pub fn transform_point(&self, p: Vec4) -> Vec4 {
        self.to_affine().transform_point(p)
    }
}
