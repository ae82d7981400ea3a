//! Affine 4D transform: linear block + translation column
//!
//! A 4x4 matrix can express any 4D rotation/scale but has nowhere to put a
//! 4D translation (that would need a 5x5 homogeneous matrix). `Affine4`
//! carries the translation explicitly and composes the way homogeneous
//! matrices do, so the scene graph can cache `world = parent_world * local`
//! directly.

use serde::{Serialize, Deserialize};
use crate::{mat4, Mat4, Vec4};

/// A linear 4x4 block plus translation, composing like a homogeneous matrix
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affine4 {
    /// Rotation/scale block (column-major)
    pub linear: Mat4,
    /// Translation applied after the linear block
    pub translation: Vec4,
}

impl Default for Affine4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine4 {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        linear: mat4::IDENTITY,
        translation: Vec4::ZERO,
    };

    /// Build from a linear block and a translation
    pub fn new(linear: Mat4, translation: Vec4) -> Self {
        Self { linear, translation }
    }

    /// Pure translation
    pub fn from_translation(translation: Vec4) -> Self {
        Self { linear: mat4::IDENTITY, translation }
    }

    /// Transform a point: `linear * p + translation`
    #[inline]
    pub fn transform_point(&self, p: Vec4) -> Vec4 {
        mat4::transform(self.linear, p) + self.translation
    }

    /// Transform a direction (translation does not apply)
    #[inline]
    pub fn transform_direction(&self, d: Vec4) -> Vec4 {
        mat4::transform(self.linear, d)
    }

    /// Compose: `self * other` applies `other` first, then `self`.
    ///
    /// `(a * b).transform_point(p) == a.transform_point(b.transform_point(p))`
    pub fn mul(&self, other: &Self) -> Self {
        Self {
            linear: mat4::mul(self.linear, other.linear),
            translation: mat4::transform(self.linear, other.translation) + self.translation,
        }
    }

    /// Invert the transform; `None` if the linear block is singular
    pub fn inverse(&self) -> Option<Self> {
        let inv_linear = mat4::inverse(self.linear)?;
        Some(Self {
            linear: inv_linear,
            translation: -mat4::transform(inv_linear, self.translation),
        })
    }
}
