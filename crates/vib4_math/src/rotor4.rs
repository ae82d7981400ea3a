//! Rotations in 4D space
//!
//! 4D rotations act in planes rather than around axes; there are six of them
//! (XY, XZ, XW, YZ, YW, ZW). A rotor packs 1 scalar + 6 bivector components
//! + 1 pseudoscalar and rotates vectors through the sandwich product
//! `v' = R v R†`.

use bytemuck::{Pod, Zeroable};
use serde::{Serialize, Deserialize};
use crate::Vec4;

/// The six rotation planes of 4D space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationPlane {
    /// XY plane (yaw in 3D terms)
    XY,
    /// XZ plane (pitch in 3D terms)
    XZ,
    /// YZ plane (roll in 3D terms)
    YZ,
    /// XW plane - ana/kata rotation through X
    XW,
    /// YW plane - ana/kata rotation through Y
    YW,
    /// ZW plane - ana/kata rotation through Z
    ZW,
}

/// A 4D rotor: `R = s + b_xy e12 + b_xz e13 + b_xw e14 + b_yz e23 + b_yw e24 + b_zw e34 + p e1234`
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Rotor4 {
    /// Scalar component
    pub s: f32,
    /// XY bivector (e12)
    pub b_xy: f32,
    /// XZ bivector (e13)
    pub b_xz: f32,
    /// XW bivector (e14)
    pub b_xw: f32,
    /// YZ bivector (e23)
    pub b_yz: f32,
    /// YW bivector (e24)
    pub b_yw: f32,
    /// ZW bivector (e34)
    pub b_zw: f32,
    /// Pseudoscalar component (e1234)
    pub p: f32,
}

impl Default for Rotor4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotor4 {
    /// Identity rotor (no rotation)
    pub const IDENTITY: Self = Self {
        s: 1.0,
        b_xy: 0.0,
        b_xz: 0.0,
        b_xw: 0.0,
        b_yz: 0.0,
        b_yw: 0.0,
        b_zw: 0.0,
        p: 0.0,
    };

    /// Rotor for a rotation by `angle` radians in a single plane.
    ///
    /// `R = cos(angle/2) - sin(angle/2) * B` where B is the plane's unit bivector.
    pub fn from_plane_angle(plane: RotationPlane, angle: f32) -> Self {
        let half = angle * 0.5;
        let cos_h = half.cos();
        let sin_h = half.sin();

        let mut r = Self::IDENTITY;
        r.s = cos_h;

        match plane {
            RotationPlane::XY => r.b_xy = -sin_h,
            RotationPlane::XZ => r.b_xz = -sin_h,
            RotationPlane::XW => r.b_xw = -sin_h,
            RotationPlane::YZ => r.b_yz = -sin_h,
            RotationPlane::YW => r.b_yw = -sin_h,
            RotationPlane::ZW => r.b_zw = -sin_h,
        }

        r
    }

    /// Squared magnitude over all 8 components
    #[inline]
    pub fn magnitude_squared(&self) -> f32 {
        self.s * self.s
            + self.b_xy * self.b_xy
            + self.b_xz * self.b_xz
            + self.b_xw * self.b_xw
            + self.b_yz * self.b_yz
            + self.b_yw * self.b_yw
            + self.b_zw * self.b_zw
            + self.p * self.p
    }

    /// Magnitude
    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    /// Normalize to unit magnitude; a degenerate rotor normalizes to identity
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            let inv = 1.0 / mag;
            Self {
                s: self.s * inv,
                b_xy: self.b_xy * inv,
                b_xz: self.b_xz * inv,
                b_xw: self.b_xw * inv,
                b_yz: self.b_yz * inv,
                b_yw: self.b_yw * inv,
                b_zw: self.b_zw * inv,
                p: self.p * inv,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// Reverse (conjugate): negates the bivector components.
    /// For a unit rotor this is the inverse rotation.
    pub fn reverse(&self) -> Self {
        Self {
            s: self.s,
            b_xy: -self.b_xy,
            b_xz: -self.b_xz,
            b_xw: -self.b_xw,
            b_yz: -self.b_yz,
            b_yw: -self.b_yw,
            b_zw: -self.b_zw,
            p: self.p,
        }
    }

    /// Rotate a vector: `v' = R v R†`, expanded to avoid intermediate multivectors.
    pub fn rotate(&self, v: Vec4) -> Vec4 {
        let s = self.s;
        let b12 = self.b_xy;
        let b13 = self.b_xz;
        let b14 = self.b_xw;
        let b23 = self.b_yz;
        let b24 = self.b_yw;
        let b34 = self.b_zw;
        let ps = self.p;

        let x = v.x;
        let y = v.y;
        let z = v.z;
        let w = v.w;

        let s2 = s * s;
        let b12_2 = b12 * b12;
        let b13_2 = b13 * b13;
        let b14_2 = b14 * b14;
        let b23_2 = b23 * b23;
        let b24_2 = b24 * b24;
        let b34_2 = b34 * b34;
        let ps2 = ps * ps;

        let new_x = x * (s2 - b12_2 - b13_2 - b14_2 + b23_2 + b24_2 + b34_2 - ps2)
            + 2.0 * y * (s * b12 + b13 * b23 + b14 * b24 + b34 * ps)
            + 2.0 * z * (s * b13 - b12 * b23 + b14 * b34 - b24 * ps)
            + 2.0 * w * (s * b14 - b12 * b24 - b13 * b34 + b23 * ps);

        let new_y = 2.0 * x * (-s * b12 + b13 * b23 + b14 * b24 - b34 * ps)
            + y * (s2 - b12_2 + b13_2 + b14_2 - b23_2 - b24_2 + b34_2 - ps2)
            + 2.0 * z * (s * b23 + b12 * b13 - b24 * b34 + b14 * ps)
            + 2.0 * w * (s * b24 + b12 * b14 + b23 * b34 - b13 * ps);

        let new_z = 2.0 * x * (-s * b13 - b12 * b23 + b14 * b34 + b24 * ps)
            + 2.0 * y * (-s * b23 + b12 * b13 - b24 * b34 - b14 * ps)
            + z * (s2 + b12_2 - b13_2 + b14_2 - b23_2 + b24_2 - b34_2 - ps2)
            + 2.0 * w * (s * b34 + b13 * b14 + b23 * b24 + b12 * ps);

        let new_w = 2.0 * x * (-s * b14 - b12 * b24 - b13 * b34 - b23 * ps)
            + 2.0 * y * (-s * b24 + b12 * b14 + b23 * b34 + b13 * ps)
            + 2.0 * z * (-s * b34 + b13 * b14 + b23 * b24 - b12 * ps)
            + w * (s2 + b12_2 + b13_2 - b14_2 + b23_2 - b24_2 - b34_2 - ps2);

        Vec4::new(new_x, new_y, new_z, new_w)
    }

    /// Compose two rotations: `self * other` applies `other` first, then `self`.
    /// This is the geometric product of the two rotors.
    pub fn compose(&self, other: &Self) -> Self {
        let a = self;
        let b = other;

        let s = a.s * b.s
            - a.b_xy * b.b_xy
            - a.b_xz * b.b_xz
            - a.b_xw * b.b_xw
            - a.b_yz * b.b_yz
            - a.b_yw * b.b_yw
            - a.b_zw * b.b_zw
            + a.p * b.p;

        let b_xy = a.s * b.b_xy + a.b_xy * b.s
            - a.b_xz * b.b_yz + a.b_yz * b.b_xz
            - a.b_xw * b.b_yw + a.b_yw * b.b_xw
            - a.b_zw * b.p - a.p * b.b_zw;

        let b_xz = a.s * b.b_xz + a.b_xz * b.s
            + a.b_xy * b.b_yz - a.b_yz * b.b_xy
            - a.b_xw * b.b_zw + a.b_zw * b.b_xw
            + a.b_yw * b.p + a.p * b.b_yw;

        let b_xw = a.s * b.b_xw + a.b_xw * b.s
            + a.b_xy * b.b_yw - a.b_yw * b.b_xy
            + a.b_xz * b.b_zw - a.b_zw * b.b_xz
            - a.b_yz * b.p - a.p * b.b_yz;

        let b_yz = a.s * b.b_yz + a.b_yz * b.s
            - a.b_xy * b.b_xz + a.b_xz * b.b_xy
            - a.b_yw * b.b_zw + a.b_zw * b.b_yw
            - a.b_xw * b.p - a.p * b.b_xw;

        let b_yw = a.s * b.b_yw + a.b_yw * b.s
            - a.b_xy * b.b_xw + a.b_xw * b.b_xy
            + a.b_yz * b.b_zw - a.b_zw * b.b_yz
            + a.b_xz * b.p + a.p * b.b_xz;

        let b_zw = a.s * b.b_zw + a.b_zw * b.s
            - a.b_xz * b.b_xw + a.b_xw * b.b_xz
            - a.b_yz * b.b_yw + a.b_yw * b.b_yz
            - a.b_xy * b.p - a.p * b.b_xy;

        let p = a.s * b.p + a.p * b.s
            + a.b_xy * b.b_zw + a.b_zw * b.b_xy
            - a.b_xz * b.b_yw - a.b_yw * b.b_xz
            + a.b_xw * b.b_yz + a.b_yz * b.b_xw;

        Self { s, b_xy, b_xz, b_xw, b_yz, b_yw, b_zw, p }
    }

    /// Convert to a column-major 4x4 rotation matrix by rotating each basis vector
    pub fn to_matrix(&self) -> [[f32; 4]; 4] {
        let x_col = self.rotate(Vec4::X);
        let y_col = self.rotate(Vec4::Y);
        let z_col = self.rotate(Vec4::Z);
        let w_col = self.rotate(Vec4::W);

        [
            [x_col.x, x_col.y, x_col.z, x_col.w],
            [y_col.x, y_col.y, y_col.z, y_col.w],
            [z_col.x, z_col.y, z_col.z, z_col.w],
            [w_col.x, w_col.y, w_col.z, w_col.w],
        ]
    }
}
