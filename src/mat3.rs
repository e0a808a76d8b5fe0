//! Minimal 3×3 affine matrix, column-major in the gl-matrix layout.
//!
//! ```text
//! | m[0] m[3] m[6] |
//! | m[1] m[4] m[7] |
//! | m[2] m[5] m[8] |
//! ```
//!
//! `m[0]`/`m[4]` hold the scale factors and `m[6]`/`m[7]` the translation.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3(pub [f64; 9]);

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat3 {
    pub const fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
    }

    #[allow(clippy::too_many_arguments)]
    pub const fn from_values(
        m00: f64,
        m01: f64,
        m02: f64,
        m10: f64,
        m11: f64,
        m12: f64,
        m20: f64,
        m21: f64,
        m22: f64,
    ) -> Self {
        Self([m00, m01, m02, m10, m11, m12, m20, m21, m22])
    }

    pub const fn from_translation(tx: f64, ty: f64) -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, tx, ty, 1.0])
    }

    pub const fn from_scaling(sx: f64, sy: f64) -> Self {
        Self([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    #[inline]
    pub fn scale_x(&self) -> f64 {
        self.0[0]
    }

    #[inline]
    pub fn scale_y(&self) -> f64 {
        self.0[4]
    }

    #[inline]
    pub fn translate_x(&self) -> f64 {
        self.0[6]
    }

    #[inline]
    pub fn translate_y(&self) -> f64 {
        self.0[7]
    }

    /// `self * rhs`: applying the result equals applying `rhs` first, then `self`.
    pub fn multiply(&self, rhs: &Mat3) -> Mat3 {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0; 9];
        for col in 0..3 {
            for row in 0..3 {
                out[col * 3 + row] = a[row] * b[col * 3]
                    + a[3 + row] * b[col * 3 + 1]
                    + a[6 + row] * b[col * 3 + 2];
            }
        }
        Mat3(out)
    }

    /// `None` for singular matrices.
    pub fn invert(&self) -> Option<Mat3> {
        let a = &self.0;
        let b01 = a[8] * a[4] - a[5] * a[7];
        let b11 = -a[8] * a[3] + a[5] * a[6];
        let b21 = a[7] * a[3] - a[4] * a[6];

        let det = a[0] * b01 + a[1] * b11 + a[2] * b21;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let det = 1.0 / det;

        Some(Mat3([
            b01 * det,
            (-a[8] * a[1] + a[2] * a[7]) * det,
            (a[5] * a[1] - a[2] * a[4]) * det,
            b11 * det,
            (a[8] * a[0] - a[2] * a[6]) * det,
            (-a[5] * a[0] + a[2] * a[3]) * det,
            b21 * det,
            (-a[7] * a[0] + a[1] * a[6]) * det,
            (a[4] * a[0] - a[1] * a[3]) * det,
        ]))
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.0;
        (m[0] * x + m[3] * y + m[6], m[1] * x + m[4] * y + m[7])
    }

    /// CSS `matrix(a, b, c, d, e, f)` for hosts that style DOM elements.
    pub fn css_matrix(&self) -> String {
        let m = &self.0;
        format!(
            "matrix({},{},{},{},{},{})",
            m[0], m[1], m[3], m[4], m[6], m[7]
        )
    }
}

impl std::ops::Mul for Mat3 {
    type Output = Mat3;

    fn mul(self, rhs: Mat3) -> Mat3 {
        self.multiply(&rhs)
    }
}
