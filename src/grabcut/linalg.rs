//! Small fixed-size linear algebra for 3-channel color statistics.

/// A color sample as three `f64` channels.
pub type Color = [f64; 3];

/// Squared Euclidean distance between two colors.
#[inline]
pub fn squared_distance(a: &Color, b: &Color) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d2.mul_add(d2, d1.mul_add(d1, d0 * d0))
}

#[inline]
pub fn difference(a: &Color, b: &Color) -> Color {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Row-major 3x3 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Matrix3(pub [[f64; 3]; 3]);

impl Matrix3 {
    pub const ZERO: Self = Self([[0.0; 3]; 3]);

    pub const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Outer product `v vᵀ`.
    #[inline]
    pub fn outer(v: &Color) -> Self {
        let mut m = [[0.0; 3]; 3];
        for (row, &vi) in m.iter_mut().zip(v.iter()) {
            for (cell, &vj) in row.iter_mut().zip(v.iter()) {
                *cell = vi * vj;
            }
        }
        Self(m)
    }

    #[inline]
    pub fn add(&self, other: &Self) -> Self {
        let mut m = self.0;
        for (row, other_row) in m.iter_mut().zip(other.0.iter()) {
            for (cell, &o) in row.iter_mut().zip(other_row.iter()) {
                *cell += o;
            }
        }
        Self(m)
    }

    #[inline]
    pub fn scale(&self, factor: f64) -> Self {
        let mut m = self.0;
        m.iter_mut().flatten().for_each(|cell| *cell *= factor);
        Self(m)
    }

    /// Returns `self + value * I`.
    #[inline]
    pub fn add_diagonal(&self, value: f64) -> Self {
        let mut m = self.0;
        for (i, row) in m.iter_mut().enumerate() {
            row[i] += value;
        }
        Self(m)
    }

    pub fn determinant(&self) -> f64 {
        let [[a, b, c], [d, e, f], [g, h, i]] = self.0;
        c.mul_add(
            d.mul_add(h, -(e * g)),
            a.mul_add(e.mul_add(i, -(f * h)), -(b * d.mul_add(i, -(f * g)))),
        )
    }

    /// Inverse by the cofactor method, `None` when the determinant is zero or not finite.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let [[a, b, c], [d, e, f], [g, h, i]] = self.0;

        Some(Self([
            [
                e.mul_add(i, -(f * h)) * inv_det,
                c.mul_add(h, -(b * i)) * inv_det,
                b.mul_add(f, -(c * e)) * inv_det,
            ],
            [
                f.mul_add(g, -(d * i)) * inv_det,
                a.mul_add(i, -(c * g)) * inv_det,
                c.mul_add(d, -(a * f)) * inv_det,
            ],
            [
                d.mul_add(h, -(e * g)) * inv_det,
                b.mul_add(g, -(a * h)) * inv_det,
                a.mul_add(e, -(b * d)) * inv_det,
            ],
        ]))
    }

    /// Quadratic form `vᵀ M v`.
    #[inline]
    pub fn quadratic_form(&self, v: &Color) -> f64 {
        self.0
            .iter()
            .zip(v.iter())
            .map(|(row, &vi)| vi * row[2].mul_add(v[2], row[1].mul_add(v[1], row[0] * v[0])))
            .sum()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().flatten().all(|v| v.is_finite())
    }
}
