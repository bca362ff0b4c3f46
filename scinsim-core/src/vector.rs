//! Cartesian three-vectors for positions, momenta and polarizations.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A three-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreeVector {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl ThreeVector {
    /// The null vector.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared magnitude.
    #[inline]
    #[must_use]
    pub fn mag2(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Weighted mean of `self` (weight `w_self`) and `other` (weight `w_other`).
    ///
    /// The combined weight must be positive.
    #[inline]
    #[must_use]
    pub fn weighted_mean(&self, w_self: f64, other: &Self, w_other: f64) -> Self {
        let total = w_self + w_other;
        Self {
            x: (self.x * w_self + other.x * w_other) / total,
            y: (self.y * w_self + other.y * w_other) / total,
            z: (self.z * w_self + other.z * w_other) / total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_magnitude() {
        let v = ThreeVector::new(3.0, 4.0, 12.0);
        assert_relative_eq!(v.mag2(), 169.0);
        assert_relative_eq!(ThreeVector::ZERO.mag2(), 0.0);
    }

    #[test]
    fn test_weighted_mean() {
        let a = ThreeVector::new(0.0, 10.0, -4.0);
        let b = ThreeVector::new(3.0, 10.0, 8.0);
        let m = a.weighted_mean(1.0, &b, 2.0);
        assert_relative_eq!(m.x, 2.0);
        assert_relative_eq!(m.y, 10.0);
        assert_relative_eq!(m.z, 4.0);
    }
}
