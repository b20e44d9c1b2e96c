//! Cartesian and spherical position vectors.
//!
//! World frame: right-handed Cartesian, meters. Spherical coordinates are
//! `(length, azimuth, elevation)` with azimuth measured from +x toward +y and
//! elevation measured from the xy-plane toward +z.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

pub const EPSILON: f64 = 1e-9;

/// Wrap `a` into `[0, 2*PI)`.
pub fn normalize_angle_2pi(a: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let wrapped = a % two_pi;
    if wrapped < 0.0 {
        wrapped + two_pi
    } else {
        wrapped
    }
}

/// Wrap `a` into `[-PI, PI)`.
pub fn normalize_angle_pi(a: f64) -> f64 {
    let wrapped = normalize_angle_2pi(a + PI) - PI;
    wrapped
}

/// Cartesian position or displacement, meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct V3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl V3 {
    pub const ZERO: V3 = V3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn dot(&self, other: &V3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn sub(&self, other: &V3) -> V3 {
        V3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn add(&self, other: &V3) -> V3 {
        V3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn scale(&self, s: f64) -> V3 {
        V3::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn to_spherical(&self) -> S3 {
        let length = self.length();
        if length < EPSILON {
            return S3 { length: 0.0, azimuth: 0.0, elevation: 0.0 };
        }
        let azimuth = normalize_angle_2pi(self.y.atan2(self.x));
        let elevation = (self.z / length).clamp(-1.0, 1.0).asin();
        S3 { length, azimuth, elevation }
    }
}

/// Spherical position: range, azimuth (about +z), elevation above the xy-plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct S3 {
    pub length: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

impl S3 {
    pub fn new(length: f64, azimuth: f64, elevation: f64) -> Self {
        Self {
            length,
            azimuth: normalize_angle_2pi(azimuth),
            elevation: elevation.clamp(-PI / 2.0, PI / 2.0),
        }
    }

    pub fn to_cartesian(&self) -> V3 {
        let horiz = self.length * self.elevation.cos();
        V3::new(
            horiz * self.azimuth.cos(),
            horiz * self.azimuth.sin(),
            self.length * self.elevation.sin(),
        )
    }

    /// Spherical subtraction: the angular offset of `self` relative to `other`.
    /// Azimuth difference wraps to `[-PI, PI)`.
    pub fn sub(&self, other: &S3) -> S3 {
        S3 {
            length: self.length - other.length,
            azimuth: normalize_angle_pi(self.azimuth - other.azimuth),
            elevation: self.elevation - other.elevation,
        }
    }

    /// Spherical addition: combine two angular offsets. Azimuth wraps to `[0, 2*PI)`.
    pub fn add(&self, other: &S3) -> S3 {
        S3 {
            length: self.length + other.length,
            azimuth: normalize_angle_2pi(self.azimuth + other.azimuth),
            elevation: self.elevation + other.elevation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_s3_round_trip() {
        let samples = [
            V3::new(1.0, 2.0, 3.0),
            V3::new(-5.0, 0.5, -2.0),
            V3::new(1000.0, -1000.0, 1.0),
        ];
        for v in samples {
            let back = v.to_spherical().to_cartesian();
            let len = v.length();
            assert!((back.x - v.x).abs() <= EPSILON.max(EPSILON * len));
            assert!((back.y - v.y).abs() <= EPSILON.max(EPSILON * len));
            assert!((back.z - v.z).abs() <= EPSILON.max(EPSILON * len));
        }
    }

    #[test]
    fn spherical_addition_associative() {
        let a = S3::new(1.0, 0.3, 0.1);
        let b = S3::new(1.0, 1.2, -0.2);
        let c = S3::new(1.0, 5.9, 0.05);
        let lhs = a.add(&b).add(&c);
        let rhs = a.add(&b.add(&c));
        assert!((lhs.azimuth - rhs.azimuth).abs() < 1e-9 || (lhs.azimuth - rhs.azimuth).abs() > 2.0 * PI - 1e-9);
    }

    #[test]
    fn azimuth_normalized_into_0_2pi() {
        let v = V3::new(-1.0, -1.0, 0.0);
        let s = v.to_spherical();
        assert!(s.azimuth >= 0.0 && s.azimuth < 2.0 * PI);
    }
}
