//! Planar and road-relative coordinate vectors.

use std::fmt;
use std::io::{self, Read, Write};
use std::ops::{Add, AddAssign, Neg, Sub};

use cgmath::{Angle, Rad};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::DecodeError;
use crate::SegmentId;

/// Wire code of a planar vector payload.
const PLANAR_CODE: u8 = b'f';

/// Wire code of a road-relative vector payload.
const ROAD_CODE: u8 = b'r';

/// A two-dimensional vector in integer millimeters.
///
/// Depending on context the unit is mm, mm/s or mm/s². Equality is exact
/// integer comparison.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlanarVector {
    pub x: i64,
    pub y: i64,
}

impl PlanarVector {
    /// Creates a new vector.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Euclidean magnitude, truncated to a whole millimeter.
    pub fn magnitude(&self) -> i64 {
        (self.x as f64).hypot(self.y as f64) as i64
    }

    /// The vector pointing from `self` to `other`.
    pub fn vector_to(&self, other: Self) -> Self {
        other - *self
    }

    /// This vector scaled by `factor`, truncating toward zero.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(
            (self.x as f64 * factor) as i64,
            (self.y as f64 * factor) as i64,
        )
    }

    /// This vector rescaled to the given magnitude, preserving direction.
    pub fn with_magnitude(&self, magnitude: i64) -> Self {
        let theta = Rad::atan2(self.y as f64, self.x as f64);
        Self::new(
            (theta.cos() * magnitude as f64) as i64,
            (theta.sin() * magnitude as f64) as i64,
        )
    }

    /// Angle of the vector, normalized to `[0, 2π)`.
    pub fn theta(&self) -> Rad<f64> {
        let theta = Rad::atan2(self.y as f64, self.x as f64);
        if theta < Rad(0.0) {
            theta + Rad::full_turn()
        } else {
            theta
        }
    }
}

impl Add for PlanarVector {
    type Output = PlanarVector;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for PlanarVector {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for PlanarVector {
    type Output = PlanarVector;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for PlanarVector {
    type Output = PlanarVector;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for PlanarVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} mm, {} mm)", self.x, self.y)
    }
}

/// A location expressed as a progress along a road segment.
///
/// The progress unit follows the vector's context: mm for positions,
/// mm/s for velocities, mm/s² for accelerations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoadPosition {
    /// The segment the position lies on.
    pub segment: SegmentId,
    /// Distance from the segment's source junction.
    pub progress: i32,
}

impl RoadPosition {
    /// Creates a new road position.
    pub const fn new(segment: SegmentId, progress: i32) -> Self {
        Self { segment, progress }
    }
}

/// A simulation vector in either planar or road-relative coordinates.
///
/// Event payloads carry positions, velocities and accelerations in either
/// representation; the wire format tags each with a one-byte kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldVector {
    /// Free-standing planar coordinates.
    Planar(PlanarVector),
    /// Coordinates relative to a road segment.
    Road(RoadPosition),
}

impl WorldVector {
    /// The road segment this vector is bound to, if road-relative.
    pub fn segment(&self) -> Option<SegmentId> {
        match self {
            WorldVector::Planar(_) => None,
            WorldVector::Road(pos) => Some(pos.segment),
        }
    }

    /// The road-relative representation, if any.
    pub fn as_road(&self) -> Option<RoadPosition> {
        match self {
            WorldVector::Planar(_) => None,
            WorldVector::Road(pos) => Some(*pos),
        }
    }

    /// The planar representation, if any.
    pub fn as_planar(&self) -> Option<PlanarVector> {
        match self {
            WorldVector::Planar(v) => Some(*v),
            WorldVector::Road(_) => None,
        }
    }

    /// Writes the vector in its wire encoding: a kind byte then the payload.
    pub fn save_to(&self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            WorldVector::Planar(v) => {
                codec::write_u8(out, PLANAR_CODE)?;
                codec::write_i64(out, v.x)?;
                codec::write_i64(out, v.y)
            }
            WorldVector::Road(pos) => {
                codec::write_u8(out, ROAD_CODE)?;
                codec::write_u32(out, pos.segment.0)?;
                codec::write_i32(out, pos.progress)
            }
        }
    }

    /// Reads one wire-encoded vector.
    pub fn load(input: &mut dyn Read) -> Result<Self, DecodeError> {
        match codec::read_u8(input)? {
            PLANAR_CODE => {
                let x = codec::read_i64(input)?;
                let y = codec::read_i64(input)?;
                Ok(WorldVector::Planar(PlanarVector::new(x, y)))
            }
            ROAD_CODE => {
                let segment = SegmentId(codec::read_u32(input)?);
                let progress = codec::read_i32(input)?;
                Ok(WorldVector::Road(RoadPosition::new(segment, progress)))
            }
            code => Err(DecodeError::UnknownVectorType(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::io::Cursor;

    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn magnitude_truncates() {
        assert_eq!(PlanarVector::new(3, 4).magnitude(), 5);
        assert_eq!(PlanarVector::new(1, 1).magnitude(), 1);
        assert_eq!(PlanarVector::new(0, 0).magnitude(), 0);
    }

    #[test]
    fn theta_is_normalized() {
        assert_approx_eq!(PlanarVector::new(1000, 0).theta().0, 0.0);
        assert_approx_eq!(PlanarVector::new(0, 1000).theta().0, PI / 2.0);
        // below the x-axis maps into the upper half of [0, 2π)
        assert_approx_eq!(PlanarVector::new(0, -1000).theta().0, 3.0 * PI / 2.0);
        assert_approx_eq!(PlanarVector::new(-1000, -1000).theta().0, 5.0 * PI / 4.0);
    }

    #[test]
    fn vector_arithmetic() {
        let a = PlanarVector::new(10, 20);
        let b = PlanarVector::new(4, 5);
        assert_eq!(a + b, PlanarVector::new(14, 25));
        assert_eq!(a - b, PlanarVector::new(6, 15));
        assert_eq!(a.vector_to(b), PlanarVector::new(-6, -15));
        assert_eq!(a.scaled(0.5), PlanarVector::new(5, 10));
        assert_eq!(-a, PlanarVector::new(-10, -20));
    }

    #[test]
    fn with_magnitude_preserves_direction() {
        let v = PlanarVector::new(3000, 4000).with_magnitude(1_000_000);
        // a 3-4-5 triangle scaled to 1 km, within trig round-off
        assert!((v.x - 600_000).abs() <= 1, "{v:?}");
        assert!((v.y - 800_000).abs() <= 1, "{v:?}");
        assert!((v.magnitude() - 1_000_000).abs() <= 1);
    }

    #[test]
    fn wire_round_trip() {
        let vectors = [
            WorldVector::Planar(PlanarVector::new(-5, 123_456_789)),
            WorldVector::Road(RoadPosition::new(SegmentId(42), 777)),
        ];
        for vector in vectors {
            let mut buf = Vec::new();
            vector.save_to(&mut buf).unwrap();
            let decoded = WorldVector::load(&mut Cursor::new(buf)).unwrap();
            assert_eq!(decoded, vector);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut cursor = Cursor::new(vec![b'x', 0, 0, 0, 0]);
        assert!(matches!(
            WorldVector::load(&mut cursor),
            Err(DecodeError::UnknownVectorType(b'x'))
        ));
    }
}
