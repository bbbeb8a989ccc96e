//! Real and discrete arena coordinates.
//!
//! Every entity carries both a real-valued location and the grid cell that
//! location falls into. The conversion between the two is fixed by the arena
//! resolution and goes through [`to_discrete`] / [`to_real`] so that the two
//! representations can never disagree.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Tolerance used when snapping real coordinates onto the grid.
const SNAP_EPSILON: f64 = 1e-9;

/// Real-valued 2D vector (arena units)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: Vec2) -> f64 {
        (*self - other).length()
    }

    /// Both components are non-negative
    pub fn is_pd(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Discrete grid coordinate (cell index)
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance between two cells
    pub fn chebyshev(&self, other: Coord) -> usize {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Map a real location onto the cell containing it. Negative components clamp to 0.
pub fn to_discrete(v: Vec2, resolution: f64) -> Coord {
    let snap = |c: f64| ((c / resolution) + SNAP_EPSILON).floor().max(0.0) as usize;
    Coord::new(snap(v.x), snap(v.y))
}

/// Lower-left corner of a cell in real coordinates
pub fn to_real(c: Coord, resolution: f64) -> Vec2 {
    Vec2::new(c.x as f64 * resolution, c.y as f64 * resolution)
}

/// Center of a cell in real coordinates
pub fn cell_center(c: Coord, resolution: f64) -> Vec2 {
    to_real(c, resolution) + Vec2::new(resolution / 2.0, resolution / 2.0)
}

/// Closed real interval along one axis.
///
/// Overlap is tested on the open interiors: two footprints that only share an
/// edge do not overlap, which keeps adjacent cells from conflicting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealSpan {
    pub lb: f64,
    pub ub: f64,
}

impl RealSpan {
    pub fn new(lb: f64, ub: f64) -> Self {
        Self {
            lb: lb.min(ub),
            ub: lb.max(ub),
        }
    }

    /// Span of an extent of `dim` centered at `center`
    pub fn from_center(center: f64, dim: f64) -> Self {
        Self::new(center - dim / 2.0, center + dim / 2.0)
    }

    /// Span of an extent of `dim` anchored (lower bound) at `anchor`
    pub fn from_anchor(anchor: f64, dim: f64) -> Self {
        Self::new(anchor, anchor + dim)
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lb && v <= self.ub
    }

    pub fn overlaps_with(&self, other: &RealSpan) -> bool {
        self.lb < other.ub - SNAP_EPSILON && other.lb < self.ub - SNAP_EPSILON
    }

    pub fn span(&self) -> f64 {
        self.ub - self.lb
    }

    pub fn center(&self) -> f64 {
        (self.lb + self.ub) / 2.0
    }
}

impl fmt::Display for RealSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}-{:.3}]", self.lb, self.ub)
    }
}

/// Inclusive range of cell indices along one axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscreteSpan {
    pub lb: usize,
    pub ub: usize,
}

impl DiscreteSpan {
    pub fn new(lb: usize, ub: usize) -> Self {
        Self {
            lb: lb.min(ub),
            ub: lb.max(ub),
        }
    }

    /// `half` cells either side of `center`, saturating at 0
    pub fn around(center: usize, half: usize) -> Self {
        Self::new(center.saturating_sub(half), center + half)
    }

    pub fn contains(&self, v: usize) -> bool {
        v >= self.lb && v <= self.ub
    }

    pub fn overlaps_with(&self, other: &DiscreteSpan) -> bool {
        self.lb <= other.ub && other.lb <= self.ub
    }

    /// Number of cells covered
    pub fn size(&self) -> usize {
        self.ub - self.lb + 1
    }

    /// Clip to `[0, max_exclusive)`. Returns `None` if nothing remains.
    pub fn clip(&self, max_exclusive: usize) -> Option<DiscreteSpan> {
        if max_exclusive == 0 || self.lb >= max_exclusive {
            return None;
        }
        Some(DiscreteSpan::new(self.lb, self.ub.min(max_exclusive - 1)))
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.lb..=self.ub
    }
}

impl fmt::Display for DiscreteSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.lb, self.ub)
    }
}
