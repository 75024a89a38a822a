//! Fixed-dimension points in double precision

use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Neg, Sub};

/// A point (or displacement) in `D` dimensions
#[derive(Clone, Copy, PartialEq)]
pub struct Point<const D: usize>(pub [f64; D]);

/// Point in three dimensions
pub type Point3 = Point<3>;

/// Point in two dimensions
pub type Point2 = Point<2>;

impl<const D: usize> Point<D> {
    /// Point from coordinates
    #[inline]
    pub const fn new(coords: [f64; D]) -> Self {
        Point(coords)
    }

    /// All coordinates equal to `value`
    #[inline]
    pub const fn splat(value: f64) -> Self {
        Point([value; D])
    }

    /// The origin
    #[inline]
    pub const fn origin() -> Self {
        Point([0.0; D])
    }

    /// Coordinates as an array
    #[inline]
    pub fn coords(&self) -> &[f64; D] {
        &self.0
    }

    /// Dot product treating both points as vectors
    #[inline]
    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }

    /// Squared length as a vector
    #[inline]
    pub fn norm_squared(&self) -> f64 {
        self.dot(self)
    }

    /// Squared Euclidean distance to `other`
    #[inline]
    pub fn squared_distance(&self, other: &Self) -> f64 {
        (*self - *other).norm_squared()
    }

    /// Component-wise minimum
    #[inline]
    pub fn min(&self, other: &Self) -> Self {
        self.zip_with(other, f64::min)
    }

    /// Component-wise maximum
    #[inline]
    pub fn max(&self, other: &Self) -> Self {
        self.zip_with(other, f64::max)
    }

    /// Midpoint between `self` and `other`
    #[inline]
    pub fn midpoint(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| 0.5 * (a + b))
    }

    #[inline]
    fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        let mut out = [0.0; D];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = f(self.0[i], other.0[i]);
        }
        Point(out)
    }
}

impl Point3 {
    /// Point from three coordinates
    #[inline]
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Point([x, y, z])
    }

    /// Cross product treating both points as vectors
    #[inline]
    pub fn cross(&self, other: &Self) -> Self {
        let [ax, ay, az] = self.0;
        let [bx, by, bz] = other.0;
        Point([ay * bz - az * by, az * bx - ax * bz, ax * by - ay * bx])
    }
}

impl<const D: usize> Default for Point<D> {
    fn default() -> Self {
        Self::origin()
    }
}

impl<const D: usize> fmt::Debug for Point<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point{:?}", self.0)
    }
}

impl<const D: usize> From<[f64; D]> for Point<D> {
    fn from(coords: [f64; D]) -> Self {
        Point(coords)
    }
}

impl<const D: usize> Index<usize> for Point<D> {
    type Output = f64;

    #[inline]
    fn index(&self, i: usize) -> &f64 {
        &self.0[i]
    }
}

impl<const D: usize> IndexMut<usize> for Point<D> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.0[i]
    }
}

impl<const D: usize> Add for Point<D> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.zip_with(&rhs, |a, b| a + b)
    }
}

impl<const D: usize> Sub for Point<D> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.zip_with(&rhs, |a, b| a - b)
    }
}

impl<const D: usize> Mul<f64> for Point<D> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Point(self.0.map(|a| a * rhs))
    }
}

impl<const D: usize> Neg for Point<D> {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Point(self.0.map(|a| -a))
    }
}
