//! Axis-aligned bounding boxes

use crate::point::Point;

/// Axis-aligned box given by its min and max corners
///
/// A box with `min > max` on any axis is invalid (empty). Adding a point to
/// an empty box makes it that single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox<const D: usize> {
    min: Point<D>,
    max: Point<D>,
}

impl<const D: usize> Default for BoundingBox<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const D: usize> BoundingBox<D> {
    /// Box spanning the two corners, in any order
    #[inline]
    pub fn new(a: Point<D>, b: Point<D>) -> Self {
        BoundingBox {
            min: a.min(&b),
            max: a.max(&b),
        }
    }

    /// The empty (inverted) box
    #[inline]
    pub fn empty() -> Self {
        BoundingBox {
            min: Point::splat(f64::MAX),
            max: Point::splat(f64::MIN),
        }
    }

    /// Smallest box containing every point
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point<D>>,
    {
        let mut bbox = Self::empty();
        for p in points {
            bbox.add_point(p);
        }
        bbox
    }

    /// Minimum corner
    #[inline]
    pub fn min(&self) -> &Point<D> {
        &self.min
    }

    /// Maximum corner
    #[inline]
    pub fn max(&self) -> &Point<D> {
        &self.max
    }

    /// True if `min <= max` on every axis
    #[inline]
    pub fn is_valid(&self) -> bool {
        (0..D).all(|i| self.min[i] <= self.max[i])
    }

    /// Grow to include `p`
    #[inline]
    pub fn add_point(&mut self, p: &Point<D>) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Grow to include `other`; empty boxes add nothing
    #[inline]
    pub fn add_box(&mut self, other: &Self) {
        if other.is_valid() {
            self.add_point(&other.min);
            self.add_point(&other.max);
        }
    }

    /// Closed containment test
    #[inline]
    pub fn contains_point(&self, p: &Point<D>) -> bool {
        (0..D).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    /// True if `other` lies entirely inside this box
    #[inline]
    pub fn contains_box(&self, other: &Self) -> bool {
        other.is_valid() && self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// True if the boxes share at least one point
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        (0..D).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Center of the box
    #[inline]
    pub fn centroid(&self) -> Point<D> {
        self.min.midpoint(&self.max)
    }

    /// `max - min`
    #[inline]
    pub fn extent(&self) -> Point<D> {
        self.max - self.min
    }

    /// Axis with the largest extent (the first one on ties)
    pub fn longest_dimension(&self) -> usize {
        let extent = self.extent();
        let mut best = 0;
        for i in 1..D {
            if extent[i] > extent[best] {
                best = i;
            }
        }
        best
    }

    /// Scale about the centroid by `factor`
    pub fn scale(&mut self, factor: f64) {
        if !self.is_valid() {
            return;
        }
        let center = self.centroid();
        let half = self.extent() * (0.5 * factor.abs());
        self.min = center - half;
        self.max = center + half;
    }

    /// Split at `value` along `axis` into the lower and upper halves
    pub fn split(&self, axis: usize, value: f64) -> (Self, Self) {
        let mut lower = *self;
        let mut upper = *self;
        lower.max[axis] = value;
        upper.min[axis] = value;
        (lower, upper)
    }

    /// Squared distance from `p` to the nearest point of the box (0 inside)
    pub fn squared_distance(&self, p: &Point<D>) -> f64 {
        (0..D)
            .map(|i| {
                let d = (self.min[i] - p[i]).max(0.0).max(p[i] - self.max[i]);
                d * d
            })
            .sum()
    }

    /// Squared distance from `p` to the farthest corner of the box
    pub fn squared_max_distance(&self, p: &Point<D>) -> f64 {
        (0..D)
            .map(|i| {
                let d = (p[i] - self.min[i]).abs().max((self.max[i] - p[i]).abs());
                d * d
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point3;

    fn unit() -> BoundingBox<3> {
        BoundingBox::new(Point3::xyz(0.0, 0.0, 0.0), Point3::xyz(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_empty_box_grows_from_points() {
        let mut bbox = BoundingBox::<3>::empty();
        assert!(!bbox.is_valid());
        assert!(!bbox.contains_point(&Point3::origin()));
        bbox.add_point(&Point3::xyz(1.0, -1.0, 2.0));
        assert!(bbox.is_valid());
        assert_eq!(bbox.min(), bbox.max());
        bbox.add_box(&BoundingBox::empty());
        assert_eq!(bbox.min(), bbox.max());
    }

    #[test]
    fn test_new_orders_corners() {
        let bbox = BoundingBox::new(Point3::xyz(1.0, 0.0, 1.0), Point3::xyz(0.0, 1.0, 0.0));
        assert_eq!(bbox, unit());
    }

    #[test]
    fn test_containment_is_closed() {
        let bbox = unit();
        assert!(bbox.contains_point(&Point3::xyz(1.0, 0.0, 0.5)));
        assert!(!bbox.contains_point(&Point3::xyz(1.0 + 1e-12, 0.0, 0.5)));
        let inner = BoundingBox::new(Point3::xyz(0.2, 0.2, 0.2), Point3::xyz(0.8, 1.0, 0.3));
        assert!(bbox.contains_box(&inner));
        assert!(!inner.contains_box(&bbox));
        assert!(bbox.intersects(&inner));
    }

    #[test]
    fn test_distances() {
        let bbox = unit();
        assert_eq!(bbox.squared_distance(&Point3::xyz(0.5, 0.5, 0.5)), 0.0);
        assert_eq!(bbox.squared_distance(&Point3::xyz(2.0, 0.5, 0.5)), 1.0);
        assert_eq!(bbox.squared_distance(&Point3::xyz(2.0, 2.0, 2.0)), 3.0);
        assert_eq!(bbox.squared_max_distance(&Point3::xyz(0.0, 0.0, 0.0)), 3.0);
        assert_eq!(bbox.squared_max_distance(&Point3::xyz(0.5, 0.5, 0.5)), 0.75);
    }

    #[test]
    fn test_scale_about_centroid() {
        let mut bbox = unit();
        bbox.scale(2.0);
        assert_eq!(bbox.min(), &Point3::splat(-0.5));
        assert_eq!(bbox.max(), &Point3::splat(1.5));
        assert_eq!(bbox.centroid(), Point3::splat(0.5));
    }

    #[test]
    fn test_longest_dimension() {
        let bbox = BoundingBox::new(Point3::origin(), Point3::xyz(3.0, 10.0, 5.0));
        assert_eq!(bbox.longest_dimension(), 1);
        assert_eq!(unit().longest_dimension(), 0);
    }
}
