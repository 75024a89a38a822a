//! Triangles in three dimensions: closest point, distance and orientation

use crate::bbox::BoundingBox;
use crate::point::Point3;

/// Side of a triangle's plane a point lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Same side as the normal `(b - a) x (c - a)`
    OnPositiveSide,
    /// Opposite side from the normal
    OnNegativeSide,
    /// Exactly on the plane
    OnBoundary,
}

/// Triangle with vertices `a`, `b`, `c`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub a: Point3,
    /// Second vertex
    pub b: Point3,
    /// Third vertex
    pub c: Point3,
}

impl Triangle {
    /// Triangle from its vertices
    #[inline]
    pub fn new(a: Point3, b: Point3, c: Point3) -> Self {
        Triangle { a, b, c }
    }

    /// Unnormalized normal; its length is twice the area
    #[inline]
    pub fn normal(&self) -> Point3 {
        (self.b - self.a).cross(&(self.c - self.a))
    }

    /// Area of the triangle
    pub fn area(&self) -> f64 {
        0.5 * self.normal().norm_squared().sqrt()
    }

    /// True if the vertices are collinear
    pub fn is_degenerate(&self) -> bool {
        self.normal().norm_squared() == 0.0
    }

    /// Bounding box of the three vertices
    pub fn bounding_box(&self) -> BoundingBox<3> {
        BoundingBox::from_points([&self.a, &self.b, &self.c])
    }

    /// Closest point on the triangle to `p`, with its barycentric coordinates
    ///
    /// Walks the Voronoi regions of vertices, then edges, then the face.
    pub fn closest_point(&self, p: &Point3) -> (Point3, [f64; 3]) {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;

        let ap = *p - a;
        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return (a, [1.0, 0.0, 0.0]);
        }

        let bp = *p - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return (b, [0.0, 1.0, 0.0]);
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return (a + ab * v, [1.0 - v, v, 0.0]);
        }

        let cp = *p - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return (c, [0.0, 0.0, 1.0]);
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return (a + ac * w, [1.0 - w, 0.0, w]);
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return (b + (c - b) * w, [0.0, 1.0 - w, w]);
        }

        let denom = va + vb + vc;
        if denom == 0.0 {
            // collinear vertices: the face region is empty
            return self.closest_on_edges(p);
        }
        let v = vb / denom;
        let w = vc / denom;
        (a + ab * v + ac * w, [1.0 - v - w, v, w])
    }

    fn closest_on_edges(&self, p: &Point3) -> (Point3, [f64; 3]) {
        let segment = |s: Point3, e: Point3| {
            let d = e - s;
            let len2 = d.norm_squared();
            let t = if len2 > 0.0 {
                ((*p - s).dot(&d) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            (s + d * t, t)
        };
        let (pab, t) = segment(self.a, self.b);
        let (pbc, u) = segment(self.b, self.c);
        let (pca, w) = segment(self.c, self.a);
        let candidates = [
            (pab, [1.0 - t, t, 0.0]),
            (pbc, [0.0, 1.0 - u, u]),
            (pca, [w, 0.0, 1.0 - w]),
        ];
        let mut best = candidates[0];
        for cand in &candidates[1..] {
            if cand.0.squared_distance(p) < best.0.squared_distance(p) {
                best = *cand;
            }
        }
        best
    }

    /// Squared distance from `p` to the nearest point of the triangle
    #[inline]
    pub fn squared_distance(&self, p: &Point3) -> f64 {
        self.closest_point(p).0.squared_distance(p)
    }

    /// Side of the triangle's plane `p` lies on
    ///
    /// Sign of `(p - a) . ((b - a) x (c - a))`.
    pub fn orientation(&self, p: &Point3) -> Orientation {
        let det = (*p - self.a).dot(&self.normal());
        if det > 0.0 {
            Orientation::OnPositiveSide
        } else if det < 0.0 {
            Orientation::OnNegativeSide
        } else {
            Orientation::OnBoundary
        }
    }
}
