//! Uniform query grids and their evaluation

use meshstore_spatial::{BoundingBox, Point3};
use tracing::info;

use crate::config::QueryConfig;
use crate::error::{QuestError, Result};
use crate::mesh::SurfaceMesh;
use crate::signed_distance::SignedDistance;

/// Lattice of `resolution + 1` nodes per axis spanning `bounds`
///
/// Nodes are numbered x-fastest, then y, then z.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid {
    bounds: BoundingBox<3>,
    resolution: [usize; 3],
}

impl UniformGrid {
    /// Grid over `bounds` with `resolution` cells per axis
    pub fn new(bounds: BoundingBox<3>, resolution: [usize; 3]) -> Result<Self> {
        if resolution.iter().any(|&r| r == 0) {
            return Err(QuestError::invalid(
                "resolution",
                format!("{:?} must be at least 1 per axis", resolution),
            ));
        }
        if !bounds.is_valid() {
            return Err(QuestError::invalid("bounds", "query box is empty"));
        }
        Ok(UniformGrid { bounds, resolution })
    }

    /// Grid from `config`, falling back to scaled `mesh_bounds`
    pub fn from_config(config: &QueryConfig, mesh_bounds: &BoundingBox<3>) -> Result<Self> {
        Self::new(config.query_bounds(mesh_bounds), config.resolution)
    }

    /// Box spanned by the grid
    pub fn bounds(&self) -> &BoundingBox<3> {
        &self.bounds
    }

    /// Cells per axis
    pub fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    /// Nodes per axis
    pub fn node_counts(&self) -> [usize; 3] {
        self.resolution.map(|r| r + 1)
    }

    /// Total number of nodes
    pub fn num_nodes(&self) -> usize {
        self.node_counts().iter().product()
    }

    /// Distance between neighbouring nodes on each axis
    pub fn spacing(&self) -> Point3 {
        let extent = self.bounds.extent();
        Point3::new([0, 1, 2].map(|i| extent[i] / self.resolution[i] as f64))
    }

    /// Coordinates of node `index`
    pub fn node(&self, index: usize) -> Point3 {
        let [nx, ny, _] = self.node_counts();
        let ijk = [index % nx, (index / nx) % ny, index / (nx * ny)];
        let h = self.spacing();
        let lo = self.bounds.min();
        Point3::new([0, 1, 2].map(|i| {
            if ijk[i] == self.resolution[i] {
                self.bounds.max()[i]
            } else {
                lo[i] + ijk[i] as f64 * h[i]
            }
        }))
    }

    /// Coordinates of every node in order
    pub fn nodes(&self) -> Vec<Point3> {
        (0..self.num_nodes()).map(|i| self.node(i)).collect()
    }
}

/// Per-node results of a grid evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridResult {
    /// Signed distance at each node
    pub distances: Vec<f64>,
    /// 1 where the distance is negative (inside), else 0
    pub containment: Vec<i32>,
}

impl GridResult {
    /// Result from distances; containment is the sign bit
    pub fn from_distances(distances: Vec<f64>) -> Self {
        let containment = distances
            .iter()
            .map(|d| i32::from(d.is_sign_negative()))
            .collect();
        GridResult {
            distances,
            containment,
        }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    /// True if there are no nodes
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Number of nodes inside the surface
    pub fn num_inside(&self) -> usize {
        self.containment.iter().filter(|&&c| c != 0).count()
    }
}

/// Signed distance at every node of `grid`
pub fn evaluate_grid<M>(query: &SignedDistance<M>, grid: &UniformGrid, parallel: bool) -> GridResult
where
    M: SurfaceMesh + Sync,
{
    let points = grid.nodes();
    let distances = if parallel {
        query.compute_distances(&points)
    } else {
        query.compute_distances_serial(&points)
    };
    let result = GridResult::from_distances(distances);
    info!(
        target: "meshstore::quest",
        nodes = result.len(),
        inside = result.num_inside(),
        parallel,
        "evaluated query grid"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;

    fn cube_box() -> BoundingBox<3> {
        BoundingBox::new(Point3::splat(-0.5), Point3::splat(0.5))
    }

    #[test]
    fn test_node_order_is_x_fastest() {
        let grid = UniformGrid::new(
            BoundingBox::new(Point3::origin(), Point3::xyz(2.0, 4.0, 6.0)),
            [2, 2, 2],
        )
        .unwrap();
        assert_eq!(grid.num_nodes(), 27);
        assert_eq!(grid.node(0), Point3::origin());
        assert_eq!(grid.node(1), Point3::xyz(1.0, 0.0, 0.0));
        assert_eq!(grid.node(3), Point3::xyz(0.0, 2.0, 0.0));
        assert_eq!(grid.node(9), Point3::xyz(0.0, 0.0, 3.0));
        assert_eq!(grid.node(26), Point3::xyz(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_invalid_grids() {
        assert!(UniformGrid::new(cube_box(), [1, 0, 1]).is_err());
        assert!(UniformGrid::new(BoundingBox::empty(), [1, 1, 1]).is_err());
    }

    #[test]
    fn test_containment_is_sign_bit() {
        let result = GridResult::from_distances(vec![-1.0, 0.0, 2.0, -0.0]);
        assert_eq!(result.containment, vec![1, 0, 0, 1]);
        assert_eq!(result.num_inside(), 2);
    }

    #[test]
    fn test_evaluate_cube_grid() {
        let sd = SignedDistance::new(TriangleMesh::box_surface(&cube_box()), 4, 5).unwrap();
        let grid = UniformGrid::new(
            BoundingBox::new(Point3::splat(-1.0), Point3::splat(1.0)),
            [4, 4, 4],
        )
        .unwrap();
        let serial = evaluate_grid(&sd, &grid, false);
        let parallel = evaluate_grid(&sd, &grid, true);
        assert_eq!(serial, parallel);
        // node (2,2,2) is the center
        let center = 2 + 2 * 5 + 2 * 25;
        assert!((serial.distances[center] + 0.5).abs() < 1e-12);
        assert_eq!(serial.containment[center], 1);
        // only the center lies strictly inside at this spacing; the 26
        // nodes at +/-0.5 sit on the surface
        assert_eq!(serial.num_inside(), 1);
    }
}
