//! Signed distance to a triangle surface mesh
//!
//! Every cell's bounding box goes into a [`BvhTree`]. A query collects the
//! candidate buckets for the point, takes the minimum point-to-triangle
//! distance over their cells and signs it by which side of the closest
//! triangle's plane the point is on. Closed meshes with outward normals
//! give negative distances inside.

use meshstore_spatial::{BoundingBox, BvhTree, Orientation, Point3, Triangle};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::QueryConfig;
use crate::error::{QuestError, Result};
use crate::mesh::{CellType, SurfaceMesh};

/// Distance returned when the mesh has no cells
pub const NO_SURFACE_DISTANCE: f64 = f64::MAX;

/// Signed distance query over a surface mesh
///
/// Immutable once constructed; queries take `&self` and may run from many
/// threads at once.
#[derive(Debug)]
pub struct SignedDistance<M> {
    mesh: M,
    triangles: Vec<Triangle>,
    tree: BvhTree<usize, 3>,
    bounds: BoundingBox<3>,
}

impl<M: SurfaceMesh> SignedDistance<M> {
    /// Index `mesh` with buckets of `max_objects` cells and at most
    /// `max_levels` levels
    ///
    /// # Errors
    ///
    /// `UnsupportedCellType` for any non-triangle cell; `Spatial` for a zero
    /// `max_levels` or `max_objects`.
    pub fn new(mesh: M, max_objects: usize, max_levels: usize) -> Result<Self> {
        let num_cells = mesh.num_cells();
        let mut tree = BvhTree::new(num_cells, max_levels)?;
        let mut triangles = Vec::with_capacity(num_cells);
        for cell in 0..num_cells {
            let triangle = mesh
                .triangle(cell)
                .ok_or_else(|| QuestError::UnsupportedCellType {
                    cell,
                    cell_type: mesh.cell_type(cell),
                })?;
            tree.insert(triangle.bounding_box(), cell)?;
            triangles.push(triangle);
        }
        tree.build(max_objects)?;

        let bounds = tree.bounds().copied().unwrap_or_else(BoundingBox::empty);
        info!(
            target: "meshstore::quest",
            cells = num_cells,
            buckets = tree.num_buckets(),
            depth = tree.depth(),
            "built signed distance query"
        );
        Ok(SignedDistance {
            mesh,
            triangles,
            tree,
            bounds,
        })
    }

    /// Construct with the BVH parameters of `config`
    pub fn from_config(mesh: M, config: &QueryConfig) -> Result<Self> {
        config.validate()?;
        Self::new(mesh, config.max_objects, config.max_levels)
    }

    /// The indexed mesh
    pub fn mesh(&self) -> &M {
        &self.mesh
    }

    /// The spatial index over cell boxes
    pub fn bvh_tree(&self) -> &BvhTree<usize, 3> {
        &self.tree
    }

    /// Bounding box of every cell (empty for a mesh without cells)
    pub fn mesh_bounds(&self) -> &BoundingBox<3> {
        &self.bounds
    }

    /// Closest cell to `point` and the squared distance to it
    ///
    /// The first cell reaching the minimum wins ties. `None` when the mesh
    /// has no cells.
    pub fn closest_cell(&self, point: &Point3) -> Option<(usize, f64)> {
        let buckets = self.tree.find(point).ok()?;
        let mut best: Option<(usize, f64)> = None;
        for bucket in buckets {
            let Ok(objects) = self.tree.bucket_objects(bucket) else {
                continue;
            };
            for &object in objects {
                let Ok(&cell) = self.tree.object_data(object) else {
                    continue;
                };
                debug_assert!(cell < self.triangles.len(), "cell {} out of range", cell);
                let sq = self.triangles[cell].squared_distance(point);
                if best.map_or(true, |(_, min)| sq < min) {
                    best = Some((cell, sq));
                }
            }
        }
        best
    }

    /// Signed distance from `point` to the surface
    ///
    /// Negative on the side opposite the closest triangle's normal. Points
    /// on that triangle's plane count as positive. A mesh without cells
    /// gives [`NO_SURFACE_DISTANCE`].
    pub fn compute_distance(&self, point: &Point3) -> f64 {
        match self.closest_cell(point) {
            None => NO_SURFACE_DISTANCE,
            Some((cell, sq)) => self.sign(point, cell) * sq.sqrt(),
        }
    }

    fn sign(&self, point: &Point3, cell: usize) -> f64 {
        match self.triangles[cell].orientation(point) {
            Orientation::OnNegativeSide => -1.0,
            Orientation::OnPositiveSide | Orientation::OnBoundary => 1.0,
        }
    }

    /// Signed distances for many points on the rayon pool
    pub fn compute_distances(&self, points: &[Point3]) -> Vec<f64>
    where
        M: Sync,
    {
        debug!(target: "meshstore::quest", points = points.len(), "parallel distance batch");
        points.par_iter().map(|p| self.compute_distance(p)).collect()
    }

    /// Signed distances for many points on the calling thread
    pub fn compute_distances_serial(&self, points: &[Point3]) -> Vec<f64> {
        points.iter().map(|p| self.compute_distance(p)).collect()
    }
}

/// Signed distance by a linear scan over every triangle cell
///
/// Same tie and sign rules as [`SignedDistance::compute_distance`]; other
/// cell shapes are skipped.
pub fn brute_force_distance<M: SurfaceMesh + ?Sized>(mesh: &M, point: &Point3) -> f64 {
    let mut best: Option<(Triangle, f64)> = None;
    for cell in 0..mesh.num_cells() {
        if mesh.cell_type(cell) != CellType::Triangle {
            continue;
        }
        let Some(triangle) = mesh.triangle(cell) else {
            continue;
        };
        let sq = triangle.squared_distance(point);
        if best.map_or(true, |(_, min)| sq < min) {
            best = Some((triangle, sq));
        }
    }
    match best {
        None => NO_SURFACE_DISTANCE,
        Some((triangle, sq)) => match triangle.orientation(point) {
            Orientation::OnNegativeSide => -sq.sqrt(),
            _ => sq.sqrt(),
        },
    }
}
