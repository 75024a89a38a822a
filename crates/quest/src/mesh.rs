//! Surface meshes consumed by the signed distance query
//!
//! The query reads meshes only through [`SurfaceMesh`]: cell count, cell
//! type, cell connectivity and node coordinates. Loading mesh files is the
//! caller's business.

use std::fmt;

use meshstore_spatial::{BoundingBox, Point3, Triangle};

use crate::error::{QuestError, Result};

/// Linear cell shapes a surface mesh may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Single node
    Vertex,
    /// Two-node line segment
    Segment,
    /// Three-node triangle
    Triangle,
    /// Four-node quadrilateral
    Quad,
}

impl CellType {
    /// Nodes per cell
    pub fn num_nodes(self) -> usize {
        match self {
            CellType::Vertex => 1,
            CellType::Segment => 2,
            CellType::Triangle => 3,
            CellType::Quad => 4,
        }
    }

    /// Lowercase name
    pub fn name(self) -> &'static str {
        match self {
            CellType::Vertex => "vertex",
            CellType::Segment => "segment",
            CellType::Triangle => "triangle",
            CellType::Quad => "quad",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only access to a 3D surface mesh
pub trait SurfaceMesh {
    /// Number of cells
    fn num_cells(&self) -> usize;

    /// Number of nodes
    fn num_nodes(&self) -> usize;

    /// Shape of `cell`
    fn cell_type(&self, cell: usize) -> CellType;

    /// Node ids of `cell`, `cell_type(cell).num_nodes()` of them
    fn cell_nodes(&self, cell: usize) -> &[usize];

    /// Coordinates of `node`
    fn node(&self, node: usize) -> Point3;

    /// Bounding box of the nodes of `cell`
    fn cell_bounding_box(&self, cell: usize) -> BoundingBox<3> {
        let mut bbox = BoundingBox::empty();
        for &n in self.cell_nodes(cell) {
            bbox.add_point(&self.node(n));
        }
        bbox
    }

    /// Triangle of a triangle cell, `None` for other shapes
    fn triangle(&self, cell: usize) -> Option<Triangle> {
        match (self.cell_type(cell), self.cell_nodes(cell)) {
            (CellType::Triangle, &[a, b, c]) => {
                Some(Triangle::new(self.node(a), self.node(b), self.node(c)))
            }
            _ => None,
        }
    }

    /// Bounding box of every node
    fn bounds(&self) -> BoundingBox<3> {
        let mut bbox = BoundingBox::empty();
        for n in 0..self.num_nodes() {
            bbox.add_point(&self.node(n));
        }
        bbox
    }
}

fn check_connectivity(num_nodes: usize, cell: usize, nodes: &[usize]) -> Result<()> {
    match nodes.iter().find(|&&n| n >= num_nodes) {
        Some(n) => Err(QuestError::invalid(
            "connectivity",
            format!("cell {} references node {} of {}", cell, n, num_nodes),
        )),
        None => Ok(()),
    }
}

/// Mesh made only of triangles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    nodes: Vec<Point3>,
    cells: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Mesh from node coordinates and triangle connectivity
    pub fn new(nodes: Vec<Point3>, cells: Vec<[usize; 3]>) -> Result<Self> {
        for (i, cell) in cells.iter().enumerate() {
            check_connectivity(nodes.len(), i, cell)?;
        }
        Ok(TriangleMesh { nodes, cells })
    }

    /// Surface of `bbox` as 12 triangles, normals pointing outward
    pub fn box_surface(bbox: &BoundingBox<3>) -> Self {
        let (lo, hi) = (bbox.min(), bbox.max());
        let corner = |i: usize| {
            Point3::xyz(
                if i & 1 == 0 { lo[0] } else { hi[0] },
                if i & 2 == 0 { lo[1] } else { hi[1] },
                if i & 4 == 0 { lo[2] } else { hi[2] },
            )
        };
        let nodes = (0..8).map(corner).collect();
        let cells = vec![
            // z = lo
            [0, 2, 3],
            [0, 3, 1],
            // z = hi
            [4, 5, 7],
            [4, 7, 6],
            // y = lo
            [0, 1, 5],
            [0, 5, 4],
            // y = hi
            [2, 6, 7],
            [2, 7, 3],
            // x = lo
            [0, 4, 6],
            [0, 6, 2],
            // x = hi
            [1, 3, 7],
            [1, 7, 5],
        ];
        TriangleMesh { nodes, cells }
    }

    /// Latitude/longitude triangulation of a sphere, normals pointing outward
    ///
    /// `stacks` and `slices` are clamped to at least 2 and 3.
    pub fn sphere(center: Point3, radius: f64, stacks: usize, slices: usize) -> Self {
        let stacks = stacks.max(2);
        let slices = slices.max(3);
        let mut nodes = vec![center + Point3::xyz(0.0, 0.0, radius)];
        for i in 1..stacks {
            let phi = std::f64::consts::PI * i as f64 / stacks as f64;
            for j in 0..slices {
                let theta = 2.0 * std::f64::consts::PI * j as f64 / slices as f64;
                nodes.push(
                    center
                        + Point3::xyz(
                            radius * phi.sin() * theta.cos(),
                            radius * phi.sin() * theta.sin(),
                            radius * phi.cos(),
                        ),
                );
            }
        }
        let south = nodes.len();
        nodes.push(center - Point3::xyz(0.0, 0.0, radius));

        let ring = |i: usize, j: usize| 1 + (i - 1) * slices + j % slices;
        let mut cells = Vec::new();
        for j in 0..slices {
            cells.push([0, ring(1, j), ring(1, j + 1)]);
        }
        for i in 1..stacks - 1 {
            for j in 0..slices {
                let (a, b) = (ring(i, j), ring(i, j + 1));
                let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
                cells.push([a, c, d]);
                cells.push([a, d, b]);
            }
        }
        for j in 0..slices {
            cells.push([south, ring(stacks - 1, j + 1), ring(stacks - 1, j)]);
        }
        TriangleMesh { nodes, cells }
    }

    /// Node coordinates
    pub fn nodes(&self) -> &[Point3] {
        &self.nodes
    }

    /// Triangle connectivity
    pub fn cells(&self) -> &[[usize; 3]] {
        &self.cells
    }
}

impl SurfaceMesh for TriangleMesh {
    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn cell_type(&self, _cell: usize) -> CellType {
        CellType::Triangle
    }

    fn cell_nodes(&self, cell: usize) -> &[usize] {
        &self.cells[cell]
    }

    fn node(&self, node: usize) -> Point3 {
        self.nodes[node]
    }
}

/// Mesh with mixed cell shapes in compressed connectivity form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnstructuredMesh {
    nodes: Vec<Point3>,
    types: Vec<CellType>,
    offsets: Vec<usize>,
    connectivity: Vec<usize>,
}

impl UnstructuredMesh {
    /// Mesh with the given nodes and no cells
    pub fn new(nodes: Vec<Point3>) -> Self {
        UnstructuredMesh {
            nodes,
            types: Vec::new(),
            offsets: vec![0],
            connectivity: Vec::new(),
        }
    }

    /// Append a cell; returns its index
    pub fn add_cell(&mut self, cell_type: CellType, nodes: &[usize]) -> Result<usize> {
        let cell = self.types.len();
        if nodes.len() != cell_type.num_nodes() {
            return Err(QuestError::invalid(
                "connectivity",
                format!(
                    "{} cell {} needs {} nodes, got {}",
                    cell_type,
                    cell,
                    cell_type.num_nodes(),
                    nodes.len()
                ),
            ));
        }
        check_connectivity(self.nodes.len(), cell, nodes)?;
        self.types.push(cell_type);
        self.connectivity.extend_from_slice(nodes);
        self.offsets.push(self.connectivity.len());
        Ok(cell)
    }
}

impl SurfaceMesh for UnstructuredMesh {
    fn num_cells(&self) -> usize {
        self.types.len()
    }

    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn cell_type(&self, cell: usize) -> CellType {
        self.types[cell]
    }

    fn cell_nodes(&self, cell: usize) -> &[usize] {
        &self.connectivity[self.offsets[cell]..self.offsets[cell + 1]]
    }

    fn node(&self, node: usize) -> Point3 {
        self.nodes[node]
    }
}

impl<M: SurfaceMesh + ?Sized> SurfaceMesh for &M {
    fn num_cells(&self) -> usize {
        (**self).num_cells()
    }

    fn num_nodes(&self) -> usize {
        (**self).num_nodes()
    }

    fn cell_type(&self, cell: usize) -> CellType {
        (**self).cell_type(cell)
    }

    fn cell_nodes(&self, cell: usize) -> &[usize] {
        (**self).cell_nodes(cell)
    }

    fn node(&self, node: usize) -> Point3 {
        (**self).node(node)
    }
}
