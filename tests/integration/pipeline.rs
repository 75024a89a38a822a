//! Signed distance results kept in a DataStore

use meshstore::quest::{
    compare_to_baseline, evaluate_grid, load_baseline, store_baseline, UniformGrid,
    NO_SURFACE_DISTANCE,
};
use meshstore::{BoundingBox, DataStore, Point3, QueryConfig, SignedDistance, TriangleMesh};
use tempfile::TempDir;

use crate::common::*;

// ============================================================================
// Query to baseline
// ============================================================================

#[test]
fn cube_grid_round_trips_through_json() {
    init_tracing();
    let config = QueryConfig {
        resolution: [4, 4, 4],
        bounds: Some([-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]),
        max_objects: 2,
        ..QueryConfig::default()
    };
    let query = SignedDistance::from_config(cube(0.5), &config).unwrap();
    let grid = UniformGrid::from_config(&config, query.mesh_bounds()).unwrap();
    let result = evaluate_grid(&query, &grid, true);
    assert_eq!(result.len(), 125);
    assert_eq!(result.num_inside(), 1);

    let mut ds = DataStore::new();
    let root = ds.root_id();
    store_baseline(&mut ds, root, &grid, &result).unwrap();
    let bounds = ds.root().view("mesh_bounding_box").unwrap();
    assert_eq!(bounds.data::<f64>().unwrap(), &[-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cube_baseline.json");
    ds.save_json(&path).unwrap();

    let mut loaded = DataStore::new();
    loaded.load_json(&path).unwrap();
    let baseline = load_baseline(&loaded, loaded.root_id()).unwrap();
    assert_eq!(baseline.grid, grid);
    assert!(compare_to_baseline(&baseline.result, &result, 0.0)
        .unwrap()
        .passed());
}

#[test]
fn baselines_for_several_meshes_share_one_store() {
    init_tracing();
    let config = QueryConfig {
        resolution: [3, 3, 3],
        ..QueryConfig::default()
    };
    let meshes = [
        ("cube", cube(1.0)),
        ("sphere", TriangleMesh::sphere(Point3::origin(), 1.0, 8, 16)),
    ];

    let mut ds = DataStore::new();
    for (name, mesh) in meshes {
        let query = SignedDistance::from_config(mesh, &config).unwrap();
        let grid = UniformGrid::from_config(&config, query.mesh_bounds()).unwrap();
        let result = evaluate_grid(&query, &grid, config.parallel);
        let group = ds.root_mut().create_group(name).unwrap();
        store_baseline(&mut ds, group, &grid, &result).unwrap();
    }
    assert_eq!(ds.root().num_groups(), 2);
    assert_eq!(ds.num_views(), 8);

    let cube_group = ds.group_at_path("cube").unwrap();
    let sphere_group = ds.group_at_path("sphere").unwrap();
    let a = load_baseline(&ds, cube_group).unwrap();
    let b = load_baseline(&ds, sphere_group).unwrap();
    assert_eq!(a.result.len(), 64);
    assert_ne!(a.result, b.result);
}

#[test]
fn empty_mesh_reports_no_surface() {
    let mesh = TriangleMesh::new(Vec::new(), Vec::new()).unwrap();
    let query = SignedDistance::new(mesh, 4, 4).unwrap();
    let grid = UniformGrid::new(
        BoundingBox::new(Point3::splat(0.0), Point3::splat(1.0)),
        [1, 1, 1],
    )
    .unwrap();
    let result = evaluate_grid(&query, &grid, false);
    assert!(result.distances.iter().all(|&d| d == NO_SURFACE_DISTANCE));
    assert_eq!(result.num_inside(), 0);
}
