//! Shared helpers for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::Once;

use meshstore::quest::TriangleMesh;
use meshstore::{BoundingBox, DataStore, Point3, TypeId};

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness.
///
/// Honours `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Closed cube surface over `[-h, h]^3` with outward normals.
pub fn cube(h: f64) -> TriangleMesh {
    TriangleMesh::box_surface(&BoundingBox::new(Point3::splat(-h), Point3::splat(h)))
}

/// DataStore with a few Views of every state:
///
/// ```text
/// /fields/pressure   float64[4] = 0.5, 1.5, 2.5, 3.5
/// /fields/ids        int32 shape [2, 3] = 0..6
/// /meta/step         scalar int64 = 42
/// /meta/title        string "run"
/// /meta/pending      empty
/// ```
pub fn sample_store() -> DataStore {
    let mut ds = DataStore::new();
    let mut root = ds.root_mut();
    let pressure = root
        .create_view_and_allocate("fields/pressure", TypeId::Float64, 4)
        .unwrap();
    let ids = root.create_view("fields/ids").unwrap();
    root.create_view_scalar("meta/step", 42i64).unwrap();
    root.create_view_string("meta/title", "run").unwrap();
    root.create_view("meta/pending").unwrap();

    ds.view_mut(pressure)
        .unwrap()
        .data_mut::<f64>()
        .unwrap()
        .copy_from_slice(&[0.5, 1.5, 2.5, 3.5]);
    let mut v = ds.view_mut(ids).unwrap();
    v.try_allocate_shape(TypeId::Int32, &[2, 3]).unwrap();
    for (i, x) in v.data_mut::<i32>().unwrap().iter_mut().enumerate() {
        *x = i as i32;
    }
    ds
}
