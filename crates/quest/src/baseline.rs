//! Query results stored in a DataStore group
//!
//! A baseline group holds four Views:
//!
//! | View                | Type    | Count           |
//! |---------------------|---------|-----------------|
//! | `query_resolution`  | int32   | 3               |
//! | `mesh_bounding_box` | float64 | 6 (min then max)|
//! | `bvh_distance`      | float64 | one per node    |
//! | `bvh_containment`   | int32   | one per node    |
//!
//! Saving the DataStore with [`DataStore::save_json`] persists a baseline
//! for later comparison runs.

use meshstore_core::{Element, EntityKind, Error, IndexType};
use meshstore_datastore::{DataStore, GroupId};
use meshstore_spatial::{BoundingBox, Point3};
use tracing::{debug, warn};

use crate::error::{QuestError, Result};
use crate::grid::{GridResult, UniformGrid};

/// View holding the grid resolution
pub const RESOLUTION_VIEW: &str = "query_resolution";
/// View holding the query box
pub const BOUNDS_VIEW: &str = "mesh_bounding_box";
/// View holding signed distances
pub const DISTANCE_VIEW: &str = "bvh_distance";
/// View holding containment flags
pub const CONTAINMENT_VIEW: &str = "bvh_containment";

/// Grid and results read back from a baseline group
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    /// Query grid the results were computed on
    pub grid: UniformGrid,
    /// Per-node results
    pub result: GridResult,
}

/// Differences between a run and its baseline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineComparison {
    /// Nodes whose distance differs by more than the tolerance
    pub distance_mismatches: usize,
    /// Nodes whose containment flag differs
    pub containment_mismatches: usize,
    /// Largest absolute distance difference
    pub max_difference: f64,
}

impl BaselineComparison {
    /// True when nothing differs
    pub fn passed(&self) -> bool {
        self.distance_mismatches == 0 && self.containment_mismatches == 0
    }
}

fn missing_group(group: GroupId) -> QuestError {
    QuestError::Datastore(Error::NotFound {
        kind: EntityKind::Group,
        name: format!("{:?}", group),
    })
}

/// Replace or create View `name` holding `values`
///
/// The new data is filled into a fresh Buffer before the existing View is
/// touched, so a failure leaves the previous values in place.
fn write_view<T: Element>(
    ds: &mut DataStore,
    group: GroupId,
    name: &str,
    values: &[T],
) -> Result<()> {
    if ds.group(group).is_none() {
        return Err(missing_group(group));
    }
    let count = IndexType::try_from(values.len()).map_err(|_| {
        QuestError::invalid("result", format!("{} values do not fit a View", values.len()))
    })?;
    let buffer = ds.create_buffer_typed(T::TYPE_ID, count)?;
    let swapped = fill_and_swap(ds, group, name, values, count, buffer);
    if swapped.is_err() && ds.buffer(buffer).map_or(false, |b| b.num_views() == 0) {
        ds.destroy_buffer(buffer)?;
    }
    swapped
}

fn fill_and_swap<T: Element>(
    ds: &mut DataStore,
    group: GroupId,
    name: &str,
    values: &[T],
    count: IndexType,
    buffer: usize,
) -> Result<()> {
    let data = ds.buffer_mut(buffer).ok_or_else(|| {
        QuestError::Datastore(Error::NotFound {
            kind: EntityKind::Buffer,
            name: buffer.to_string(),
        })
    })?;
    data.data_mut::<T>()?.copy_from_slice(values);

    let mut g = ds.group_mut(group).ok_or_else(|| missing_group(group))?;
    match g.view_mut(name) {
        Some(mut view) => {
            view.try_attach_buffer(Some(buffer))?;
            let stride = T::TYPE_ID.element_bytes() as IndexType;
            view.try_apply_typed(T::TYPE_ID, count, 0, stride)?;
        }
        None => {
            g.create_view_with_buffer(name, T::TYPE_ID, count, buffer)?;
        }
    }
    Ok(())
}

fn read_view<T: Element>(ds: &DataStore, group: GroupId, name: &str) -> Result<Vec<T>> {
    let g = ds.group(group).ok_or_else(|| missing_group(group))?;
    let view = g.view(name).ok_or_else(|| {
        QuestError::Datastore(Error::NotFound {
            kind: EntityKind::View,
            name: name.to_string(),
        })
    })?;
    Ok(view.data::<T>()?.to_vec())
}

/// Write `grid` and `result` as the baseline Views of `group`
///
/// Existing baseline Views in the group are replaced.
pub fn store_baseline(
    ds: &mut DataStore,
    group: GroupId,
    grid: &UniformGrid,
    result: &GridResult,
) -> Result<()> {
    let mut resolution = [0i32; 3];
    for (out, r) in resolution.iter_mut().zip(grid.resolution()) {
        *out = i32::try_from(r).map_err(|_| {
            QuestError::invalid(
                "resolution",
                format!("{:?} does not fit a 32-bit View", grid.resolution()),
            )
        })?;
    }
    if result.len() != grid.num_nodes() || result.containment.len() != result.len() {
        return Err(QuestError::invalid(
            "result",
            format!(
                "{} distances and {} flags for {} grid nodes",
                result.len(),
                result.containment.len(),
                grid.num_nodes()
            ),
        ));
    }
    let (lo, hi) = (grid.bounds().min(), grid.bounds().max());
    let bounds = [lo[0], lo[1], lo[2], hi[0], hi[1], hi[2]];

    write_view(ds, group, RESOLUTION_VIEW, &resolution)?;
    write_view(ds, group, BOUNDS_VIEW, &bounds)?;
    write_view(ds, group, DISTANCE_VIEW, &result.distances)?;
    write_view(ds, group, CONTAINMENT_VIEW, &result.containment)?;
    debug!(target: "meshstore::quest", nodes = result.len(), "stored baseline");
    Ok(())
}

/// Read the baseline Views of `group`
pub fn load_baseline(ds: &DataStore, group: GroupId) -> Result<Baseline> {
    let resolution: Vec<i32> = read_view(ds, group, RESOLUTION_VIEW)?;
    let bounds: Vec<f64> = read_view(ds, group, BOUNDS_VIEW)?;
    let (&[i, j, k], &[x0, y0, z0, x1, y1, z1]) = (resolution.as_slice(), bounds.as_slice())
    else {
        return Err(QuestError::invalid(
            "baseline",
            format!(
                "expected 3 resolution values and 6 bounds, got {} and {}",
                resolution.len(),
                bounds.len()
            ),
        ));
    };
    if [i, j, k].iter().any(|&r| r < 1) {
        return Err(QuestError::invalid(
            "baseline",
            format!("resolution {:?} must be positive", [i, j, k]),
        ));
    }
    let grid = UniformGrid::new(
        BoundingBox::new(Point3::xyz(x0, y0, z0), Point3::xyz(x1, y1, z1)),
        [i as usize, j as usize, k as usize],
    )?;

    let distances: Vec<f64> = read_view(ds, group, DISTANCE_VIEW)?;
    let containment: Vec<i32> = read_view(ds, group, CONTAINMENT_VIEW)?;
    if distances.len() != grid.num_nodes() || containment.len() != grid.num_nodes() {
        return Err(QuestError::invalid(
            "baseline",
            format!(
                "{} distances and {} flags for {} grid nodes",
                distances.len(),
                containment.len(),
                grid.num_nodes()
            ),
        ));
    }
    Ok(Baseline {
        grid,
        result: GridResult {
            distances,
            containment,
        },
    })
}

/// Compare `actual` against `expected` node by node
pub fn compare_to_baseline(
    expected: &GridResult,
    actual: &GridResult,
    tolerance: f64,
) -> Result<BaselineComparison> {
    if expected.len() != actual.len() {
        return Err(QuestError::invalid(
            "result",
            format!("{} nodes against a baseline of {}", actual.len(), expected.len()),
        ));
    }
    let mut cmp = BaselineComparison::default();
    for (e, a) in expected.distances.iter().zip(&actual.distances) {
        let diff = (e - a).abs();
        cmp.max_difference = cmp.max_difference.max(diff);
        if diff > tolerance {
            cmp.distance_mismatches += 1;
        }
    }
    cmp.containment_mismatches = expected
        .containment
        .iter()
        .zip(&actual.containment)
        .filter(|(e, a)| e != a)
        .count();
    if !cmp.passed() {
        warn!(
            target: "meshstore::quest",
            distance = cmp.distance_mismatches,
            containment = cmp.containment_mismatches,
            max_difference = cmp.max_difference,
            "results differ from baseline"
        );
    }
    Ok(cmp)
}
