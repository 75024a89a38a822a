//! Bounding volume hierarchy over boxed objects
//!
//! Objects are inserted as `(box, payload)` pairs, then [`BvhTree::build`]
//! partitions them by recursive median split of box centroids along the
//! longest axis. Every leaf of the hierarchy is a bucket holding a
//! contiguous run of object indices; a bucket's box is the union of its
//! members' boxes, so each object is inside the box of the one bucket that
//! holds it.
//!
//! Nodes and buckets live in flat arenas and refer to each other by index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::bbox::BoundingBox;
use crate::error::{Result, SpatialError};
use crate::point::Point;

#[derive(Debug, Clone)]
struct Object<T, const D: usize> {
    bbox: BoundingBox<D>,
    data: T,
}

#[derive(Debug, Clone)]
struct Bucket<const D: usize> {
    bbox: BoundingBox<D>,
    start: usize,
    len: usize,
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { bucket: usize },
    Inner { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct Node<const D: usize> {
    bbox: BoundingBox<D>,
    kind: NodeKind,
}

type Stack = SmallVec<[usize; 32]>;

/// Node waiting in the nearest-first queue, ordered closest first
#[derive(Debug, Clone, Copy)]
struct Pending {
    distance: f64,
    node: usize,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Bounding volume hierarchy with bucketed leaves
///
/// Single-writer construction: `insert` then `build`. Once built the tree is
/// immutable and every query takes `&self`.
#[derive(Debug, Clone)]
pub struct BvhTree<T, const D: usize> {
    objects: Vec<Object<T, D>>,
    order: Vec<usize>,
    buckets: Vec<Bucket<D>>,
    nodes: Vec<Node<D>>,
    root: Option<usize>,
    max_levels: usize,
    depth: usize,
    built: bool,
}

impl<T, const D: usize> BvhTree<T, D> {
    /// Create an empty tree expecting `expected_objects` insertions
    ///
    /// `max_levels` bounds the hierarchy depth; the root is level 1.
    pub fn new(expected_objects: usize, max_levels: usize) -> Result<Self> {
        if max_levels == 0 {
            return Err(SpatialError::InvalidParameter {
                name: "max_levels",
                value: max_levels,
            });
        }
        Ok(BvhTree {
            objects: Vec::with_capacity(expected_objects),
            order: Vec::new(),
            buckets: Vec::new(),
            nodes: Vec::new(),
            root: None,
            max_levels,
            depth: 0,
            built: false,
        })
    }

    /// Add an object; returns its object index
    pub fn insert(&mut self, bbox: BoundingBox<D>, data: T) -> Result<usize> {
        if self.built {
            return Err(SpatialError::AlreadyBuilt);
        }
        self.objects.push(Object { bbox, data });
        Ok(self.objects.len() - 1)
    }

    /// Partition the inserted objects into buckets of at most
    /// `max_objects` (fewer levels permitting)
    pub fn build(&mut self, max_objects: usize) -> Result<()> {
        if self.built {
            return Err(SpatialError::AlreadyBuilt);
        }
        if max_objects == 0 {
            return Err(SpatialError::InvalidParameter {
                name: "max_objects",
                value: max_objects,
            });
        }

        let mut order: Vec<usize> = (0..self.objects.len()).collect();
        let mut builder = Builder {
            objects: &self.objects,
            max_objects,
            max_levels: self.max_levels,
            nodes: Vec::new(),
            buckets: Vec::new(),
            depth: 0,
        };
        let root = (!order.is_empty()).then(|| builder.node(&mut order, 0, 1));
        let Builder {
            nodes,
            buckets,
            depth,
            ..
        } = builder;

        self.order = order;
        self.nodes = nodes;
        self.buckets = buckets;
        self.root = root;
        self.depth = depth;
        self.built = true;

        info!(
            target: "meshstore::bvh",
            objects = self.objects.len(),
            buckets = self.buckets.len(),
            depth = self.depth,
            max_objects,
            max_levels = self.max_levels,
            "built BVH"
        );
        Ok(())
    }

    /// True once `build` has run
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Number of inserted objects
    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }

    /// Number of leaf buckets (0 before build)
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Number of levels in the built hierarchy
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Depth limit given at construction
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Box around every object; `None` for an empty or unbuilt tree
    pub fn bounds(&self) -> Option<&BoundingBox<D>> {
        self.root.map(|r| &self.nodes[r].bbox)
    }

    fn check_built(&self) -> Result<()> {
        if !self.built {
            debug!(target: "meshstore::bvh", "query on unbuilt tree");
            return Err(SpatialError::NotBuilt);
        }
        Ok(())
    }

    fn bucket(&self, bucket: usize) -> Result<&Bucket<D>> {
        self.check_built()?;
        self.buckets
            .get(bucket)
            .ok_or(SpatialError::BucketOutOfRange {
                bucket,
                buckets: self.buckets.len(),
            })
    }

    fn object(&self, object: usize) -> Result<&Object<T, D>> {
        self.objects
            .get(object)
            .ok_or(SpatialError::ObjectOutOfRange {
                object,
                objects: self.objects.len(),
            })
    }

    /// Object indices held by `bucket`
    pub fn bucket_objects(&self, bucket: usize) -> Result<&[usize]> {
        let b = self.bucket(bucket)?;
        Ok(&self.order[b.start..b.start + b.len])
    }

    /// Number of objects held by `bucket`
    pub fn bucket_num_objects(&self, bucket: usize) -> Result<usize> {
        Ok(self.bucket(bucket)?.len)
    }

    /// Box of `bucket`
    pub fn bucket_box(&self, bucket: usize) -> Result<&BoundingBox<D>> {
        Ok(&self.bucket(bucket)?.bbox)
    }

    /// Payload of `object`
    pub fn object_data(&self, object: usize) -> Result<&T> {
        Ok(&self.object(object)?.data)
    }

    /// Box of `object`
    pub fn object_box(&self, object: usize) -> Result<&BoundingBox<D>> {
        Ok(&self.object(object)?.bbox)
    }

    /// Buckets whose box contains `point`
    pub fn find_containing(&self, point: &Point<D>) -> Result<Vec<usize>> {
        self.check_built()?;
        let mut out = Vec::new();
        self.collect(|bbox| bbox.contains_point(point), &mut out);
        Ok(out)
    }

    /// Candidate buckets for a nearest-object query at `point`
    ///
    /// Every bucket whose box contains `point`, plus every bucket whose box
    /// is no farther than the smallest far-corner distance over all buckets.
    /// Some bucket within that bound holds the object nearest to `point`.
    pub fn find(&self, point: &Point<D>) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        self.find_into(point, &mut out)?;
        Ok(out)
    }

    /// [`find`](Self::find) writing into a reusable list (cleared first)
    ///
    /// Nodes are visited nearest first. The far-corner distance of each
    /// visited box tightens the bound, and the walk stops at the first node
    /// farther than it, so the bound reaches the far-corner minimum without
    /// looking at every bucket. Buckets come out in index order.
    pub fn find_into(&self, point: &Point<D>, out: &mut Vec<usize>) -> Result<()> {
        self.check_built()?;
        out.clear();
        let Some(root) = self.root else {
            return Ok(());
        };

        let mut bound = f64::INFINITY;
        let mut reached: SmallVec<[(usize, f64); 16]> = SmallVec::new();
        let mut queue = BinaryHeap::new();
        queue.push(Pending {
            distance: self.nodes[root].bbox.squared_distance(point),
            node: root,
        });
        while let Some(Pending { distance, node }) = queue.pop() {
            if distance > bound {
                break;
            }
            let node = &self.nodes[node];
            bound = bound.min(node.bbox.squared_max_distance(point));
            match node.kind {
                NodeKind::Leaf { bucket } => reached.push((bucket, distance)),
                NodeKind::Inner { left, right } => {
                    for child in [left, right] {
                        let distance = self.nodes[child].bbox.squared_distance(point);
                        if distance <= bound {
                            queue.push(Pending {
                                distance,
                                node: child,
                            });
                        }
                    }
                }
            }
        }

        out.extend(
            reached
                .into_iter()
                .filter(|&(bucket, distance)| {
                    distance <= bound || self.buckets[bucket].bbox.contains_point(point)
                })
                .map(|(bucket, _)| bucket),
        );
        out.sort_unstable();
        Ok(())
    }

    /// Depth-first walk keeping nodes and leaves that satisfy `keep`
    fn collect(&self, keep: impl Fn(&BoundingBox<D>) -> bool, out: &mut Vec<usize>) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack: Stack = SmallVec::new();
        stack.push(root);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !keep(&node.bbox) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { bucket } => {
                    if keep(&self.buckets[bucket].bbox) {
                        out.push(bucket);
                    }
                }
                NodeKind::Inner { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }
}

struct Builder<'a, T, const D: usize> {
    objects: &'a [Object<T, D>],
    max_objects: usize,
    max_levels: usize,
    nodes: Vec<Node<D>>,
    buckets: Vec<Bucket<D>>,
    depth: usize,
}

impl<T, const D: usize> Builder<'_, T, D> {
    /// Build the subtree over `order` (which starts at `start` in the
    /// tree-wide order) and return its node index
    fn node(&mut self, order: &mut [usize], start: usize, level: usize) -> usize {
        self.depth = self.depth.max(level);

        let mut bbox = BoundingBox::empty();
        let mut centroids = BoundingBox::empty();
        for &i in order.iter() {
            bbox.add_box(&self.objects[i].bbox);
            centroids.add_point(&self.objects[i].bbox.centroid());
        }

        let axis = centroids.longest_dimension();
        let flat = !centroids.is_valid() || centroids.extent()[axis] <= 0.0;
        if order.len() <= self.max_objects || level >= self.max_levels || flat {
            let bucket = self.buckets.len();
            self.buckets.push(Bucket {
                bbox,
                start,
                len: order.len(),
            });
            self.nodes.push(Node {
                bbox,
                kind: NodeKind::Leaf { bucket },
            });
            return self.nodes.len() - 1;
        }

        let mid = order.len() / 2;
        let objects = self.objects;
        order.select_nth_unstable_by(mid, |&a, &b| {
            let ca = objects[a].bbox.centroid()[axis];
            let cb = objects[b].bbox.centroid()[axis];
            ca.total_cmp(&cb)
        });
        let (lower, upper) = order.split_at_mut(mid);
        let left = self.node(lower, start, level + 1);
        let right = self.node(upper, start + mid, level + 1);
        self.nodes.push(Node {
            bbox,
            kind: NodeKind::Inner { left, right },
        });
        self.nodes.len() - 1
    }
}
