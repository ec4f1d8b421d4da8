//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! Nodes live in a flat arena and link to each other by index. Leaves
//! reference a contiguous range of `prim_indices`, which in turn index the
//! primitives in the order they were given to [`Bvh::build`]. The tree is
//! built once and never modified.

use std::time::Instant;

use crate::{
    gen_f32,
    object::{Intersection, Object},
};
use lume_core::SplitMethod;
use lume_math::{Bounds3, Ray, Vec3};
use rand::RngCore;

/// Largest leaf size accepted by [`Bvh::build`].
pub const MAX_PRIMS_IN_NODE: usize = 255;

/// Number of buckets per axis for SAH split evaluation.
const SAH_BUCKETS: usize = 30;

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    /// `count` primitives starting at `first` in `prim_indices`.
    Leaf { first: usize, count: usize },
    /// Indices of the two children in the node arena.
    Interior { left: usize, right: usize },
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: Bounds3,
    /// Total surface area of the primitives below this node
    area: f32,
    kind: NodeKind,
}

/// Per-primitive data used only while building.
#[derive(Debug, Clone, Copy)]
struct BuildItem {
    index: usize,
    bounds: Bounds3,
    centroid: Vec3,
    area: f32,
}

#[derive(Debug, Clone, Copy)]
struct SahBucket {
    count: usize,
    bounds: Bounds3,
}

impl Default for SahBucket {
    fn default() -> Self {
        Self {
            count: 0,
            bounds: Bounds3::EMPTY,
        }
    }
}

/// A BVH over a set of objects.
///
/// The BVH owns its primitives; to share objects with other structures
/// build it over `Arc<dyn Object>` handles.
pub struct Bvh<O> {
    nodes: Vec<BvhNode>,
    primitives: Vec<O>,
    prim_indices: Vec<usize>,
    root: Option<usize>,
    max_prims_in_node: usize,
    split_method: SplitMethod,
}

impl<O: Object> Bvh<O> {
    /// Build a BVH over `objects`.
    ///
    /// `max_prims_in_node` is clamped to `1..=255`. An empty input yields an
    /// empty tree that never reports a hit.
    pub fn build(objects: Vec<O>, max_prims_in_node: usize, split_method: SplitMethod) -> Self {
        let start = Instant::now();
        let max_prims_in_node = max_prims_in_node.clamp(1, MAX_PRIMS_IN_NODE);

        let mut items: Vec<BuildItem> = objects
            .iter()
            .enumerate()
            .map(|(index, object)| {
                let bounds = object.bounds();
                BuildItem {
                    index,
                    bounds,
                    centroid: bounds.centroid(),
                    area: object.area(),
                }
            })
            .collect();

        let mut bvh = Self {
            nodes: Vec::with_capacity(2 * items.len()),
            primitives: objects,
            prim_indices: Vec::new(),
            root: None,
            max_prims_in_node,
            split_method,
        };

        if !items.is_empty() {
            let root = bvh.build_recursive(&mut items, 0);
            bvh.root = Some(root);
        }
        bvh.prim_indices = items.iter().map(|item| item.index).collect();

        log::debug!(
            "BVH ({:?}): {} primitives, {} nodes in {:.2?}",
            split_method,
            bvh.primitives.len(),
            bvh.nodes.len(),
            start.elapsed()
        );
        bvh
    }

    /// Build the subtree over `items`, which sit at `offset` in the final
    /// primitive order. Returns the arena index of the subtree root.
    fn build_recursive(&mut self, items: &mut [BuildItem], offset: usize) -> usize {
        let n = items.len();
        let bounds = items
            .iter()
            .fold(Bounds3::EMPTY, |acc, item| acc.union(&item.bounds));
        let area: f32 = items.iter().map(|item| item.area).sum();

        if n <= self.max_prims_in_node {
            return self.push(BvhNode {
                bounds,
                area,
                kind: NodeKind::Leaf {
                    first: offset,
                    count: n,
                },
            });
        }

        let mid = if n == 2 {
            1
        } else {
            match self.split_method {
                SplitMethod::Naive => split_median(items),
                SplitMethod::Sah => split_sah(items, &bounds).unwrap_or_else(|| split_median(items)),
            }
        };

        let (left_items, right_items) = items.split_at_mut(mid);
        let left = self.build_recursive(left_items, offset);
        let right = self.build_recursive(right_items, offset + mid);

        self.push(BvhNode {
            bounds,
            area,
            kind: NodeKind::Interior { left, right },
        })
    }

    fn push(&mut self, node: BvhNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Nearest hit along the ray, or a miss.
    ///
    /// `primitive` of the result is the index of the hit object in the
    /// input given to [`Bvh::build`].
    pub fn intersect(&self, ray: &Ray) -> Intersection<'_> {
        match self.root {
            Some(root) => self.intersect_node(root, ray, ray.dir_is_neg()),
            None => Intersection::miss(),
        }
    }

    fn intersect_node(&self, index: usize, ray: &Ray, dir_is_neg: [bool; 3]) -> Intersection<'_> {
        let node = &self.nodes[index];
        if !node.bounds.intersect_p(ray, ray.direction_inv, dir_is_neg) {
            return Intersection::miss();
        }

        match node.kind {
            NodeKind::Leaf { first, count } => {
                let mut nearest = Intersection::miss();
                for &prim in &self.prim_indices[first..first + count] {
                    let mut hit = self.primitives[prim].intersect(ray);
                    if hit.happened && hit.distance < nearest.distance {
                        hit.primitive = Some(prim);
                        nearest = hit;
                    }
                }
                nearest
            }
            NodeKind::Interior { left, right } => {
                let left = self.intersect_node(left, ray, dir_is_neg);
                let right = self.intersect_node(right, ray, dir_is_neg);
                left.nearer(right)
            }
        }
    }

    /// Ray parameter and input index of the nearest hit.
    pub fn hit(&self, ray: &Ray) -> Option<(f32, usize)> {
        self.root
            .and_then(|root| self.hit_node(root, ray, ray.dir_is_neg()))
    }

    fn hit_node(&self, index: usize, ray: &Ray, dir_is_neg: [bool; 3]) -> Option<(f32, usize)> {
        let node = &self.nodes[index];
        if !node.bounds.intersect_p(ray, ray.direction_inv, dir_is_neg) {
            return None;
        }

        match node.kind {
            NodeKind::Leaf { first, count } => self.prim_indices[first..first + count]
                .iter()
                .filter_map(|&prim| self.primitives[prim].hit(ray).map(|(t, _)| (t, prim)))
                .fold(None, |nearest, candidate| match nearest {
                    Some((t, _)) if t <= candidate.0 => nearest,
                    _ => Some(candidate),
                }),
            NodeKind::Interior { left, right } => {
                match (
                    self.hit_node(left, ray, dir_is_neg),
                    self.hit_node(right, ray, dir_is_neg),
                ) {
                    (Some(l), Some(r)) => Some(if l.0 <= r.0 { l } else { r }),
                    (l, r) => l.or(r),
                }
            }
        }
    }

    /// Sample a point uniformly by area over all primitives.
    ///
    /// Returns the point and its area-measure pdf (`1 / total area`), or
    /// `None` when the tree is empty or has no area.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Option<(Intersection<'_>, f32)> {
        let root = self.root?;
        let total = self.nodes[root].area;
        if !(total > 0.0) {
            return None;
        }

        let mut p = gen_f32(rng) * total;
        let mut index = root;
        let prim = loop {
            let node = &self.nodes[index];
            match node.kind {
                NodeKind::Interior { left, right } => {
                    let left_area = self.nodes[left].area;
                    if p < left_area {
                        index = left;
                    } else {
                        p -= left_area;
                        index = right;
                    }
                }
                NodeKind::Leaf { first, count } => {
                    let range = &self.prim_indices[first..first + count];
                    let mut chosen = range[count - 1];
                    for &prim in range {
                        let area = self.primitives[prim].area();
                        if p < area {
                            chosen = prim;
                            break;
                        }
                        p -= area;
                    }
                    break chosen;
                }
            }
        };

        let (mut sample, _) = self.primitives[prim].sample(rng);
        sample.primitive = Some(prim);
        Some((sample, 1.0 / total))
    }

    /// Bounds of the whole tree (empty when there are no primitives).
    pub fn bounds(&self) -> Bounds3 {
        self.root
            .map_or(Bounds3::EMPTY, |root| self.nodes[root].bounds)
    }

    /// Total surface area of all primitives.
    pub fn area(&self) -> f32 {
        self.root.map_or(0.0, |root| self.nodes[root].area)
    }

    /// Primitives in the order they were given to [`Bvh::build`].
    pub fn primitives(&self) -> &[O] {
        &self.primitives
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_prims_in_node(&self) -> usize {
        self.max_prims_in_node
    }
}

/// Stable sort by centroid on the axis of largest centroid spread and
/// split at the middle.
fn split_median(items: &mut [BuildItem]) -> usize {
    let centroid_bounds = centroid_bounds(items);
    let axis = centroid_bounds.max_extent();
    items.sort_by(|a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
    items.len() / 2
}

/// Bucketed surface-area heuristic over all three axes.
///
/// Returns the split position after stably partitioning `items`, or `None`
/// when no bucket boundary leaves primitives on both sides.
fn split_sah(items: &mut [BuildItem], bounds: &Bounds3) -> Option<usize> {
    let centroid_bounds = centroid_bounds(items);
    let total_area = bounds.surface_area().max(f32::MIN_POSITIVE);

    // (cost, axis, last bucket on the left)
    let mut best: Option<(f32, usize, usize)> = None;

    for axis in 0..3 {
        let lo = centroid_bounds.axis_min(axis);
        let extent = centroid_bounds.axis_max(axis) - lo;
        if !(extent > 0.0) {
            continue;
        }

        let mut buckets = [SahBucket::default(); SAH_BUCKETS];
        for item in items.iter() {
            let bucket = &mut buckets[bucket_index(item.centroid[axis], lo, extent)];
            bucket.count += 1;
            bucket.bounds = bucket.bounds.union(&item.bounds);
        }

        // suffix[i] covers buckets i..
        let mut suffix = [SahBucket::default(); SAH_BUCKETS];
        let mut acc = SahBucket::default();
        for i in (0..SAH_BUCKETS).rev() {
            acc.count += buckets[i].count;
            acc.bounds = acc.bounds.union(&buckets[i].bounds);
            suffix[i] = acc;
        }

        let mut prefix = SahBucket::default();
        for split in 0..SAH_BUCKETS - 1 {
            prefix.count += buckets[split].count;
            prefix.bounds = prefix.bounds.union(&buckets[split].bounds);
            let right = suffix[split + 1];
            if prefix.count == 0 || right.count == 0 {
                continue;
            }

            let cost = prefix.bounds.surface_area() / total_area * prefix.count as f32
                + right.bounds.surface_area() / total_area * right.count as f32;
            if best.map_or(true, |(best_cost, _, _)| cost < best_cost) {
                best = Some((cost, axis, split));
            }
        }
    }

    let (_, axis, split) = best?;
    let lo = centroid_bounds.axis_min(axis);
    let extent = centroid_bounds.axis_max(axis) - lo;

    let (left, right): (Vec<BuildItem>, Vec<BuildItem>) = items
        .iter()
        .copied()
        .partition(|item| bucket_index(item.centroid[axis], lo, extent) <= split);
    let mid = left.len();
    items[..mid].copy_from_slice(&left);
    items[mid..].copy_from_slice(&right);
    Some(mid)
}

fn centroid_bounds(items: &[BuildItem]) -> Bounds3 {
    items
        .iter()
        .fold(Bounds3::EMPTY, |acc, item| acc.union_point(item.centroid))
}

#[inline]
fn bucket_index(c: f32, lo: f32, extent: f32) -> usize {
    let b = ((c - lo) / extent * SAH_BUCKETS as f32) as usize;
    b.min(SAH_BUCKETS - 1)
}
