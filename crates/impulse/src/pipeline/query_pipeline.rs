//! Scene queries over a caller-refreshed bounding volume hierarchy.
//!
//! The hierarchy is rebuilt from scratch by [`QueryPipeline::update`] and is
//! otherwise left alone: poses that changed since the last update are not
//! seen by queries until the caller refreshes it.

use parry3d::bounding_volume::{Aabb, BoundingVolume};
use parry3d::query::{Ray, RayCast};

use crate::dynamics::RigidBodySet;
use crate::geometry::{ColliderHandle, ColliderSet};
use crate::math::{Isometry, Real, Vector};

/// Leaves hold at most this many colliders.
const MAX_LEAF_SIZE: usize = 4;

/// Closest hit of a ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayColliderHit {
    /// The collider that was hit.
    pub collider: ColliderHandle,
    /// Hit point is `ray.origin + ray.dir * toi`.
    pub toi: Real,
    /// World-space surface normal at the hit point.
    pub normal: Vector<Real>,
}

#[derive(Clone, Debug)]
struct QueryProxy {
    collider: ColliderHandle,
    position: Isometry<Real>,
    aabb: Aabb,
}

#[derive(Clone, Debug)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        proxies: Vec<usize>,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Spatial index answering ray and box queries against colliders.
#[derive(Clone, Debug, Default)]
pub struct QueryPipeline {
    proxies: Vec<QueryProxy>,
    root: Option<BvhNode>,
}

impl QueryPipeline {
    /// Creates an empty query pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of colliders indexed by the last update.
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Returns true if the last update indexed nothing.
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Rebuilds the hierarchy from the current collider poses.
    ///
    /// Attached colliders are placed from their parent's current position,
    /// so bodies teleported since the last step are seen where they are now.
    pub fn update(&mut self, bodies: &RigidBodySet, colliders: &ColliderSet) {
        self.proxies = colliders
            .iter()
            .map(|(handle, collider)| {
                let position = collider
                    .parent
                    .and_then(|p| bodies.lookup(p))
                    .map_or(collider.position, |body| {
                        body.position * collider.position_wrt_parent
                    });
                QueryProxy {
                    collider: handle,
                    position,
                    aabb: collider.shape.compute_aabb(&position),
                }
            })
            .collect();

        let mut indices: Vec<usize> = (0..self.proxies.len()).collect();
        self.root = if indices.is_empty() {
            None
        } else {
            Some(build_node(&self.proxies, &mut indices))
        };
        log::trace!("query pipeline rebuilt over {} colliders", self.proxies.len());
    }

    /// Closest collider hit by `ray` with `toi <= max_toi`.
    ///
    /// Equal times of impact resolve to the smallest collider handle.
    /// Colliders removed since the last update are skipped.
    pub fn cast_ray(
        &self,
        colliders: &ColliderSet,
        ray: &Ray,
        max_toi: Real,
    ) -> Option<RayColliderHit> {
        let mut best = None;
        if let Some(root) = &self.root {
            self.cast_node_closest(colliders, root, ray, max_toi, &mut best);
        }
        best
    }

    /// Visits every collider hit by `ray` with `toi <= max_toi`, in no
    /// particular order.
    pub fn intersections_with_ray(
        &self,
        colliders: &ColliderSet,
        ray: &Ray,
        max_toi: Real,
        mut visit: impl FnMut(RayColliderHit),
    ) {
        if let Some(root) = &self.root {
            self.cast_node_all(colliders, root, ray, max_toi, &mut visit);
        }
    }

    /// Visits every collider whose bounding box, as of the last update,
    /// intersects `aabb`.
    pub fn colliders_with_aabb_intersecting_aabb(
        &self,
        aabb: &Aabb,
        mut visit: impl FnMut(ColliderHandle),
    ) {
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if !node.aabb().intersects(aabb) {
                continue;
            }
            match node {
                BvhNode::Leaf { proxies, .. } => {
                    for &i in proxies {
                        let proxy = &self.proxies[i];
                        if proxy.aabb.intersects(aabb) {
                            visit(proxy.collider);
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    fn cast_proxy(
        &self,
        colliders: &ColliderSet,
        proxy: &QueryProxy,
        ray: &Ray,
        max_toi: Real,
    ) -> Option<RayColliderHit> {
        let collider = colliders.lookup(proxy.collider)?;
        let hit = collider
            .shape
            .as_parry()
            .cast_ray_and_get_normal(&proxy.position, ray, max_toi, true)?;
        Some(RayColliderHit {
            collider: proxy.collider,
            toi: hit.time_of_impact,
            normal: hit.normal,
        })
    }

    fn cast_node_closest(
        &self,
        colliders: &ColliderSet,
        node: &BvhNode,
        ray: &Ray,
        max_toi: Real,
        best: &mut Option<RayColliderHit>,
    ) {
        let limit = best.map_or(max_toi, |b| b.toi);
        // Boxes entered exactly at the best toi are still visited: they may
        // hold a smaller handle.
        if node.aabb().cast_local_ray(ray, limit, true).is_none() {
            return;
        }

        match node {
            BvhNode::Leaf { proxies, .. } => {
                for &i in proxies {
                    let limit = best.map_or(max_toi, |b| b.toi);
                    let Some(hit) = self.cast_proxy(colliders, &self.proxies[i], ray, limit)
                    else {
                        continue;
                    };
                    let better = match best {
                        None => true,
                        Some(b) => {
                            hit.toi < b.toi || (hit.toi == b.toi && hit.collider < b.collider)
                        }
                    };
                    if better {
                        *best = Some(hit);
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                let left_t = left.aabb().cast_local_ray(ray, limit, true);
                let right_t = right.aabb().cast_local_ray(ray, limit, true);
                match (left_t, right_t) {
                    (Some(lt), Some(rt)) if rt < lt => {
                        self.cast_node_closest(colliders, right, ray, max_toi, best);
                        self.cast_node_closest(colliders, left, ray, max_toi, best);
                    }
                    (Some(_), _) => {
                        self.cast_node_closest(colliders, left, ray, max_toi, best);
                        self.cast_node_closest(colliders, right, ray, max_toi, best);
                    }
                    (None, Some(_)) => {
                        self.cast_node_closest(colliders, right, ray, max_toi, best);
                    }
                    (None, None) => {}
                }
            }
        }
    }

    fn cast_node_all(
        &self,
        colliders: &ColliderSet,
        node: &BvhNode,
        ray: &Ray,
        max_toi: Real,
        visit: &mut impl FnMut(RayColliderHit),
    ) {
        if node.aabb().cast_local_ray(ray, max_toi, true).is_none() {
            return;
        }
        match node {
            BvhNode::Leaf { proxies, .. } => {
                for &i in proxies {
                    if let Some(hit) = self.cast_proxy(colliders, &self.proxies[i], ray, max_toi) {
                        visit(hit);
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                self.cast_node_all(colliders, left, ray, max_toi, visit);
                self.cast_node_all(colliders, right, ray, max_toi, visit);
            }
        }
    }
}

/// Top-down build splitting at the median centroid along the widest axis.
fn build_node(proxies: &[QueryProxy], indices: &mut [usize]) -> BvhNode {
    let aabb = indices
        .iter()
        .map(|&i| proxies[i].aabb)
        .reduce(|a, b| a.merged(&b))
        .unwrap_or_else(Aabb::new_invalid);

    if indices.len() <= MAX_LEAF_SIZE {
        return BvhNode::Leaf {
            aabb,
            proxies: indices.to_vec(),
        };
    }

    let extents = aabb.extents();
    let axis = if extents.x >= extents.y && extents.x >= extents.z {
        0
    } else if extents.y >= extents.z {
        1
    } else {
        2
    };

    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        let ca = proxies[a].aabb.center()[axis];
        let cb = proxies[b].aabb.center()[axis];
        ca.total_cmp(&cb)
    });

    let (left, right) = indices.split_at_mut(mid);
    BvhNode::Internal {
        aabb,
        left: Box::new(build_node(proxies, left)),
        right: Box::new(build_node(proxies, right)),
    }
}
