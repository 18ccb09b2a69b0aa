//! Broad phase: a dynamic AABB tree over collider bounding boxes.
//!
//! Leaves store boxes enlarged by a margin, so a collider that moves a
//! little stays in its leaf and costs nothing. A leaf is reinserted only
//! when the collider's tight box escapes the enlarged one.

use std::collections::{BTreeSet, HashMap, HashSet};

use parry3d::bounding_volume::{Aabb, BoundingVolume};

use crate::dynamics::IntegrationParameters;
use crate::geometry::{ColliderHandle, ColliderSet};

const NULL_NODE: u32 = u32::MAX;

/// Unordered pair of colliders, stored with the smaller handle first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColliderPair {
    /// Smaller handle.
    pub collider1: ColliderHandle,
    /// Larger handle.
    pub collider2: ColliderHandle,
}

impl ColliderPair {
    /// Builds the canonical pair for two colliders.
    pub fn new(a: ColliderHandle, b: ColliderHandle) -> Self {
        if a <= b {
            Self {
                collider1: a,
                collider2: b,
            }
        } else {
            Self {
                collider1: b,
                collider2: a,
            }
        }
    }

    /// Returns true if `handle` is one of the two colliders.
    pub fn contains(&self, handle: ColliderHandle) -> bool {
        self.collider1 == handle || self.collider2 == handle
    }
}

/// Change in the set of potentially overlapping pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BroadPhasePairEvent {
    /// The pair's enlarged boxes started overlapping.
    AddPair(ColliderPair),
    /// The pair's enlarged boxes stopped overlapping.
    DeletePair(ColliderPair),
}

#[derive(Debug, Clone)]
struct TreeNode {
    aabb: Aabb,
    parent: u32,
    left: u32,
    right: u32,
    height: i32,
    collider: Option<ColliderHandle>,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.collider.is_some()
    }
}

/// Dynamic AABB tree tracking overlapping collider pairs across steps.
#[derive(Debug, Clone, Default)]
pub struct BroadPhase {
    nodes: Vec<TreeNode>,
    root: Option<u32>,
    leaves: HashMap<ColliderHandle, u32>,
    free_list: Vec<u32>,
    pairs: BTreeSet<ColliderPair>,
}

impl BroadPhase {
    /// Creates an empty broad phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked colliders.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns true if no collider is tracked.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Currently overlapping pairs, in handle order.
    pub fn pairs(&self) -> impl Iterator<Item = &ColliderPair> {
        self.pairs.iter()
    }

    /// Reconciles the tree with the collider set and reports pair changes.
    ///
    /// `DeletePair` events come first, then `AddPair` events, each sorted by
    /// pair.
    pub fn update(
        &mut self,
        params: &IntegrationParameters,
        colliders: &ColliderSet,
    ) -> Vec<BroadPhasePairEvent> {
        let stale: Vec<ColliderHandle> = self
            .leaves
            .keys()
            .copied()
            .filter(|h| !colliders.contains(*h))
            .collect();
        for handle in stale {
            self.remove_collider(handle);
        }

        let mut moved = Vec::new();
        for (handle, collider) in colliders.iter() {
            let aabb = collider.compute_aabb().loosened(params.prediction_distance);
            match self.leaves.get(&handle).copied() {
                Some(leaf) if self.nodes[leaf as usize].aabb.contains(&aabb) => {}
                Some(_) => {
                    self.remove_leaf(handle);
                    self.insert_leaf(handle, aabb.loosened(params.broad_phase_margin));
                    moved.push(handle);
                }
                None => {
                    self.insert_leaf(handle, aabb.loosened(params.broad_phase_margin));
                    moved.push(handle);
                }
            }
        }

        if moved.is_empty() {
            return Vec::new();
        }

        let moved_set: HashSet<ColliderHandle> = moved.iter().copied().collect();
        let mut deleted = Vec::new();
        for pair in &self.pairs {
            if !(moved_set.contains(&pair.collider1) || moved_set.contains(&pair.collider2)) {
                continue;
            }
            if !self.leaf_aabbs_overlap(pair) {
                deleted.push(*pair);
            }
        }
        for pair in &deleted {
            self.pairs.remove(pair);
        }

        let mut added = BTreeSet::new();
        for &handle in &moved {
            let Some(&leaf) = self.leaves.get(&handle) else {
                continue;
            };
            let aabb = self.nodes[leaf as usize].aabb;
            self.query_aabb(&aabb, |other| {
                if other != handle {
                    added.insert(ColliderPair::new(handle, other));
                }
            });
        }

        let same_parent = |pair: &ColliderPair| {
            let p1 = colliders.lookup(pair.collider1).and_then(|c| c.parent);
            let p2 = colliders.lookup(pair.collider2).and_then(|c| c.parent);
            p1.is_some() && p1 == p2
        };

        let mut events: Vec<_> = deleted
            .into_iter()
            .map(BroadPhasePairEvent::DeletePair)
            .collect();
        for pair in added {
            if same_parent(&pair) || !self.pairs.insert(pair) {
                continue;
            }
            events.push(BroadPhasePairEvent::AddPair(pair));
        }

        log::trace!(
            "broad phase: {} leaves, {} moved, {} pairs, {} events",
            self.leaves.len(),
            moved.len(),
            self.pairs.len(),
            events.len()
        );
        events
    }

    /// Forgets a collider and every pair it belongs to.
    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        self.remove_leaf(handle);
        self.pairs.retain(|pair| !pair.contains(handle));
    }

    /// Visits every tracked collider whose enlarged box intersects `aabb`.
    pub fn query_aabb(&self, aabb: &Aabb, mut visit: impl FnMut(ColliderHandle)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current as usize];
            if !node.aabb.intersects(aabb) {
                continue;
            }
            match node.collider {
                Some(handle) => visit(handle),
                None => {
                    stack.push(node.left);
                    stack.push(node.right);
                }
            }
        }
    }

    fn leaf_aabbs_overlap(&self, pair: &ColliderPair) -> bool {
        match (self.leaves.get(&pair.collider1), self.leaves.get(&pair.collider2)) {
            (Some(&a), Some(&b)) => self.nodes[a as usize]
                .aabb
                .intersects(&self.nodes[b as usize].aabb),
            _ => false,
        }
    }

    fn insert_leaf(&mut self, handle: ColliderHandle, fat_aabb: Aabb) {
        let leaf = self.allocate_node(TreeNode {
            aabb: fat_aabb,
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: 0,
            collider: Some(handle),
        });
        self.leaves.insert(handle, leaf);

        let Some(root) = self.root else {
            self.root = Some(leaf);
            return;
        };

        let sibling = self.find_best_sibling(root, &fat_aabb);
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.allocate_node(TreeNode {
            aabb: fat_aabb.merged(&self.nodes[sibling as usize].aabb),
            parent: old_parent,
            left: sibling,
            right: leaf,
            height: 0,
            collider: None,
        });
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        if old_parent == NULL_NODE {
            self.root = Some(new_parent);
        } else {
            let old = &mut self.nodes[old_parent as usize];
            if old.left == sibling {
                old.left = new_parent;
            } else {
                old.right = new_parent;
            }
        }

        self.refit(new_parent);
    }

    fn remove_leaf(&mut self, handle: ColliderHandle) {
        let Some(leaf) = self.leaves.remove(&handle) else {
            return;
        };

        if self.root == Some(leaf) {
            self.root = None;
            self.free_list.push(leaf);
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == leaf {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grandparent == NULL_NODE {
            self.root = Some(sibling);
            self.nodes[sibling as usize].parent = NULL_NODE;
        } else {
            let gp = &mut self.nodes[grandparent as usize];
            if gp.left == parent {
                gp.left = sibling;
            } else {
                gp.right = sibling;
            }
            self.nodes[sibling as usize].parent = grandparent;
            self.refit(grandparent);
        }

        self.free_list.push(leaf);
        self.free_list.push(parent);
    }

    fn allocate_node(&mut self, node: TreeNode) -> u32 {
        match self.free_list.pop() {
            Some(index) => {
                self.nodes[index as usize] = node;
                index
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    /// Branch-and-bound search for the node whose merge with `aabb` grows
    /// the tree's surface area the least.
    fn find_best_sibling(&self, root: u32, aabb: &Aabb) -> u32 {
        let mut best = root;
        let mut best_cost = surface_area(&aabb.merged(&self.nodes[root as usize].aabb));
        let mut stack = vec![(root, 0.0)];

        while let Some((current, inherited)) = stack.pop() {
            let node = &self.nodes[current as usize];
            let merged_area = surface_area(&aabb.merged(&node.aabb));
            let cost = merged_area + inherited;
            if cost < best_cost {
                best = current;
                best_cost = cost;
            }

            if !node.is_leaf() {
                let child_inherited = inherited + merged_area - surface_area(&node.aabb);
                let lower_bound = surface_area(aabb) + child_inherited;
                if lower_bound < best_cost {
                    stack.push((node.left, child_inherited));
                    stack.push((node.right, child_inherited));
                }
            }
        }

        best
    }

    fn refit(&mut self, start: u32) {
        let mut current = start;
        while current != NULL_NODE {
            let node = &self.nodes[current as usize];
            if !node.is_leaf() {
                let (left, right) = (node.left as usize, node.right as usize);
                let aabb = self.nodes[left].aabb.merged(&self.nodes[right].aabb);
                let height = 1 + self.nodes[left].height.max(self.nodes[right].height);
                let node = &mut self.nodes[current as usize];
                node.aabb = aabb;
                node.height = height;
            }
            current = self.nodes[current as usize].parent;
        }
    }
}

fn surface_area(aabb: &Aabb) -> f32 {
    let e = aabb.extents();
    2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{RigidBodyDesc, RigidBodySet};
    use crate::geometry::ColliderDesc;
    use crate::math::Vector;

    fn setup() -> (IntegrationParameters, RigidBodySet, ColliderSet, BroadPhase) {
        (
            IntegrationParameters::default(),
            RigidBodySet::new(),
            ColliderSet::new(),
            BroadPhase::new(),
        )
    }

    fn ball_at(colliders: &mut ColliderSet, x: f32) -> ColliderHandle {
        colliders
            .insert(ColliderDesc::ball(0.5).translation(Vector::new(x, 0.0, 0.0)))
            .unwrap()
    }

    #[test]
    fn test_overlapping_pair_reported_once() {
        let (params, _bodies, mut colliders, mut bf) = setup();
        let a = ball_at(&mut colliders, 0.0);
        let b = ball_at(&mut colliders, 0.8);
        let _far = ball_at(&mut colliders, 10.0);

        let events = bf.update(&params, &colliders);
        assert_eq!(
            events,
            vec![BroadPhasePairEvent::AddPair(ColliderPair::new(a, b))]
        );

        // Nothing moved: nothing to report.
        assert!(bf.update(&params, &colliders).is_empty());
        assert_eq!(bf.pairs().count(), 1);
    }

    #[test]
    fn test_pair_added_and_deleted_as_bodies_approach_and_separate() {
        let (params, mut bodies, mut colliders, mut bf) = setup();
        let body = bodies
            .insert(RigidBodyDesc::kinematic().translation(Vector::new(5.0, 0.0, 0.0)))
            .unwrap();
        let moving = colliders
            .insert_with_parent(ColliderDesc::ball(0.5), body, &mut bodies)
            .unwrap();
        let fixed = ball_at(&mut colliders, 0.0);
        assert!(bf.update(&params, &colliders).is_empty());

        let move_to = |bodies: &mut RigidBodySet, colliders: &mut ColliderSet, x: f32| {
            bodies
                .get_mut(body)
                .unwrap()
                .set_translation(Vector::new(x, 0.0, 0.0), true);
            colliders.sync_positions(bodies);
        };

        move_to(&mut bodies, &mut colliders, 0.5);
        let events = bf.update(&params, &colliders);
        assert_eq!(
            events,
            vec![BroadPhasePairEvent::AddPair(ColliderPair::new(fixed, moving))]
        );

        move_to(&mut bodies, &mut colliders, 8.0);
        let events = bf.update(&params, &colliders);
        assert_eq!(
            events,
            vec![BroadPhasePairEvent::DeletePair(ColliderPair::new(fixed, moving))]
        );
    }

    #[test]
    fn test_colliders_on_same_body_never_pair() {
        let (params, mut bodies, mut colliders, mut bf) = setup();
        let body = bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        for _ in 0..2 {
            colliders
                .insert_with_parent(ColliderDesc::ball(0.5), body, &mut bodies)
                .unwrap();
        }
        assert!(bf.update(&params, &colliders).is_empty());
    }

    #[test]
    fn test_removed_collider_purged() {
        let (params, mut bodies, mut colliders, mut bf) = setup();
        let a = ball_at(&mut colliders, 0.0);
        let _b = ball_at(&mut colliders, 0.5);
        bf.update(&params, &colliders);
        assert_eq!(bf.len(), 2);

        colliders.remove(a, &mut bodies, true).unwrap();
        bf.update(&params, &colliders);
        assert_eq!(bf.len(), 1);
        assert_eq!(bf.pairs().count(), 0);
    }

    #[test]
    fn test_many_colliders_match_brute_force() {
        let (params, _bodies, mut colliders, mut bf) = setup();
        let mut handles = Vec::new();
        for i in 0..40 {
            let x = (i % 8) as f32 * 0.9;
            let y = (i / 8) as f32 * 0.9;
            handles.push(
                colliders
                    .insert(ColliderDesc::ball(0.5).translation(Vector::new(x, y, 0.0)))
                    .unwrap(),
            );
        }
        bf.update(&params, &colliders);

        let fat = |h: ColliderHandle| {
            colliders
                .get(h)
                .unwrap()
                .compute_aabb()
                .loosened(params.prediction_distance + params.broad_phase_margin)
        };
        let mut expected = BTreeSet::new();
        for (i, &a) in handles.iter().enumerate() {
            for &b in &handles[i + 1..] {
                if fat(a).intersects(&fat(b)) {
                    expected.insert(ColliderPair::new(a, b));
                }
            }
        }
        let actual: BTreeSet<_> = bf.pairs().copied().collect();
        assert_eq!(actual, expected);
    }
}
