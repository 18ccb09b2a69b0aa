use impulse_arena::Arena;

use crate::cascade;
use crate::dynamics::{JointSet, RigidBody, RigidBodyDesc};
use crate::error::{EntityKind, PhysicsError, Result};
use crate::geometry::ColliderSet;
use crate::handle::entity_handle;

entity_handle!(
    /// Handle to a rigid body in a [`RigidBodySet`].
    RigidBodyHandle
);

/// Owner of every rigid body in a simulation.
#[derive(Clone, Debug, Default)]
pub struct RigidBodySet {
    pub(crate) bodies: Arena<RigidBody>,
}

impl RigidBodySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Returns true if the set holds no body.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Returns true if `handle` refers to a live body.
    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    /// Validates `desc` and inserts the body it describes.
    pub fn insert(&mut self, desc: RigidBodyDesc) -> Result<RigidBodyHandle> {
        desc.validate()?;
        Ok(RigidBodyHandle(self.bodies.insert(desc.build())))
    }

    /// Removes a body together with its colliders and every joint attached to it.
    ///
    /// Either everything is removed or, on error, nothing is. Broad and narrow
    /// phase state for the removed colliders is purged at the start of the
    /// next step.
    pub fn remove(
        &mut self,
        handle: RigidBodyHandle,
        colliders: &mut ColliderSet,
        joints: &mut JointSet,
    ) -> Result<RigidBody> {
        cascade::remove_rigid_body(handle, self, colliders, joints).map(|removal| removal.body)
    }

    /// Shared access; `None` for a stale handle.
    pub fn get(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        let result = self.bodies.get(handle.0);
        if cfg!(debug_assertions) && result.is_none() {
            log::warn!("access through stale rigid body handle {handle:?}");
        }
        result
    }

    /// Exclusive access; `None` for a stale handle.
    pub fn get_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        let result = self.bodies.get_mut(handle.0);
        if cfg!(debug_assertions) && result.is_none() {
            log::warn!("access through stale rigid body handle {handle:?}");
        }
        result
    }

    /// Shared access that reports stale handles.
    pub fn try_get(&self, handle: RigidBodyHandle) -> Result<&RigidBody> {
        self.bodies
            .get(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::RigidBody, handle))
    }

    /// Exclusive access that reports stale handles.
    pub fn try_get_mut(&mut self, handle: RigidBodyHandle) -> Result<&mut RigidBody> {
        self.bodies
            .get_mut(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::RigidBody, handle))
    }

    /// Exclusive access to two distinct bodies.
    pub fn get2_mut(
        &mut self,
        h1: RigidBodyHandle,
        h2: RigidBodyHandle,
    ) -> (Option<&mut RigidBody>, Option<&mut RigidBody>) {
        self.bodies.get2_mut(h1.0, h2.0)
    }

    /// Iterates bodies in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (RigidBodyHandle, &RigidBody)> {
        self.bodies.iter().map(|(i, b)| (RigidBodyHandle(i), b))
    }

    /// Iterates bodies mutably in handle order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RigidBodyHandle, &mut RigidBody)> {
        self.bodies.iter_mut().map(|(i, b)| (RigidBodyHandle(i), b))
    }

    /// Iterates body handles in order.
    pub fn handles(&self) -> impl Iterator<Item = RigidBodyHandle> + '_ {
        self.bodies.indices().map(RigidBodyHandle)
    }

    /// Iterates bodies that are neither static nor asleep.
    pub fn iter_active(&self) -> impl Iterator<Item = (RigidBodyHandle, &RigidBody)> {
        self.iter().filter(|(_, b)| is_active(b))
    }

    /// Handles of bodies that are neither static nor asleep.
    pub fn active_handles(&self) -> impl Iterator<Item = RigidBodyHandle> + '_ {
        self.iter_active().map(|(h, _)| h)
    }

    pub(crate) fn iter_active_mut(
        &mut self,
    ) -> impl Iterator<Item = (RigidBodyHandle, &mut RigidBody)> {
        self.iter_mut().filter(|(_, b)| is_active(b))
    }

    pub(crate) fn lookup(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0)
    }

    pub(crate) fn lookup_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0)
    }
}

fn is_active(body: &RigidBody) -> bool {
    !body.is_static() && !body.is_sleeping()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::BodyStatus;
    use crate::math::{Real, Vector};

    #[test]
    fn test_insert_and_get() {
        let mut bodies = RigidBodySet::new();
        let handle = bodies
            .insert(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 5.0, 0.0)))
            .unwrap();

        assert_eq!(bodies.len(), 1);
        assert!(bodies.contains(handle));
        let body = bodies.get(handle).unwrap();
        assert_eq!(body.translation().y, 5.0);
        assert_eq!(body.status(), BodyStatus::Dynamic);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let mut joints = JointSet::new();

        let old = bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        bodies.remove(old, &mut colliders, &mut joints).unwrap();
        let new = bodies.insert(RigidBodyDesc::kinematic()).unwrap();

        assert_ne!(old, new);
        assert!(!bodies.contains(old));
        assert!(bodies.get(old).is_none());
        assert!(bodies.get_mut(old).is_none());
        assert!(matches!(
            bodies.try_get(old),
            Err(PhysicsError::StaleHandle {
                kind: EntityKind::RigidBody,
                ..
            })
        ));
        assert!(bodies.remove(old, &mut colliders, &mut joints).is_err());
        assert!(bodies.get(new).unwrap().is_kinematic());
    }

    #[test]
    fn test_degenerate_descriptor_rejected() {
        let mut bodies = RigidBodySet::new();
        let err = bodies
            .insert(RigidBodyDesc::dynamic().mass(Real::NAN, true))
            .unwrap_err();
        assert!(matches!(err, PhysicsError::DegenerateInput(_)));
        assert!(bodies.is_empty());
    }

    #[test]
    fn test_active_iteration_excludes_static_and_sleeping() {
        let mut bodies = RigidBodySet::new();
        let awake = bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let _asleep = bodies.insert(RigidBodyDesc::dynamic().sleeping(true)).unwrap();
        let _ground = bodies.insert(RigidBodyDesc::new_static()).unwrap();
        let kinematic = bodies.insert(RigidBodyDesc::kinematic()).unwrap();

        let active: Vec<_> = bodies.active_handles().collect();
        assert_eq!(active, vec![awake, kinematic]);
        assert_eq!(bodies.handles().count(), 4);
        // Restartable.
        assert_eq!(bodies.active_handles().count(), 2);
    }
}
