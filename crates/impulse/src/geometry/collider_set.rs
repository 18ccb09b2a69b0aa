use impulse_arena::Arena;

use crate::dynamics::{RigidBody, RigidBodyHandle, RigidBodySet};
use crate::error::{EntityKind, PhysicsError, Result};
use crate::geometry::{Collider, ColliderDesc};
use crate::handle::entity_handle;
use crate::math::Real;

entity_handle!(
    /// Handle to a collider in a [`ColliderSet`].
    ColliderHandle
);

/// Owner of every collider in a simulation.
#[derive(Clone, Debug, Default)]
pub struct ColliderSet {
    pub(crate) colliders: Arena<Collider>,
    /// Removed since the last step; purged from the broad and narrow phase
    /// at the start of the next one.
    pub(crate) removed: Vec<ColliderHandle>,
}

impl ColliderSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of colliders.
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    /// Returns true if the set holds no collider.
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Returns true if `handle` refers to a live collider.
    pub fn contains(&self, handle: ColliderHandle) -> bool {
        self.colliders.contains(handle.0)
    }

    /// Inserts a collider fixed in the world.
    pub fn insert(&mut self, desc: ColliderDesc) -> Result<ColliderHandle> {
        desc.validate()?;
        Ok(ColliderHandle(self.colliders.insert(desc.build(None))))
    }

    /// Inserts a collider attached to `parent`.
    ///
    /// The parent's mass properties are recomputed and the parent is woken.
    pub fn insert_with_parent(
        &mut self,
        desc: ColliderDesc,
        parent: RigidBodyHandle,
        bodies: &mut RigidBodySet,
    ) -> Result<ColliderHandle> {
        desc.validate()?;
        let body = bodies
            .lookup_mut(parent)
            .ok_or_else(|| PhysicsError::stale(EntityKind::RigidBody, parent))?;

        let mut collider = desc.build(Some(parent));
        collider.position = body.position * collider.position_wrt_parent;
        let handle = ColliderHandle(self.colliders.insert(collider));

        body.colliders.push(handle);
        self.recompute_body_mass(body);
        body.wake_up(true);

        Ok(handle)
    }

    /// Removes a collider, detaching it from its parent.
    ///
    /// Broad and narrow phase state referencing the collider is purged at the
    /// start of the next step; use `PhysicsPipeline::remove_collider` to
    /// purge it immediately.
    pub fn remove(
        &mut self,
        handle: ColliderHandle,
        bodies: &mut RigidBodySet,
        wake_up: bool,
    ) -> Result<Collider> {
        let parent = match self.colliders.get(handle.0) {
            Some(collider) => collider.parent,
            None => return Err(PhysicsError::stale(EntityKind::Collider, handle)),
        };

        if let Some(parent) = parent {
            let listed = bodies
                .lookup(parent)
                .is_some_and(|body| body.colliders.contains(&handle));
            if !listed {
                return Err(PhysicsError::InvariantViolation(format!(
                    "collider {handle:?} names parent {parent:?}, which does not list it"
                )));
            }
        }

        let collider = self
            .colliders
            .remove(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::Collider, handle))?;
        self.removed.push(handle);

        if let Some(body) = parent.and_then(|p| bodies.lookup_mut(p)) {
            body.colliders.retain(|h| *h != handle);
            self.recompute_body_mass(body);
            if wake_up {
                body.wake_up(true);
            }
        }

        log::debug!("removed collider {handle:?}");
        Ok(collider)
    }

    /// Changes a collider's density and recomputes its parent's mass.
    pub fn set_density(
        &mut self,
        handle: ColliderHandle,
        density: Option<Real>,
        bodies: &mut RigidBodySet,
    ) -> Result<()> {
        if let Some(d) = density {
            if !(d.is_finite() && d >= 0.0) {
                return Err(PhysicsError::DegenerateInput(format!(
                    "density must be non-negative and finite, got {d}"
                )));
            }
        }

        let collider = self.try_get_mut(handle)?;
        collider.density = density;
        let parent = collider.parent;

        if let Some(body) = parent.and_then(|p| bodies.lookup_mut(p)) {
            self.recompute_body_mass(body);
            body.wake_up(true);
        }
        Ok(())
    }

    /// Shared access; `None` for a stale handle.
    pub fn get(&self, handle: ColliderHandle) -> Option<&Collider> {
        let result = self.colliders.get(handle.0);
        if cfg!(debug_assertions) && result.is_none() {
            log::warn!("access through stale collider handle {handle:?}");
        }
        result
    }

    /// Exclusive access; `None` for a stale handle.
    pub fn get_mut(&mut self, handle: ColliderHandle) -> Option<&mut Collider> {
        let result = self.colliders.get_mut(handle.0);
        if cfg!(debug_assertions) && result.is_none() {
            log::warn!("access through stale collider handle {handle:?}");
        }
        result
    }

    /// Shared access that reports stale handles.
    pub fn try_get(&self, handle: ColliderHandle) -> Result<&Collider> {
        self.colliders
            .get(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::Collider, handle))
    }

    /// Exclusive access that reports stale handles.
    pub fn try_get_mut(&mut self, handle: ColliderHandle) -> Result<&mut Collider> {
        self.colliders
            .get_mut(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::Collider, handle))
    }

    /// Iterates colliders in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (ColliderHandle, &Collider)> {
        self.colliders.iter().map(|(i, c)| (ColliderHandle(i), c))
    }

    /// Iterates collider handles in order.
    pub fn handles(&self) -> impl Iterator<Item = ColliderHandle> + '_ {
        self.colliders.indices().map(ColliderHandle)
    }

    pub(crate) fn lookup(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle.0)
    }

    pub(crate) fn take_removed(&mut self) -> Vec<ColliderHandle> {
        std::mem::take(&mut self.removed)
    }

    /// Moves attached colliders to follow their parent bodies.
    pub(crate) fn sync_positions(&mut self, bodies: &RigidBodySet) {
        for (_, collider) in self.colliders.iter_mut() {
            if let Some(body) = collider.parent.and_then(|p| bodies.lookup(p)) {
                collider.position = body.position * collider.position_wrt_parent;
            }
        }
    }

    pub(crate) fn recompute_body_mass(&self, body: &mut RigidBody) {
        let contributions: Vec<_> = body
            .colliders
            .iter()
            .filter_map(|h| self.colliders.get(h.0))
            .map(Collider::mass_properties)
            .collect();
        body.set_collider_mass_contributions(contributions.into_iter());
    }
}
