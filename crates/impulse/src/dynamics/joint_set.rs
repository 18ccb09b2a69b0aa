use std::collections::BTreeMap;

use impulse_arena::Arena;

use crate::dynamics::joint::MAX_JOINT_ROWS;
use crate::dynamics::{Joint, JointParams, RigidBodyHandle, RigidBodySet};
use crate::error::{EntityKind, PhysicsError, Result};
use crate::handle::entity_handle;

entity_handle!(
    /// Handle to a joint in a [`JointSet`].
    JointHandle
);

/// Owner of every joint, with a per-body index for cascading removal.
#[derive(Clone, Debug, Default)]
pub struct JointSet {
    pub(crate) joints: Arena<Joint>,
    pub(crate) body_joints: BTreeMap<RigidBodyHandle, Vec<JointHandle>>,
}

impl JointSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of joints.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// Returns true if the set holds no joint.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Returns true if `handle` refers to a live joint.
    pub fn contains(&self, handle: JointHandle) -> bool {
        self.joints.contains(handle.0)
    }

    /// Links two distinct live bodies and wakes both.
    pub fn insert(
        &mut self,
        bodies: &mut RigidBodySet,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        params: impl Into<JointParams>,
    ) -> Result<JointHandle> {
        let params = params.into();
        params.validate()?;

        for body in [body1, body2] {
            if !bodies.contains(body) {
                return Err(PhysicsError::stale(EntityKind::RigidBody, body));
            }
        }
        if body1 == body2 {
            return Err(PhysicsError::InvalidJoint(format!(
                "joint attaches {body1:?} to itself"
            )));
        }

        let handle = JointHandle(self.joints.insert(Joint {
            body1,
            body2,
            params,
            impulses: [0.0; MAX_JOINT_ROWS],
            user_data: 0,
        }));
        self.body_joints.entry(body1).or_default().push(handle);
        self.body_joints.entry(body2).or_default().push(handle);

        for body in [body1, body2] {
            if let Some(body) = bodies.lookup_mut(body) {
                body.wake_up(true);
            }
        }

        Ok(handle)
    }

    /// Removes a joint.
    pub fn remove(
        &mut self,
        handle: JointHandle,
        bodies: &mut RigidBodySet,
        wake_up: bool,
    ) -> Result<Joint> {
        let joint = self.remove_unchecked(handle)?;
        if wake_up {
            for body in [joint.body1, joint.body2] {
                if let Some(body) = bodies.lookup_mut(body) {
                    body.wake_up(true);
                }
            }
        }
        Ok(joint)
    }

    /// Joints attached to `body`, in insertion order.
    pub fn joints_with(&self, body: RigidBodyHandle) -> impl Iterator<Item = JointHandle> + '_ {
        self.body_joints.get(&body).into_iter().flatten().copied()
    }

    /// Shared access; `None` for a stale handle.
    pub fn get(&self, handle: JointHandle) -> Option<&Joint> {
        let result = self.joints.get(handle.0);
        if cfg!(debug_assertions) && result.is_none() {
            log::warn!("access through stale joint handle {handle:?}");
        }
        result
    }

    /// Exclusive access; `None` for a stale handle.
    pub fn get_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        let result = self.joints.get_mut(handle.0);
        if cfg!(debug_assertions) && result.is_none() {
            log::warn!("access through stale joint handle {handle:?}");
        }
        result
    }

    /// Shared access that reports stale handles.
    pub fn try_get(&self, handle: JointHandle) -> Result<&Joint> {
        self.joints
            .get(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::Joint, handle))
    }

    /// Exclusive access that reports stale handles.
    pub fn try_get_mut(&mut self, handle: JointHandle) -> Result<&mut Joint> {
        self.joints
            .get_mut(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::Joint, handle))
    }

    /// Iterates joints in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints.iter().map(|(i, j)| (JointHandle(i), j))
    }

    /// Iterates joint handles in order.
    pub fn handles(&self) -> impl Iterator<Item = JointHandle> + '_ {
        self.joints.indices().map(JointHandle)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (JointHandle, &mut Joint)> {
        self.joints.iter_mut().map(|(i, j)| (JointHandle(i), j))
    }

    /// Checks that every joint references live bodies and is indexed under both.
    pub(crate) fn validate_references(&self, bodies: &RigidBodySet) -> Result<()> {
        for (handle, joint) in self.iter() {
            for body in [joint.body1, joint.body2] {
                if !bodies.contains(body) {
                    return Err(PhysicsError::InvariantViolation(format!(
                        "joint {handle:?} references removed body {body:?}"
                    )));
                }
                let indexed = self
                    .body_joints
                    .get(&body)
                    .is_some_and(|list| list.contains(&handle));
                if !indexed {
                    return Err(PhysicsError::InvariantViolation(format!(
                        "joint {handle:?} missing from the index of {body:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn remove_unchecked(&mut self, handle: JointHandle) -> Result<Joint> {
        let joint = self
            .joints
            .remove(handle.0)
            .ok_or_else(|| PhysicsError::stale(EntityKind::Joint, handle))?;

        for body in [joint.body1, joint.body2] {
            if let Some(list) = self.body_joints.get_mut(&body) {
                list.retain(|h| *h != handle);
                if list.is_empty() {
                    self.body_joints.remove(&body);
                }
            }
        }

        log::debug!("removed joint {handle:?}");
        Ok(joint)
    }
}
