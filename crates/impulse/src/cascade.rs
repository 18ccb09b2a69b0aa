//! Cascading removal of a rigid body and everything that depends on it.
//!
//! Both `RigidBodySet::remove` and `PhysicsPipeline::remove_rigid_body` go
//! through [`remove_rigid_body`]. It checks every cross-reference first and
//! mutates only once all of them hold, so a failure leaves the three sets
//! exactly as they were.

use crate::dynamics::{JointHandle, JointSet, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::error::{EntityKind, PhysicsError, Result};
use crate::geometry::{ColliderHandle, ColliderSet};

/// What a cascading removal took out.
#[derive(Debug)]
pub(crate) struct BodyRemoval {
    pub body: RigidBody,
    pub colliders: Vec<ColliderHandle>,
    pub joints: Vec<JointHandle>,
}

pub(crate) fn remove_rigid_body(
    handle: RigidBodyHandle,
    bodies: &mut RigidBodySet,
    colliders: &mut ColliderSet,
    joints: &mut JointSet,
) -> Result<BodyRemoval> {
    let body = bodies
        .lookup(handle)
        .ok_or_else(|| PhysicsError::stale(EntityKind::RigidBody, handle))?;

    for &collider in &body.colliders {
        match colliders.lookup(collider) {
            Some(c) if c.parent == Some(handle) => {}
            Some(c) => {
                return Err(PhysicsError::InvariantViolation(format!(
                    "{handle:?} lists collider {collider:?} whose parent is {:?}",
                    c.parent
                )))
            }
            None => {
                return Err(PhysicsError::InvariantViolation(format!(
                    "{handle:?} lists removed collider {collider:?}"
                )))
            }
        }
    }

    let attached: Vec<JointHandle> = joints.joints_with(handle).collect();
    for &joint_handle in &attached {
        let joint = joints.joints.get(joint_handle.0).ok_or_else(|| {
            PhysicsError::InvariantViolation(format!(
                "{handle:?} indexes removed joint {joint_handle:?}"
            ))
        })?;
        let other = match (joint.body1 == handle, joint.body2 == handle) {
            (true, _) => joint.body2,
            (_, true) => joint.body1,
            _ => {
                return Err(PhysicsError::InvariantViolation(format!(
                    "joint {joint_handle:?} indexed under {handle:?} does not reference it"
                )))
            }
        };
        if !bodies.contains(other) {
            return Err(PhysicsError::InvariantViolation(format!(
                "joint {joint_handle:?} references removed body {other:?}"
            )));
        }
    }

    // Every reference checked; nothing below can fail.
    let removed_colliders = body.colliders.clone();
    for &collider in &removed_colliders {
        colliders.colliders.remove(collider.0);
        colliders.removed.push(collider);
    }

    for &joint_handle in &attached {
        if let Ok(joint) = joints.remove_unchecked(joint_handle) {
            let other = if joint.body1 == handle {
                joint.body2
            } else {
                joint.body1
            };
            if let Some(other) = bodies.lookup_mut(other) {
                other.wake_up(true);
            }
        }
    }

    let body = bodies
        .bodies
        .remove(handle.0)
        .ok_or_else(|| PhysicsError::stale(EntityKind::RigidBody, handle))?;

    log::debug!(
        "removed rigid body {handle:?} with {} colliders and {} joints",
        removed_colliders.len(),
        attached.len()
    );

    Ok(BodyRemoval {
        body,
        colliders: removed_colliders,
        joints: attached,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{BallJoint, RigidBodyDesc};
    use crate::geometry::ColliderDesc;
    use crate::math::Point;

    struct Fixture {
        bodies: RigidBodySet,
        colliders: ColliderSet,
        joints: JointSet,
    }

    fn fixture() -> Fixture {
        Fixture {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: JointSet::new(),
        }
    }

    fn ball() -> BallJoint {
        BallJoint::new(Point::origin(), Point::origin())
    }

    #[test]
    fn test_cascade_counts() {
        let mut f = fixture();
        let target = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let other = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let third = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();

        let n = 3;
        for _ in 0..n {
            f.colliders
                .insert_with_parent(ColliderDesc::ball(0.5), target, &mut f.bodies)
                .unwrap();
        }
        let kept = f
            .colliders
            .insert_with_parent(ColliderDesc::ball(0.5), other, &mut f.bodies)
            .unwrap();

        let m = 2;
        f.joints.insert(&mut f.bodies, target, other, ball()).unwrap();
        f.joints.insert(&mut f.bodies, third, target, ball()).unwrap();
        let unrelated = f.joints.insert(&mut f.bodies, other, third, ball()).unwrap();

        let colliders_before = f.colliders.len();
        let joints_before = f.joints.len();

        let removal =
            remove_rigid_body(target, &mut f.bodies, &mut f.colliders, &mut f.joints).unwrap();

        assert_eq!(removal.colliders.len(), n);
        assert_eq!(removal.joints.len(), m);
        assert_eq!(f.colliders.len(), colliders_before - n);
        assert_eq!(f.joints.len(), joints_before - m);
        assert_eq!(f.bodies.len(), 2);

        for c in &removal.colliders {
            assert!(!f.colliders.contains(*c));
        }
        for j in &removal.joints {
            assert!(!f.joints.contains(*j));
        }
        assert!(f.colliders.contains(kept));
        assert!(f.joints.contains(unrelated));
        assert_eq!(f.joints.joints_with(target).count(), 0);
        assert_eq!(f.colliders.take_removed(), removal.colliders);
    }

    #[test]
    fn test_remaining_references_are_consistent() {
        let mut f = fixture();
        let a = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let b = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        for body in [a, b] {
            f.colliders
                .insert_with_parent(ColliderDesc::ball(0.5), body, &mut f.bodies)
                .unwrap();
        }
        f.joints.insert(&mut f.bodies, a, b, ball()).unwrap();

        remove_rigid_body(a, &mut f.bodies, &mut f.colliders, &mut f.joints).unwrap();

        for (handle, collider) in f.colliders.iter() {
            let parent = collider.parent().unwrap();
            assert!(f.bodies.get(parent).unwrap().colliders().contains(&handle));
        }
        for (_, body) in f.bodies.iter() {
            for c in body.colliders() {
                assert!(f.colliders.contains(*c));
            }
        }
        assert!(f.joints.validate_references(&f.bodies).is_ok());
    }

    #[test]
    fn test_failed_validation_mutates_nothing() {
        let mut f = fixture();
        let a = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let b = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        f.colliders
            .insert_with_parent(ColliderDesc::ball(0.5), a, &mut f.bodies)
            .unwrap();
        f.joints.insert(&mut f.bodies, a, b, ball()).unwrap();

        // Corrupt: free b behind the cascade's back.
        f.bodies.bodies.remove(b.0);

        let err = remove_rigid_body(a, &mut f.bodies, &mut f.colliders, &mut f.joints).unwrap_err();
        assert!(err.is_fatal());
        assert!(f.bodies.contains(a));
        assert_eq!(f.colliders.len(), 1);
        assert_eq!(f.joints.len(), 1);
        assert!(f.colliders.take_removed().is_empty());
    }

    #[test]
    fn test_joint_partner_is_woken() {
        let mut f = fixture();
        let a = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let b = f.bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        f.joints.insert(&mut f.bodies, a, b, ball()).unwrap();
        f.bodies.get_mut(b).unwrap().sleep();

        remove_rigid_body(a, &mut f.bodies, &mut f.colliders, &mut f.joints).unwrap();
        assert!(!f.bodies.get(b).unwrap().is_sleeping());
    }
}
