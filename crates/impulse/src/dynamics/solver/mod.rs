//! Constraint solving for contacts and joints.

mod contact_constraint;
mod joint_constraint;
mod pgs;
mod row;

pub use pgs::PgsSolver;

use crate::dynamics::{IntegrationParameters, JointSet, RigidBodySet};
use crate::geometry::{ColliderSet, NarrowPhase};

/// Turns contacts and joints into velocity changes.
///
/// Called once per step after the narrow phase. An implementation updates the
/// velocities of awake dynamic bodies, may leave a position correction on
/// them for the pose integration that follows, and stores the impulses it
/// applied on the contact points and joints so the next step can warm start.
pub trait ConstraintSolver {
    /// Solves every active contact and joint constraint for one step.
    fn solve(
        &mut self,
        params: &IntegrationParameters,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        narrow_phase: &mut NarrowPhase,
        joints: &mut JointSet,
    );
}
