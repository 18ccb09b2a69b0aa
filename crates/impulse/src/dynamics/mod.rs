//! Rigid bodies, joints and the solver that moves them.

pub(crate) mod activation;
mod integration_parameters;
pub(crate) mod joint;
mod joint_set;
mod rigid_body;
mod rigid_body_set;
mod solver;

pub use activation::ActivationStatus;
pub use integration_parameters::IntegrationParameters;
pub use joint::{BallJoint, FixedJoint, Joint, JointParams, PrismaticJoint, RevoluteJoint};
pub use joint_set::{JointHandle, JointSet};
pub use rigid_body::{BodyStatus, RigidBody, RigidBodyDesc};
pub use rigid_body_set::{RigidBodyHandle, RigidBodySet};
pub use solver::{ConstraintSolver, PgsSolver};
