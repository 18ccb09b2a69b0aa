//! Joint definitions.

use crate::dynamics::RigidBodyHandle;
use crate::error::{PhysicsError, Result};
use crate::math::{is_finite_vector, Isometry, Point, Real, Vector, DEFAULT_EPSILON};

/// Number of accumulated impulses a joint keeps for warm starting.
pub(crate) const MAX_JOINT_ROWS: usize = 6;

/// Index of the limit row for revolute and prismatic joints.
pub(crate) const LIMIT_ROW: usize = 5;

/// Shared point; both bodies may rotate freely about it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BallJoint {
    /// Anchor in the first body's frame.
    pub local_anchor1: Point<Real>,
    /// Anchor in the second body's frame.
    pub local_anchor2: Point<Real>,
}

impl BallJoint {
    /// Creates a ball joint.
    pub fn new(local_anchor1: Point<Real>, local_anchor2: Point<Real>) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
        }
    }
}

/// Removes every relative degree of freedom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedJoint {
    /// Joint frame in the first body's frame.
    pub local_frame1: Isometry<Real>,
    /// Joint frame in the second body's frame.
    pub local_frame2: Isometry<Real>,
}

impl FixedJoint {
    /// Creates a fixed joint that keeps the two frames coincident.
    pub fn new(local_frame1: Isometry<Real>, local_frame2: Isometry<Real>) -> Self {
        Self {
            local_frame1,
            local_frame2,
        }
    }
}

/// Hinge: rotation about one shared axis only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RevoluteJoint {
    /// Anchor in the first body's frame.
    pub local_anchor1: Point<Real>,
    /// Anchor in the second body's frame.
    pub local_anchor2: Point<Real>,
    /// Hinge axis in the first body's frame.
    pub local_axis1: Vector<Real>,
    /// Hinge axis in the second body's frame.
    pub local_axis2: Vector<Real>,
    /// Allowed angle range (radians).
    pub limits: Option<[Real; 2]>,
}

impl RevoluteJoint {
    /// Creates a hinge.
    pub fn new(
        local_anchor1: Point<Real>,
        local_axis1: Vector<Real>,
        local_anchor2: Point<Real>,
        local_axis2: Vector<Real>,
    ) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            local_axis1,
            local_axis2,
            limits: None,
        }
    }

    /// Restricts the hinge angle to `[min, max]`.
    pub fn with_limits(mut self, min: Real, max: Real) -> Self {
        self.limits = Some([min, max]);
        self
    }
}

/// Slider: translation along one shared axis only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrismaticJoint {
    /// Anchor in the first body's frame.
    pub local_anchor1: Point<Real>,
    /// Anchor in the second body's frame.
    pub local_anchor2: Point<Real>,
    /// Slide axis in the first body's frame.
    pub local_axis1: Vector<Real>,
    /// Slide axis in the second body's frame.
    pub local_axis2: Vector<Real>,
    /// Allowed offset range along the axis.
    pub limits: Option<[Real; 2]>,
}

impl PrismaticJoint {
    /// Creates a slider.
    pub fn new(
        local_anchor1: Point<Real>,
        local_axis1: Vector<Real>,
        local_anchor2: Point<Real>,
        local_axis2: Vector<Real>,
    ) -> Self {
        Self {
            local_anchor1,
            local_anchor2,
            local_axis1,
            local_axis2,
            limits: None,
        }
    }

    /// Restricts the slide offset to `[min, max]`.
    pub fn with_limits(mut self, min: Real, max: Real) -> Self {
        self.limits = Some([min, max]);
        self
    }
}

/// Kind and geometry of a joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointParams {
    /// See [`BallJoint`].
    Ball(BallJoint),
    /// See [`FixedJoint`].
    Fixed(FixedJoint),
    /// See [`RevoluteJoint`].
    Revolute(RevoluteJoint),
    /// See [`PrismaticJoint`].
    Prismatic(PrismaticJoint),
}

impl From<BallJoint> for JointParams {
    fn from(joint: BallJoint) -> Self {
        JointParams::Ball(joint)
    }
}

impl From<FixedJoint> for JointParams {
    fn from(joint: FixedJoint) -> Self {
        JointParams::Fixed(joint)
    }
}

impl From<RevoluteJoint> for JointParams {
    fn from(joint: RevoluteJoint) -> Self {
        JointParams::Revolute(joint)
    }
}

impl From<PrismaticJoint> for JointParams {
    fn from(joint: PrismaticJoint) -> Self {
        JointParams::Prismatic(joint)
    }
}

impl JointParams {
    /// Rejects non-finite anchors, zero axes and inverted limits.
    pub fn validate(&self) -> Result<()> {
        let anchors = |a1: &Point<Real>, a2: &Point<Real>| {
            if is_finite_vector(&a1.coords) && is_finite_vector(&a2.coords) {
                Ok(())
            } else {
                Err(PhysicsError::InvalidJoint("anchor is not finite".into()))
            }
        };
        let axes = |x1: &Vector<Real>, x2: &Vector<Real>| {
            for axis in [x1, x2] {
                let norm = axis.norm();
                if !norm.is_finite() || norm < DEFAULT_EPSILON {
                    return Err(PhysicsError::InvalidJoint(format!(
                        "axis {axis:?} has zero or non-finite length"
                    )));
                }
            }
            Ok(())
        };
        let limits = |limits: &Option<[Real; 2]>| match limits {
            Some([min, max]) if !(min <= max) => Err(PhysicsError::InvalidJoint(format!(
                "limits [{min}, {max}] are inverted or NaN"
            ))),
            _ => Ok(()),
        };

        match self {
            JointParams::Ball(j) => anchors(&j.local_anchor1, &j.local_anchor2),
            JointParams::Fixed(j) => anchors(
                &j.local_frame1.translation.vector.into(),
                &j.local_frame2.translation.vector.into(),
            ),
            JointParams::Revolute(j) => {
                anchors(&j.local_anchor1, &j.local_anchor2)?;
                axes(&j.local_axis1, &j.local_axis2)?;
                limits(&j.limits)
            }
            JointParams::Prismatic(j) => {
                anchors(&j.local_anchor1, &j.local_anchor2)?;
                axes(&j.local_axis1, &j.local_axis2)?;
                limits(&j.limits)
            }
        }
    }
}

/// A constraint between two rigid bodies.
#[derive(Clone, Debug)]
pub struct Joint {
    pub(crate) body1: RigidBodyHandle,
    pub(crate) body2: RigidBodyHandle,
    pub(crate) params: JointParams,
    pub(crate) impulses: [Real; MAX_JOINT_ROWS],
    /// Arbitrary data attached by the caller.
    pub user_data: u128,
}

impl Joint {
    /// First attached body.
    pub fn body1(&self) -> RigidBodyHandle {
        self.body1
    }

    /// Second attached body.
    pub fn body2(&self) -> RigidBodyHandle {
        self.body2
    }

    /// Kind and geometry.
    pub fn params(&self) -> &JointParams {
        &self.params
    }

    /// Replaces the joint geometry, resetting accumulated impulses.
    pub fn set_params(&mut self, params: JointParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        self.impulses = [0.0; MAX_JOINT_ROWS];
        Ok(())
    }

    /// Impulses applied by the solver during the last step.
    pub fn impulses(&self) -> &[Real; MAX_JOINT_ROWS] {
        &self.impulses
    }
}
