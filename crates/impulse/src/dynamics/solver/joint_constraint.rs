use crate::dynamics::joint::{LIMIT_ROW, MAX_JOINT_ROWS};
use crate::dynamics::solver::row::{Bounds, ConstraintRow, SolverBody};
use crate::dynamics::{IntegrationParameters, Joint, JointParams};
use crate::math::{tangent_basis, AngVector, AngularInertia, Isometry, Point, Real, Vector, DEFAULT_EPSILON};

/// Where a joint row writes its impulse back.
#[derive(Clone, Copy, Debug)]
pub(crate) struct JointRowRef {
    pub joint: usize,
    pub row: usize,
    pub slot: usize,
}

/// Builds the rows of one joint from the current body poses.
struct JointRows<'a> {
    params: &'a IntegrationParameters,
    joint: &'a Joint,
    joint_index: usize,
    body1: usize,
    body2: usize,
    bodies: &'a [SolverBody],
    rows: &'a mut Vec<ConstraintRow>,
    refs: &'a mut Vec<JointRowRef>,
}

impl JointRows<'_> {
    fn push(&mut self, slot: usize, mut row: ConstraintRow) {
        debug_assert!(slot < MAX_JOINT_ROWS);
        row.impulse = self.joint.impulses[slot] * self.params.warmstart_coeff;
        self.refs.push(JointRowRef {
            joint: self.joint_index,
            row: self.rows.len(),
            slot,
        });
        self.rows.push(row);
    }

    fn linear_correction(&self, error: Real) -> Real {
        let max = self.params.max_linear_correction * self.params.inv_dt();
        (-self.params.joint_erp * error * self.params.inv_dt()).clamp(-max, max)
    }

    /// Axes for the three point-to-point rows: the longest movable lever arm
    /// first, then its tangent plane. With the rows along the arm and across
    /// it, the radial row needs no rotation and the tangential rows touch
    /// orthogonal spin axes, so a single sweep resolves them.
    fn anchor_axes(&self, anchor1: Point<Real>, anchor2: Point<Real>) -> [Vector<Real>; 3] {
        let arm = |body: usize, anchor: Point<Real>| {
            let b = &self.bodies[body];
            if b.inv_mass > 0.0 || b.inv_inertia != AngularInertia::zeros() {
                anchor - b.com
            } else {
                Vector::zeros()
            }
        };
        let arm1 = arm(self.body1, anchor1);
        let arm2 = arm(self.body2, anchor2);
        let longest = if arm2.norm_squared() >= arm1.norm_squared() {
            arm2
        } else {
            arm1
        };

        let len = longest.norm();
        if len > DEFAULT_EPSILON {
            let n = longest / len;
            let (t1, t2) = tangent_basis(&n);
            [n, t1, t2]
        } else {
            [Vector::x(), Vector::y(), Vector::z()]
        }
    }

    /// Three rows pinning `anchor2` onto `anchor1`, in slots 0 to 2.
    fn point(&mut self, anchor1: Point<Real>, anchor2: Point<Real>) {
        for (slot, axis) in self.anchor_axes(anchor1, anchor2).into_iter().enumerate() {
            self.linear(slot, anchor1, anchor1, anchor2, axis);
        }
    }

    fn angular_correction(&self, error: Real) -> Real {
        let max = self.params.max_angular_correction * self.params.inv_dt();
        (-self.params.joint_erp * error * self.params.inv_dt()).clamp(-max, max)
    }

    /// Keeps `(anchor2 - anchor1) · axis` at zero. `arm1` is the point of
    /// the first body the constraint acts on.
    fn linear(
        &mut self,
        slot: usize,
        arm1: Point<Real>,
        anchor1: Point<Real>,
        anchor2: Point<Real>,
        axis: Vector<Real>,
    ) {
        let r1 = arm1 - self.bodies[self.body1].com;
        let r2 = anchor2 - self.bodies[self.body2].com;
        let mut row = ConstraintRow::new(
            self.bodies,
            self.body1,
            self.body2,
            axis,
            r1.cross(&axis),
            r2.cross(&axis),
            Bounds::Bilateral,
        );
        row.position_rhs = self.linear_correction((anchor2 - anchor1).dot(&axis));
        self.push(slot, row);
    }

    /// Keeps the relative angular velocity about `axis` at zero. `error` is
    /// the relative rotation about `axis`, or `None` for a velocity-only lock.
    fn angular(&mut self, slot: usize, axis: Vector<Real>, error: Option<Real>) {
        let mut row = ConstraintRow::new(
            self.bodies,
            self.body1,
            self.body2,
            Vector::zeros(),
            axis,
            axis,
            Bounds::Bilateral,
        );
        if let Some(error) = error {
            row.position_rhs = self.angular_correction(error);
        }
        self.push(slot, row);
    }

    /// One-sided row along `(lin, ang1, ang2)` once `value` leaves `limits`.
    fn limit(
        &mut self,
        value: Real,
        limits: [Real; 2],
        lin: Vector<Real>,
        ang1: AngVector<Real>,
        ang2: AngVector<Real>,
        max_correction: Real,
    ) {
        let [min, max] = limits;
        let (sign, violation) = if value <= min {
            (1.0, min - value)
        } else if value >= max {
            (-1.0, value - max)
        } else {
            return;
        };

        let mut row = ConstraintRow::new(
            self.bodies,
            self.body1,
            self.body2,
            lin * sign,
            ang1 * sign,
            ang2 * sign,
            Bounds::Unilateral,
        );
        let inv_dt = self.params.inv_dt();
        row.position_rhs = (self.params.joint_erp * violation * inv_dt).min(max_correction * inv_dt);
        self.push(LIMIT_ROW, row);
    }
}

/// Appends the rows of `joint` between solver bodies `body1` and `body2`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn add_joint_rows(
    params: &IntegrationParameters,
    joint_index: usize,
    joint: &Joint,
    pos1: &Isometry<Real>,
    pos2: &Isometry<Real>,
    body1: usize,
    body2: usize,
    bodies: &[SolverBody],
    rows: &mut Vec<ConstraintRow>,
    refs: &mut Vec<JointRowRef>,
) {
    let mut builder = JointRows {
        params,
        joint,
        joint_index,
        body1,
        body2,
        bodies,
        rows,
        refs,
    };
    let world_axes = [Vector::x(), Vector::y(), Vector::z()];

    match &joint.params {
        JointParams::Ball(j) => {
            builder.point(pos1 * j.local_anchor1, pos2 * j.local_anchor2);
        }
        JointParams::Fixed(j) => {
            let frame1 = pos1 * j.local_frame1;
            let frame2 = pos2 * j.local_frame2;
            builder.point(
                Point::from(frame1.translation.vector),
                Point::from(frame2.translation.vector),
            );
            let error = (frame2.rotation * frame1.rotation.inverse()).scaled_axis();
            for (k, axis) in world_axes.into_iter().enumerate() {
                builder.angular(3 + k, axis, Some(error.dot(&axis)));
            }
        }
        JointParams::Revolute(j) => {
            builder.point(pos1 * j.local_anchor1, pos2 * j.local_anchor2);

            let axis1 = (pos1.rotation * j.local_axis1).normalize();
            let axis2 = (pos2.rotation * j.local_axis2).normalize();
            let misalignment = axis1.cross(&axis2);
            let (b1, b2) = tangent_basis(&axis1);
            builder.angular(3, b1, Some(misalignment.dot(&b1)));
            builder.angular(4, b2, Some(misalignment.dot(&b2)));

            if let Some(limits) = j.limits {
                let ref1 = pos1.rotation * tangent_basis(&j.local_axis1.normalize()).0;
                let ref2 = pos2.rotation * tangent_basis(&j.local_axis2.normalize()).0;
                let angle = ref1.cross(&ref2).dot(&axis1).atan2(ref1.dot(&ref2));
                builder.limit(
                    angle,
                    limits,
                    Vector::zeros(),
                    axis1,
                    axis1,
                    params.max_angular_correction,
                );
            }
        }
        JointParams::Prismatic(j) => {
            let p1 = pos1 * j.local_anchor1;
            let p2 = pos2 * j.local_anchor2;
            let axis1 = (pos1.rotation * j.local_axis1).normalize();
            let axis2 = (pos2.rotation * j.local_axis2).normalize();
            let (t1, t2) = tangent_basis(&axis1);

            // The slide axis belongs to the first body, so it acts where the
            // second anchor currently sits.
            builder.linear(0, p2, p1, p2, t1);
            builder.linear(1, p2, p1, p2, t2);

            let misalignment = axis1.cross(&axis2);
            builder.angular(2, t1, Some(misalignment.dot(&t1)));
            builder.angular(3, t2, Some(misalignment.dot(&t2)));
            builder.angular(4, axis1, None);

            if let Some(limits) = j.limits {
                let offset = (p2 - p1).dot(&axis1);
                let r1 = p2 - bodies[body1].com;
                let r2 = p2 - bodies[body2].com;
                builder.limit(
                    offset,
                    limits,
                    axis1,
                    r1.cross(&axis1),
                    r2.cross(&axis1),
                    params.max_linear_correction,
                );
            }
        }
    }
}
