use crate::math::{AngVector, AngularInertia, Point, Real, Vector, DEFAULT_EPSILON};

/// Velocity state of one body as seen by the solver.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SolverBody {
    pub linvel: Vector<Real>,
    pub angvel: AngVector<Real>,
    pub inv_mass: Real,
    pub inv_inertia: AngularInertia,
    pub com: Point<Real>,
}

impl SolverBody {
    /// An immovable body at rest.
    pub fn fixed() -> Self {
        Self {
            linvel: Vector::zeros(),
            angvel: AngVector::zeros(),
            inv_mass: 0.0,
            inv_inertia: AngularInertia::zeros(),
            com: Point::origin(),
        }
    }

    /// Same body with zero velocity, used for the position pass.
    pub fn at_rest(&self) -> Self {
        Self {
            linvel: Vector::zeros(),
            angvel: AngVector::zeros(),
            ..*self
        }
    }
}

/// Admissible range of a row's accumulated impulse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Bounds {
    /// `[0, ∞)`
    Unilateral,
    /// `(-∞, ∞)`
    Bilateral,
    /// `±coeff · impulse` of the normal row it belongs to.
    Friction { normal_row: usize, coeff: Real },
}

/// One scalar constraint between two solver bodies.
///
/// The relative velocity along the row is
/// `lin · (v2 - v1) + ang2 · ω2 - ang1 · ω1`; the solver drives it towards
/// `rhs` while keeping the accumulated impulse within `bounds`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ConstraintRow {
    pub body1: usize,
    pub body2: usize,
    pub lin: Vector<Real>,
    pub ang1: AngVector<Real>,
    pub ang2: AngVector<Real>,
    pub inv_lhs: Real,
    pub rhs: Real,
    /// Target used by the position pass.
    pub position_rhs: Real,
    pub impulse: Real,
    pub bounds: Bounds,
}

impl ConstraintRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bodies: &[SolverBody],
        body1: usize,
        body2: usize,
        lin: Vector<Real>,
        ang1: AngVector<Real>,
        ang2: AngVector<Real>,
        bounds: Bounds,
    ) -> Self {
        let b1 = &bodies[body1];
        let b2 = &bodies[body2];
        let lhs = (b1.inv_mass + b2.inv_mass) * lin.norm_squared()
            + ang1.dot(&(b1.inv_inertia * ang1))
            + ang2.dot(&(b2.inv_inertia * ang2));
        Self {
            body1,
            body2,
            lin,
            ang1,
            ang2,
            inv_lhs: if lhs > DEFAULT_EPSILON { 1.0 / lhs } else { 0.0 },
            rhs: 0.0,
            position_rhs: 0.0,
            impulse: 0.0,
            bounds,
        }
    }

    pub fn relative_velocity(&self, bodies: &[SolverBody]) -> Real {
        let b1 = &bodies[self.body1];
        let b2 = &bodies[self.body2];
        self.lin.dot(&(b2.linvel - b1.linvel)) + self.ang2.dot(&b2.angvel)
            - self.ang1.dot(&b1.angvel)
    }

    pub fn apply(&self, bodies: &mut [SolverBody], impulse: Real) {
        let b1 = &mut bodies[self.body1];
        b1.linvel -= self.lin * (b1.inv_mass * impulse);
        b1.angvel -= b1.inv_inertia * self.ang1 * impulse;

        let b2 = &mut bodies[self.body2];
        b2.linvel += self.lin * (b2.inv_mass * impulse);
        b2.angvel += b2.inv_inertia * self.ang2 * impulse;
    }
}

/// Applies every row's accumulated impulse.
pub(crate) fn warm_start(rows: &[ConstraintRow], bodies: &mut [SolverBody]) {
    for row in rows {
        if row.impulse != 0.0 {
            row.apply(bodies, row.impulse);
        }
    }
}

/// One projected Gauss-Seidel sweep.
pub(crate) fn solve_rows(rows: &mut [ConstraintRow], bodies: &mut [SolverBody]) {
    for i in 0..rows.len() {
        let (lo, hi) = match rows[i].bounds {
            Bounds::Unilateral => (0.0, Real::INFINITY),
            Bounds::Bilateral => (Real::NEG_INFINITY, Real::INFINITY),
            Bounds::Friction { normal_row, coeff } => {
                let limit = coeff * rows[normal_row].impulse;
                (-limit, limit)
            }
        };

        let row = &mut rows[i];
        let dvel = row.relative_velocity(bodies);
        let new_impulse = (row.impulse + row.inv_lhs * (row.rhs - dvel)).clamp(lo, hi);
        let delta = new_impulse - row.impulse;
        row.impulse = new_impulse;
        row.apply(bodies, delta);
    }
}
