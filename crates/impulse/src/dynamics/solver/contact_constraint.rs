use crate::dynamics::solver::row::{Bounds, ConstraintRow, SolverBody};
use crate::dynamics::IntegrationParameters;
use crate::geometry::{Collider, ContactImpulse, ContactPair};
use crate::math::{tangent_basis, Point, Real};

/// Where the three rows of one contact point write their impulses back.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ContactPointRef {
    pub pair: usize,
    pub manifold: usize,
    pub point: usize,
    pub normal_row: usize,
}

impl ContactPointRef {
    pub fn impulse(&self, rows: &[ConstraintRow]) -> ContactImpulse {
        ContactImpulse {
            normal: rows[self.normal_row].impulse,
            tangent: [
                rows[self.normal_row + 1].impulse,
                rows[self.normal_row + 2].impulse,
            ],
        }
    }
}

/// Appends one normal row and two friction rows per contact point.
///
/// The normal runs from the first collider towards the second. Friction and
/// restitution are the mean of the two colliders' coefficients.
#[allow(clippy::too_many_arguments)]
pub(crate) fn add_contact_rows(
    params: &IntegrationParameters,
    pair_index: usize,
    pair: &ContactPair,
    co1: &Collider,
    co2: &Collider,
    body1: usize,
    body2: usize,
    bodies: &[SolverBody],
    rows: &mut Vec<ConstraintRow>,
    refs: &mut Vec<ContactPointRef>,
) {
    let inv_dt = params.inv_dt();
    let friction = (co1.friction + co2.friction) * 0.5;
    let restitution = (co1.restitution + co2.restitution) * 0.5;
    let com1 = bodies[body1].com;
    let com2 = bodies[body2].com;

    for (manifold_index, manifold) in pair.manifolds.iter().enumerate() {
        let frame1 = manifold
            .subshape_pos1
            .map_or(co1.position, |sub| co1.position * sub);
        let frame2 = manifold
            .subshape_pos2
            .map_or(co2.position, |sub| co2.position * sub);
        let normal = frame1 * manifold.local_n1;
        let (tangent1, tangent2) = tangent_basis(&normal);

        for (point_index, contact) in manifold.points.iter().enumerate() {
            let p1 = frame1 * contact.local_p1;
            let p2 = frame2 * contact.local_p2;
            let point = Point::from((p1.coords + p2.coords) * 0.5);
            let r1 = point - com1;
            let r2 = point - com2;

            let mut normal_row = ConstraintRow::new(
                bodies,
                body1,
                body2,
                normal,
                r1.cross(&normal),
                r2.cross(&normal),
                Bounds::Unilateral,
            );
            let approach = normal_row.relative_velocity(bodies);
            // A separated contact may close its gap this step but not more.
            normal_row.rhs = if contact.dist > 0.0 {
                -contact.dist * inv_dt
            } else {
                0.0
            };
            if approach < -params.restitution_velocity_threshold {
                normal_row.rhs = normal_row.rhs.max(-restitution * approach);
            }
            normal_row.position_rhs = penetration_correction(params, contact.dist);
            normal_row.impulse = contact.data.normal * params.warmstart_coeff;

            let normal_index = rows.len();
            rows.push(normal_row);

            for (k, tangent) in [tangent1, tangent2].into_iter().enumerate() {
                let mut row = ConstraintRow::new(
                    bodies,
                    body1,
                    body2,
                    tangent,
                    r1.cross(&tangent),
                    r2.cross(&tangent),
                    Bounds::Friction {
                        normal_row: normal_index,
                        coeff: friction,
                    },
                );
                row.impulse = contact.data.tangent[k] * params.warmstart_coeff;
                rows.push(row);
            }

            refs.push(ContactPointRef {
                pair: pair_index,
                manifold: manifold_index,
                point: point_index,
                normal_row: normal_index,
            });
        }
    }
}

/// Separating velocity that removes a fraction of the penetration beyond
/// the allowed error.
fn penetration_correction(params: &IntegrationParameters, dist: Real) -> Real {
    let inv_dt = params.inv_dt();
    let depth = (-dist - params.allowed_linear_error).max(0.0);
    (params.erp * depth * inv_dt).min(params.max_linear_correction * inv_dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_penetration_correction() {
        let params = IntegrationParameters::default();
        assert_eq!(penetration_correction(&params, 0.01), 0.0);
        assert_eq!(penetration_correction(&params, -params.allowed_linear_error), 0.0);

        let expected = params.erp * 0.1 * params.inv_dt();
        assert_relative_eq!(
            penetration_correction(&params, -0.1 - params.allowed_linear_error),
            expected,
            epsilon = 1.0e-4
        );

        // Deep penetrations are clamped.
        assert_relative_eq!(
            penetration_correction(&params, -100.0),
            params.max_linear_correction * params.inv_dt(),
            epsilon = 1.0e-3
        );
    }
}
