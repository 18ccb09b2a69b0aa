use std::collections::HashMap;

use crate::dynamics::joint::MAX_JOINT_ROWS;
use crate::dynamics::solver::contact_constraint::{add_contact_rows, ContactPointRef};
use crate::dynamics::solver::joint_constraint::{add_joint_rows, JointRowRef};
use crate::dynamics::solver::row::{solve_rows, warm_start, Bounds, ConstraintRow, SolverBody};
use crate::dynamics::solver::ConstraintSolver;
use crate::dynamics::{
    IntegrationParameters, Joint, JointSet, RigidBody, RigidBodyHandle, RigidBodySet,
};
use crate::geometry::{ColliderSet, ContactPair, NarrowPhase};

/// Projected Gauss-Seidel solver with warm starting and split-impulse
/// position correction.
///
/// Velocity iterations drive every contact and joint row to its target
/// velocity. Position iterations then run the same rows on zero-initialized
/// pseudo-velocities towards the error-correcting targets; the result is left
/// on each body as a one-step position correction so that fixing penetration
/// never adds kinetic energy.
#[derive(Debug, Default)]
pub struct PgsSolver {
    bodies: Vec<SolverBody>,
    handles: Vec<Option<RigidBodyHandle>>,
    body_index: HashMap<RigidBodyHandle, usize>,
    rows: Vec<ConstraintRow>,
    contact_refs: Vec<ContactPointRef>,
    joint_refs: Vec<JointRowRef>,
}

impl PgsSolver {
    /// Creates a solver with empty scratch buffers.
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.bodies.clear();
        self.handles.clear();
        self.body_index.clear();
        self.rows.clear();
        self.contact_refs.clear();
        self.joint_refs.clear();

        // Slot 0 stands in for colliders without a parent.
        self.bodies.push(SolverBody::fixed());
        self.handles.push(None);
    }

    fn solver_body(&mut self, handle: Option<RigidBodyHandle>, bodies: &RigidBodySet) -> usize {
        let Some(handle) = handle else {
            return 0;
        };
        if let Some(&index) = self.body_index.get(&handle) {
            return index;
        }
        let Some(body) = bodies.lookup(handle) else {
            return 0;
        };

        let solver_body = if is_movable(body) {
            SolverBody {
                linvel: body.linvel,
                angvel: body.angvel,
                inv_mass: body.effective_inv_mass,
                inv_inertia: body.effective_world_inv_inertia,
                com: body.world_com,
            }
        } else {
            // Kinematic bodies keep their velocity but cannot be pushed.
            SolverBody {
                linvel: body.linvel,
                angvel: body.angvel,
                com: body.world_com,
                ..SolverBody::fixed()
            }
        };

        let index = self.bodies.len();
        self.bodies.push(solver_body);
        self.handles.push(Some(handle));
        self.body_index.insert(handle, index);
        index
    }

    fn add_contacts(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        pairs: &[&mut ContactPair],
    ) {
        for (pair_index, pair) in pairs.iter().enumerate() {
            let (Some(co1), Some(co2)) =
                (colliders.lookup(pair.collider1), colliders.lookup(pair.collider2))
            else {
                continue;
            };
            let movable = |parent: Option<RigidBodyHandle>| {
                parent
                    .and_then(|p| bodies.lookup(p))
                    .is_some_and(is_movable)
            };
            if !movable(co1.parent) && !movable(co2.parent) {
                continue;
            }

            let body1 = self.solver_body(co1.parent, bodies);
            let body2 = self.solver_body(co2.parent, bodies);
            add_contact_rows(
                params,
                pair_index,
                pair,
                co1,
                co2,
                body1,
                body2,
                &self.bodies,
                &mut self.rows,
                &mut self.contact_refs,
            );
        }
    }

    fn add_joints(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        joints: &[&mut Joint],
    ) {
        for (joint_index, joint) in joints.iter().enumerate() {
            let (Some(rb1), Some(rb2)) = (bodies.lookup(joint.body1), bodies.lookup(joint.body2))
            else {
                continue;
            };
            if !is_movable(rb1) && !is_movable(rb2) {
                continue;
            }

            let body1 = self.solver_body(Some(joint.body1), bodies);
            let body2 = self.solver_body(Some(joint.body2), bodies);
            add_joint_rows(
                params,
                joint_index,
                joint,
                &rb1.position,
                &rb2.position,
                body1,
                body2,
                &self.bodies,
                &mut self.rows,
                &mut self.joint_refs,
            );
        }
    }

    fn solve_positions(&self, params: &IntegrationParameters) -> Vec<SolverBody> {
        let mut pseudo: Vec<SolverBody> = self.bodies.iter().map(SolverBody::at_rest).collect();
        if params.max_position_iterations == 0 {
            return pseudo;
        }

        let mut rows: Vec<ConstraintRow> = self
            .rows
            .iter()
            .filter(|row| !matches!(row.bounds, Bounds::Friction { .. }))
            .map(|row| ConstraintRow {
                rhs: row.position_rhs,
                impulse: 0.0,
                ..*row
            })
            .collect();
        for _ in 0..params.max_position_iterations {
            solve_rows(&mut rows, &mut pseudo);
        }
        pseudo
    }
}

impl ConstraintSolver for PgsSolver {
    fn solve(
        &mut self,
        params: &IntegrationParameters,
        bodies: &mut RigidBodySet,
        colliders: &ColliderSet,
        narrow_phase: &mut NarrowPhase,
        joints: &mut JointSet,
    ) {
        self.reset();

        let mut pairs: Vec<&mut ContactPair> = narrow_phase.solver_pairs_mut().collect();
        let mut joint_list: Vec<&mut Joint> = joints.iter_mut().map(|(_, j)| j).collect();

        self.add_contacts(params, bodies, colliders, &pairs);
        let contact_rows = self.rows.len();
        self.add_joints(params, bodies, &joint_list);

        if self.rows.is_empty() {
            return;
        }

        warm_start(&self.rows, &mut self.bodies);
        for _ in 0..params.max_velocity_iterations {
            solve_rows(&mut self.rows, &mut self.bodies);
        }

        for contact in &self.contact_refs {
            let impulse = contact.impulse(&self.rows);
            if let Some(point) = pairs[contact.pair]
                .manifolds
                .get_mut(contact.manifold)
                .and_then(|m| m.points.get_mut(contact.point))
            {
                point.data = impulse;
            }
        }

        let mut touched_joints = vec![false; joint_list.len()];
        for joint_ref in &self.joint_refs {
            let joint = &mut joint_list[joint_ref.joint];
            if !touched_joints[joint_ref.joint] {
                joint.impulses = [0.0; MAX_JOINT_ROWS];
                touched_joints[joint_ref.joint] = true;
            }
            joint.impulses[joint_ref.slot] = self.rows[joint_ref.row].impulse;
        }

        let corrections = self.solve_positions(params);

        for (index, handle) in self.handles.iter().enumerate() {
            let Some(body) = handle.and_then(|h| bodies.lookup_mut(h)) else {
                continue;
            };
            if !is_movable(body) {
                continue;
            }
            let solved = &self.bodies[index];
            body.linvel = solved.linvel;
            body.angvel = solved.angvel;
            body.position_correction = (corrections[index].linvel, corrections[index].angvel);
        }

        log::trace!(
            "solver: {} bodies, {} contact rows, {} joint rows",
            self.bodies.len() - 1,
            contact_rows,
            self.rows.len() - contact_rows
        );
    }
}

/// Awake dynamic bodies are the only ones the solver moves.
fn is_movable(body: &RigidBody) -> bool {
    body.is_dynamic() && !body.is_sleeping()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::{BallJoint, RigidBodyDesc};
    use crate::geometry::{BroadPhase, ColliderDesc};
    use crate::math::{Point, Real, Vector};
    use crate::pipeline::EventQueue;
    use approx::assert_relative_eq;

    struct Scene {
        params: IntegrationParameters,
        bodies: RigidBodySet,
        colliders: ColliderSet,
        joints: JointSet,
        broad_phase: BroadPhase,
        narrow_phase: NarrowPhase,
        events: EventQueue,
        solver: PgsSolver,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                params: IntegrationParameters::default(),
                bodies: RigidBodySet::new(),
                colliders: ColliderSet::new(),
                joints: JointSet::new(),
                broad_phase: BroadPhase::new(),
                narrow_phase: NarrowPhase::new(),
                events: EventQueue::new(true),
                solver: PgsSolver::new(),
            }
        }

        fn step(&mut self, gravity: Vector<Real>) {
            let dt = self.params.dt;
            for (_, body) in self.bodies.iter_active_mut() {
                if body.is_dynamic() {
                    body.integrate_forces(dt, &gravity);
                }
            }
            self.colliders.sync_positions(&self.bodies);
            let pairs = self.broad_phase.update(&self.params, &self.colliders);
            self.narrow_phase
                .register_pairs(&self.colliders, &pairs, &mut self.events);
            self.narrow_phase.compute_contacts(
                &self.params,
                &self.bodies,
                &self.colliders,
                &mut self.events,
            );
            self.solver.solve(
                &self.params,
                &mut self.bodies,
                &self.colliders,
                &mut self.narrow_phase,
                &mut self.joints,
            );
            for (_, body) in self.bodies.iter_active_mut() {
                if body.is_dynamic() {
                    body.integrate_position(dt);
                }
            }
            self.colliders.sync_positions(&self.bodies);
        }
    }

    #[test]
    fn test_box_rests_on_floor() {
        let mut s = Scene::new();
        s.colliders
            .insert(ColliderDesc::cuboid(10.0, 0.5, 10.0).translation(Vector::new(0.0, -0.5, 0.0)))
            .unwrap();
        let cube = s
            .bodies
            .insert(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 0.5, 0.0)))
            .unwrap();
        s.colliders
            .insert_with_parent(ColliderDesc::cuboid(0.5, 0.5, 0.5).density(1.0), cube, &mut s.bodies)
            .unwrap();

        for _ in 0..120 {
            s.step(Vector::new(0.0, -9.81, 0.0));
        }

        let body = s.bodies.get(cube).unwrap();
        assert!(body.translation().y > 0.45, "sank to {}", body.translation().y);
        assert!(body.translation().y < 0.55);
        assert!(body.linvel().norm() < 0.1);

        let pair = s.narrow_phase.contact_pairs().next().unwrap();
        assert!(pair.is_touching());
        assert!(pair.total_normal_impulse() > 0.0);
    }

    #[test]
    fn test_falling_ball_is_stopped_by_floor() {
        let mut s = Scene::new();
        s.colliders
            .insert(ColliderDesc::cuboid(10.0, 0.5, 10.0).translation(Vector::new(0.0, -0.5, 0.0)))
            .unwrap();
        let ball = s
            .bodies
            .insert(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 2.0, 0.0)))
            .unwrap();
        s.colliders
            .insert_with_parent(ColliderDesc::ball(0.5).density(1.0), ball, &mut s.bodies)
            .unwrap();

        for _ in 0..180 {
            s.step(Vector::new(0.0, -9.81, 0.0));
        }
        let y = s.bodies.get(ball).unwrap().translation().y;
        assert!(y > 0.4 && y < 0.6, "ball ended at {y}");
    }

    #[test]
    fn test_ball_joint_holds_pendulum_length() {
        let mut s = Scene::new();
        let anchor = s.bodies.insert(RigidBodyDesc::new_static()).unwrap();
        let bob = s
            .bodies
            .insert(RigidBodyDesc::dynamic().translation(Vector::new(1.0, 0.0, 0.0)))
            .unwrap();
        s.colliders
            .insert_with_parent(ColliderDesc::ball(0.1).density(1.0), bob, &mut s.bodies)
            .unwrap();
        s.joints
            .insert(
                &mut s.bodies,
                anchor,
                bob,
                BallJoint::new(Point::origin(), Point::new(-1.0, 0.0, 0.0)),
            )
            .unwrap();

        for _ in 0..60 {
            s.step(Vector::new(0.0, -9.81, 0.0));
        }

        let body = s.bodies.get(bob).unwrap();
        assert_relative_eq!(body.translation().norm(), 1.0, epsilon = 0.05);
        assert!(body.translation().y < -0.1);
        let joint = s.joints.iter().next().unwrap().1;
        assert!(joint.impulses().iter().any(|i| *i != 0.0));
    }

    #[test]
    fn test_sleeping_bodies_are_left_alone() {
        let mut s = Scene::new();
        s.colliders
            .insert(ColliderDesc::cuboid(10.0, 0.5, 10.0).translation(Vector::new(0.0, -0.5, 0.0)))
            .unwrap();
        let cube = s
            .bodies
            .insert(
                RigidBodyDesc::dynamic()
                    .translation(Vector::new(0.0, 0.4, 0.0))
                    .sleeping(true),
            )
            .unwrap();
        s.colliders
            .insert_with_parent(ColliderDesc::cuboid(0.5, 0.5, 0.5).density(1.0), cube, &mut s.bodies)
            .unwrap();
        // Attaching a collider wakes the body; put it back to sleep.
        s.bodies.get_mut(cube).unwrap().sleep();

        s.step(Vector::new(0.0, -9.81, 0.0));
        let body = s.bodies.get(cube).unwrap();
        assert_relative_eq!(body.translation().y, 0.4);
        assert_eq!(*body.linvel(), Vector::zeros());
    }
}
