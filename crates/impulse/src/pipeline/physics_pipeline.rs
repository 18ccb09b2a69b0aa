//! The per-step simulation driver.

use std::fmt;

use crate::cascade;
use crate::dynamics::{
    activation, ConstraintSolver, IntegrationParameters, JointSet, PgsSolver, RigidBody,
    RigidBodyHandle, RigidBodySet,
};
use crate::error::{PhysicsError, Result};
use crate::geometry::{BroadPhase, Collider, ColliderHandle, ColliderSet, NarrowPhase};
use crate::math::{is_finite_vector, Real, Vector};
use crate::pipeline::EventQueue;

/// Advances a simulation by one fixed time step.
///
/// The pipeline owns nothing but its constraint solver; every set and phase
/// is borrowed for the duration of a call, so the same pipeline can drive
/// several independent simulations.
pub struct PhysicsPipeline {
    solver: Box<dyn ConstraintSolver + Send>,
}

impl Default for PhysicsPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsPipeline").finish_non_exhaustive()
    }
}

impl PhysicsPipeline {
    /// A pipeline using [`PgsSolver`].
    pub fn new() -> Self {
        Self::with_solver(PgsSolver::new())
    }

    /// A pipeline using a custom constraint solver.
    pub fn with_solver(solver: impl ConstraintSolver + Send + 'static) -> Self {
        Self {
            solver: Box::new(solver),
        }
    }

    /// Runs one simulation step of `params.dt` seconds.
    ///
    /// Inputs are validated first; on error nothing has been touched. Events
    /// produced by the step are appended to `events`, which is cleared first
    /// when it is in auto-drain mode.
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        gravity: &Vector<Real>,
        params: &IntegrationParameters,
        broad_phase: &mut BroadPhase,
        narrow_phase: &mut NarrowPhase,
        bodies: &mut RigidBodySet,
        colliders: &mut ColliderSet,
        joints: &mut JointSet,
        events: &mut EventQueue,
    ) -> Result<()> {
        params.validate()?;
        if !is_finite_vector(gravity) {
            return Err(PhysicsError::DegenerateInput(format!(
                "gravity is not finite: {gravity:?}"
            )));
        }
        joints.validate_references(bodies)?;

        if events.auto_drain() {
            events.clear();
        }
        let removed = colliders.take_removed();
        for &handle in &removed {
            broad_phase.remove_collider(handle);
            narrow_phase.remove_collider(handle, colliders, bodies);
        }
        narrow_phase.flush_pending_events(events);

        let dt = params.dt;
        for (_, body) in bodies.iter_mut() {
            if body.is_kinematic() {
                update_kinematic(body, params.inv_dt());
            }
        }

        for (_, body) in bodies.iter_active_mut() {
            if body.is_dynamic() {
                body.integrate_forces(dt, gravity);
            }
        }

        colliders.sync_positions(bodies);
        let pair_events = broad_phase.update(params, colliders);

        narrow_phase.register_pairs(colliders, &pair_events, events);
        narrow_phase.compute_contacts(params, bodies, colliders, events);
        narrow_phase.compute_proximities(params, bodies, colliders, events);
        let links = body_links(narrow_phase, colliders, joints);
        // Bodies woken here missed force integration above.
        for handle in activation::wake_linked_bodies(bodies, &links) {
            if let Some(body) = bodies.lookup_mut(handle) {
                body.integrate_forces(dt, gravity);
            }
        }

        self.solver
            .solve(params, bodies, colliders, narrow_phase, joints);

        for (_, body) in bodies.iter_active_mut() {
            if body.is_dynamic() {
                body.integrate_position(dt);
            }
        }
        for (_, body) in bodies.iter_mut() {
            body.reset_forces();
        }
        colliders.sync_positions(bodies);

        let links = body_links(narrow_phase, colliders, joints);
        activation::update_sleep_states(params, bodies, &links);

        log::trace!(
            "step: {} removed colliders, {} pair events, {} active bodies, {} contact events",
            removed.len(),
            pair_events.len(),
            bodies.iter_active().count(),
            events.contact_events().len()
        );
        Ok(())
    }

    /// Removes a body with its colliders and joints, purging broad and
    /// narrow phase state right away.
    ///
    /// Contact and proximity events caused by the removal are reported by
    /// the next step.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_rigid_body(
        &mut self,
        handle: RigidBodyHandle,
        broad_phase: &mut BroadPhase,
        narrow_phase: &mut NarrowPhase,
        bodies: &mut RigidBodySet,
        colliders: &mut ColliderSet,
        joints: &mut JointSet,
    ) -> Result<RigidBody> {
        let removal = cascade::remove_rigid_body(handle, bodies, colliders, joints)?;
        for &collider in &removal.colliders {
            broad_phase.remove_collider(collider);
            narrow_phase.remove_collider(collider, colliders, bodies);
        }
        colliders
            .removed
            .retain(|h| !removal.colliders.contains(h));
        Ok(removal.body)
    }

    /// Removes a collider, purging broad and narrow phase state right away.
    pub fn remove_collider(
        &mut self,
        handle: ColliderHandle,
        broad_phase: &mut BroadPhase,
        narrow_phase: &mut NarrowPhase,
        bodies: &mut RigidBodySet,
        colliders: &mut ColliderSet,
        wake_up: bool,
    ) -> Result<Collider> {
        let collider = colliders.remove(handle, bodies, wake_up)?;
        broad_phase.remove_collider(handle);
        narrow_phase.remove_collider(handle, colliders, bodies);
        colliders.removed.retain(|h| *h != handle);
        Ok(collider)
    }
}

/// Commits a pending kinematic pose and derives the velocity that reaches it
/// in one step. Without a pending pose the body stops.
fn update_kinematic(body: &mut RigidBody, inv_dt: Real) {
    match body.next_kinematic_position.take() {
        Some(next) => {
            let next_com = next * body.mass_properties.local_com;
            body.linvel = (next_com - body.world_com) * inv_dt;
            body.angvel = (next.rotation * body.position.rotation.inverse()).scaled_axis() * inv_dt;
            body.position = next;
            body.update_world_mass_properties();
        }
        None => {
            body.linvel = Vector::zeros();
            body.angvel = Vector::zeros();
        }
    }
}

/// Body pairs linked by a touching contact or a joint.
fn body_links(
    narrow_phase: &NarrowPhase,
    colliders: &ColliderSet,
    joints: &JointSet,
) -> Vec<(RigidBodyHandle, RigidBodyHandle)> {
    let mut links = narrow_phase.touching_body_pairs(colliders);
    links.extend(joints.iter().map(|(_, j)| (j.body1(), j.body2())));
    links
}
