//! A self-contained simulation bundling every set and pipeline.

use parry3d::query::Ray;

use crate::dynamics::{
    IntegrationParameters, Joint, JointHandle, JointParams, JointSet, RigidBody, RigidBodyDesc,
    RigidBodyHandle, RigidBodySet,
};
use crate::error::Result;
use crate::geometry::{BroadPhase, Collider, ColliderDesc, ColliderHandle, ColliderSet, NarrowPhase};
use crate::math::{Real, Vector};
use crate::pipeline::{EventQueue, PhysicsPipeline, QueryPipeline, RayColliderHit};

/// Physics simulation world.
///
/// Owns one of each set, both pipelines and an auto-draining event queue.
/// Ray casts refresh the query pipeline only when something may have moved
/// since the last refresh.
#[derive(Debug)]
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    joints: JointSet,
    events: EventQueue,
    query_pipeline: QueryPipeline,
    query_stale: bool,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create an empty world with standard Earth gravity along `-y`.
    pub fn new() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector::new(0.0, -9.81, 0.0),
            integration_params: IntegrationParameters::default(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: JointSet::new(),
            events: EventQueue::new(true),
            query_pipeline: QueryPipeline::new(),
            query_stale: true,
        }
    }

    /// Step the simulation forward by `dt` seconds.
    pub fn step(&mut self, dt: Real) -> Result<()> {
        self.integration_params.dt = dt;
        self.query_stale = true;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.events,
        )
    }

    /// Set gravity vector.
    pub fn set_gravity(&mut self, x: Real, y: Real, z: Real) {
        self.gravity = Vector::new(x, y, z);
    }

    /// Current gravity vector.
    pub fn gravity(&self) -> &Vector<Real> {
        &self.gravity
    }

    /// Parameters used by the next step. `dt` is overwritten by [`Self::step`].
    pub fn integration_parameters(&self) -> &IntegrationParameters {
        &self.integration_params
    }

    /// Mutable parameters used by the next step.
    pub fn integration_parameters_mut(&mut self) -> &mut IntegrationParameters {
        &mut self.integration_params
    }

    /// Adds a rigid body.
    pub fn insert_body(&mut self, desc: RigidBodyDesc) -> Result<RigidBodyHandle> {
        self.query_stale = true;
        self.bodies.insert(desc)
    }

    /// Adds a collider, attached to `parent` when given.
    pub fn insert_collider(
        &mut self,
        desc: ColliderDesc,
        parent: Option<RigidBodyHandle>,
    ) -> Result<ColliderHandle> {
        self.query_stale = true;
        match parent {
            Some(parent) => self
                .colliders
                .insert_with_parent(desc, parent, &mut self.bodies),
            None => self.colliders.insert(desc),
        }
    }

    /// Links two bodies with a joint.
    pub fn insert_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        params: impl Into<JointParams>,
    ) -> Result<JointHandle> {
        self.joints.insert(&mut self.bodies, body1, body2, params)
    }

    /// Removes a body with its colliders and joints.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) -> Result<RigidBody> {
        self.query_stale = true;
        self.pipeline.remove_rigid_body(
            handle,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
        )
    }

    /// Removes a collider.
    pub fn remove_collider(&mut self, handle: ColliderHandle, wake_up: bool) -> Result<Collider> {
        self.query_stale = true;
        self.pipeline.remove_collider(
            handle,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            wake_up,
        )
    }

    /// Removes a joint.
    pub fn remove_joint(&mut self, handle: JointHandle, wake_up: bool) -> Result<Joint> {
        self.joints.remove(handle, &mut self.bodies, wake_up)
    }

    /// The rigid bodies.
    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    /// Mutable rigid bodies. Marks the query pipeline for refresh.
    pub fn bodies_mut(&mut self) -> &mut RigidBodySet {
        self.query_stale = true;
        &mut self.bodies
    }

    /// The colliders.
    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    /// Mutable colliders. Marks the query pipeline for refresh.
    pub fn colliders_mut(&mut self) -> &mut ColliderSet {
        self.query_stale = true;
        &mut self.colliders
    }

    /// The joints.
    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    /// Mutable joints.
    pub fn joints_mut(&mut self) -> &mut JointSet {
        &mut self.joints
    }

    /// Contact and proximity state.
    pub fn narrow_phase(&self) -> &NarrowPhase {
        &self.narrow_phase
    }

    /// Events produced by the last step.
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Mutable access to the event queue, for draining.
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Closest collider hit by `ray` within `max_toi`.
    pub fn cast_ray(&mut self, ray: &Ray, max_toi: Real) -> Option<RayColliderHit> {
        if self.query_stale {
            self.query_pipeline.update(&self.bodies, &self.colliders);
            self.query_stale = false;
        }
        self.query_pipeline.cast_ray(&self.colliders, ray, max_toi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::BallJoint;
    use crate::math::Point;
    use crate::pipeline::ContactEvent;
    use approx::assert_relative_eq;

    fn world_with_ground() -> (PhysicsWorld, ColliderHandle) {
        let mut world = PhysicsWorld::new();
        let ground = world
            .insert_collider(
                ColliderDesc::cuboid(10.0, 0.5, 10.0).translation(Vector::new(0.0, -0.5, 0.0)),
                None,
            )
            .unwrap();
        (world, ground)
    }

    #[test]
    fn test_new_world() {
        let world = PhysicsWorld::new();
        assert!(world.bodies().is_empty());
        assert!(world.colliders().is_empty());
        assert_relative_eq!(world.gravity().y, -9.81);
        assert!(world.events().auto_drain());
    }

    #[test]
    fn test_set_gravity() {
        let mut world = PhysicsWorld::new();
        world.set_gravity(0.0, 0.0, 0.0);
        let body = world
            .insert_body(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 5.0, 0.0)))
            .unwrap();

        for _ in 0..10 {
            world.step(1.0 / 60.0).unwrap();
        }
        assert_relative_eq!(world.bodies().get(body).unwrap().translation().y, 5.0);
    }

    #[test]
    fn test_step_uses_given_dt() {
        let mut world = PhysicsWorld::new();
        world.step(0.01).unwrap();
        assert_relative_eq!(world.integration_parameters().dt, 0.01);
        assert!(world.step(0.0).is_err());
    }

    #[test]
    fn test_falling_ball_lands_on_ground() {
        let (mut world, ground) = world_with_ground();
        let body = world
            .insert_body(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 2.0, 0.0)))
            .unwrap();
        let ball = world
            .insert_collider(ColliderDesc::ball(0.5).density(1.0), Some(body))
            .unwrap();

        let mut started = Vec::new();
        for _ in 0..180 {
            world.step(1.0 / 60.0).unwrap();
            world
                .events_mut()
                .drain_contact_events(|a, b, s| started.push((a, b, s)));
        }

        assert_eq!(started.first(), Some(&(ground, ball, true)));
        let y = world.bodies().get(body).unwrap().translation().y;
        assert!((y - 0.5).abs() < 0.05, "ball rests at {y}");
    }

    #[test]
    fn test_cast_ray_follows_simulation() {
        let mut world = PhysicsWorld::new();
        let body = world
            .insert_body(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 10.0, 0.0)))
            .unwrap();
        let ball = world
            .insert_collider(ColliderDesc::ball(0.5).density(1.0), Some(body))
            .unwrap();
        let ray = Ray::new(Point::origin(), Vector::y());

        let hit = world.cast_ray(&ray, 100.0).unwrap();
        assert_eq!(hit.collider, ball);
        assert_relative_eq!(hit.toi, 9.5, epsilon = 1.0e-4);

        for _ in 0..30 {
            world.step(1.0 / 60.0).unwrap();
        }
        let y = world.bodies().get(body).unwrap().translation().y;
        let hit = world.cast_ray(&ray, 100.0).unwrap();
        assert_relative_eq!(hit.toi, y - 0.5, epsilon = 1.0e-4);
        assert!(hit.toi < 9.5);
    }

    #[test]
    fn test_remove_body_reports_stop() {
        let (mut world, ground) = world_with_ground();
        let body = world
            .insert_body(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 0.45, 0.0)))
            .unwrap();
        let ball = world
            .insert_collider(ColliderDesc::ball(0.5).density(1.0), Some(body))
            .unwrap();
        let other = world.insert_body(RigidBodyDesc::dynamic()).unwrap();
        world
            .insert_joint(body, other, BallJoint::new(Point::origin(), Point::origin()))
            .unwrap();

        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.events().contact_events(), &[ContactEvent::Started(ground, ball)]);

        world.remove_rigid_body(body).unwrap();
        assert!(world.joints().is_empty());
        assert!(world.cast_ray(&Ray::new(Point::new(0.0, 5.0, 0.0), -Vector::y()), 4.5).is_none());

        world.step(1.0 / 60.0).unwrap();
        assert_eq!(world.events().contact_events(), &[ContactEvent::Stopped(ground, ball)]);
    }
}
