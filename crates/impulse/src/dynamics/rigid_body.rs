//! Rigid bodies and their descriptors.

use nalgebra::{Quaternion, Unit};
use parry3d::mass_properties::MassProperties;

use crate::dynamics::activation::ActivationStatus;
use crate::error::{PhysicsError, Result};
use crate::geometry::ColliderHandle;
use crate::math::{
    is_finite_vector, AngVector, AngularInertia, Isometry, Point, Real, Rotation, Translation,
    Vector, DEFAULT_EPSILON,
};

/// How a body takes part in the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BodyStatus {
    /// Moved by forces, gravity and contacts.
    Dynamic,
    /// Never moves.
    Static,
    /// Moved by the caller; pushes dynamic bodies but is not pushed back.
    Kinematic,
}

/// A simulated rigid body. Created through [`RigidBodyDesc`].
#[derive(Clone, Debug)]
pub struct RigidBody {
    pub(crate) position: Isometry<Real>,
    pub(crate) next_kinematic_position: Option<Isometry<Real>>,
    pub(crate) linvel: Vector<Real>,
    pub(crate) angvel: AngVector<Real>,
    pub(crate) force: Vector<Real>,
    pub(crate) torque: AngVector<Real>,
    /// Extra velocity used only to integrate positions this step.
    pub(crate) position_correction: (Vector<Real>, AngVector<Real>),
    pub(crate) base_mass_properties: MassProperties,
    pub(crate) mass_properties: MassProperties,
    pub(crate) colliders_contribute_mass: bool,
    pub(crate) world_com: Point<Real>,
    pub(crate) effective_inv_mass: Real,
    pub(crate) effective_world_inv_inertia: AngularInertia,
    pub(crate) linear_damping: Real,
    pub(crate) angular_damping: Real,
    pub(crate) gravity_scale: Real,
    pub(crate) status: BodyStatus,
    pub(crate) activation: ActivationStatus,
    pub(crate) colliders: Vec<ColliderHandle>,
    pub(crate) translations_locked: bool,
    pub(crate) rotations_locked: bool,
    /// Arbitrary data attached by the caller.
    pub user_data: u128,
}

impl RigidBody {
    /// World-space pose of the body frame.
    pub fn position(&self) -> &Isometry<Real> {
        &self.position
    }

    /// World-space translation.
    pub fn translation(&self) -> &Vector<Real> {
        &self.position.translation.vector
    }

    /// World-space orientation.
    pub fn rotation(&self) -> &Rotation<Real> {
        &self.position.rotation
    }

    /// Pose the body will be moved to by the next step, for kinematic bodies.
    pub fn next_kinematic_position(&self) -> Option<&Isometry<Real>> {
        self.next_kinematic_position.as_ref()
    }

    /// Pose after one step of length `dt` at the current velocity.
    pub fn predicted_position(&self, dt: Real) -> Isometry<Real> {
        integrate_pose(&self.position, &self.world_com, &self.linvel, &self.angvel, dt)
    }

    /// Linear velocity.
    pub fn linvel(&self) -> &Vector<Real> {
        &self.linvel
    }

    /// Angular velocity.
    pub fn angvel(&self) -> &AngVector<Real> {
        &self.angvel
    }

    /// Total mass, including collider contributions.
    pub fn mass(&self) -> Real {
        self.mass_properties.mass()
    }

    /// Aggregated mass properties in the body frame.
    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass_properties
    }

    /// World-space center of mass.
    pub fn center_of_mass(&self) -> &Point<Real> {
        &self.world_com
    }

    /// Colliders attached to this body, in attachment order.
    pub fn colliders(&self) -> &[ColliderHandle] {
        &self.colliders
    }

    /// Simulation status.
    pub fn status(&self) -> BodyStatus {
        self.status
    }

    /// Returns true for dynamic bodies.
    pub fn is_dynamic(&self) -> bool {
        self.status == BodyStatus::Dynamic
    }

    /// Returns true for kinematic bodies.
    pub fn is_kinematic(&self) -> bool {
        self.status == BodyStatus::Kinematic
    }

    /// Returns true for static bodies.
    pub fn is_static(&self) -> bool {
        self.status == BodyStatus::Static
    }

    /// Returns true if the body is asleep.
    pub fn is_sleeping(&self) -> bool {
        self.activation.sleeping
    }

    /// Returns true if either velocity is non-zero.
    pub fn is_moving(&self) -> bool {
        self.linvel != Vector::zeros() || self.angvel != AngVector::zeros()
    }

    /// Activation bookkeeping.
    pub fn activation(&self) -> &ActivationStatus {
        &self.activation
    }

    /// Linear damping coefficient.
    pub fn linear_damping(&self) -> Real {
        self.linear_damping
    }

    /// Angular damping coefficient.
    pub fn angular_damping(&self) -> Real {
        self.angular_damping
    }

    /// Multiplier applied to gravity for this body.
    pub fn gravity_scale(&self) -> Real {
        self.gravity_scale
    }

    /// Sets the linear damping coefficient.
    pub fn set_linear_damping(&mut self, damping: Real) {
        self.linear_damping = damping;
    }

    /// Sets the angular damping coefficient.
    pub fn set_angular_damping(&mut self, damping: Real) {
        self.angular_damping = damping;
    }

    /// Sets the gravity multiplier.
    pub fn set_gravity_scale(&mut self, scale: Real, wake_up: bool) {
        self.gravity_scale = scale;
        self.maybe_wake_up(wake_up);
    }

    /// Changes the status. Non-dynamic bodies lose their velocity unless kinematic.
    pub fn set_body_status(&mut self, status: BodyStatus) {
        if status == self.status {
            return;
        }
        self.status = status;
        match status {
            BodyStatus::Static => {
                self.linvel = Vector::zeros();
                self.angvel = AngVector::zeros();
                self.activation = ActivationStatus::awake(self.activation.can_sleep);
            }
            BodyStatus::Kinematic => self.activation.wake_up(true),
            BodyStatus::Dynamic => {
                self.next_kinematic_position = None;
                self.activation.wake_up(true);
            }
        }
        self.update_world_mass_properties();
    }

    /// Enables or disables sleeping for this body.
    pub fn set_can_sleep(&mut self, can_sleep: bool) {
        self.activation.can_sleep = can_sleep;
        if !can_sleep {
            self.activation.wake_up(true);
        }
    }

    /// Puts the body to sleep now, zeroing its velocity.
    pub fn sleep(&mut self) {
        if self.is_static() {
            return;
        }
        self.activation.sleep();
        self.linvel = Vector::zeros();
        self.angvel = AngVector::zeros();
        self.force = Vector::zeros();
        self.torque = AngVector::zeros();
    }

    /// Wakes the body up. A `strong` wake-up also restarts its rest counter.
    pub fn wake_up(&mut self, strong: bool) {
        if !self.is_static() {
            self.activation.wake_up(strong);
        }
    }

    fn maybe_wake_up(&mut self, wake_up: bool) {
        if wake_up {
            self.wake_up(true);
        }
    }

    /// Wakes the body if asked, then reports whether its velocity may change.
    /// A sleeping body keeps zero velocity.
    fn accepts_velocity_change(&mut self, wake_up: bool) -> bool {
        self.maybe_wake_up(wake_up);
        if self.is_sleeping() {
            log::debug!("ignoring velocity change on a sleeping body without wake-up");
            return false;
        }
        true
    }

    /// Teleports the body origin.
    pub fn set_translation(&mut self, translation: Vector<Real>, wake_up: bool) {
        self.position.translation.vector = translation;
        self.update_world_mass_properties();
        self.maybe_wake_up(wake_up);
    }

    /// Teleports the body orientation.
    pub fn set_rotation(&mut self, rotation: Rotation<Real>, wake_up: bool) {
        self.position.rotation = rotation;
        self.update_world_mass_properties();
        self.maybe_wake_up(wake_up);
    }

    /// Teleports the body.
    pub fn set_position(&mut self, position: Isometry<Real>, wake_up: bool) {
        self.position = position;
        self.update_world_mass_properties();
        self.maybe_wake_up(wake_up);
    }

    /// Sets the linear velocity.
    ///
    /// Ignored for static bodies, and for sleeping bodies unless `wake_up` is set.
    pub fn set_linvel(&mut self, linvel: Vector<Real>, wake_up: bool) {
        if !self.is_static() && self.accepts_velocity_change(wake_up) {
            self.linvel = linvel;
        }
    }

    /// Sets the angular velocity.
    pub fn set_angvel(&mut self, angvel: AngVector<Real>, wake_up: bool) {
        if !self.is_static() && self.accepts_velocity_change(wake_up) {
            self.angvel = angvel;
        }
    }

    /// Target translation reached at the end of the next step.
    pub fn set_next_kinematic_translation(&mut self, translation: Vector<Real>) {
        if self.is_kinematic() {
            let mut next = self.next_kinematic_position.unwrap_or(self.position);
            next.translation.vector = translation;
            self.next_kinematic_position = Some(next);
        }
    }

    /// Target orientation reached at the end of the next step.
    pub fn set_next_kinematic_rotation(&mut self, rotation: Rotation<Real>) {
        if self.is_kinematic() {
            let mut next = self.next_kinematic_position.unwrap_or(self.position);
            next.rotation = rotation;
            self.next_kinematic_position = Some(next);
        }
    }

    /// Target pose reached at the end of the next step.
    pub fn set_next_kinematic_position(&mut self, position: Isometry<Real>) {
        if self.is_kinematic() {
            self.next_kinematic_position = Some(position);
        }
    }

    /// Adds a force applied at the center of mass until the end of the step.
    ///
    /// Forces, torques and impulses are ignored by sleeping bodies unless
    /// `wake_up` is set.
    pub fn apply_force(&mut self, force: Vector<Real>, wake_up: bool) {
        if self.is_dynamic() && self.accepts_velocity_change(wake_up) {
            self.force += force;
        }
    }

    /// Adds a torque applied until the end of the step.
    pub fn apply_torque(&mut self, torque: AngVector<Real>, wake_up: bool) {
        if self.is_dynamic() && self.accepts_velocity_change(wake_up) {
            self.torque += torque;
        }
    }

    /// Adds a force applied at a world-space point until the end of the step.
    pub fn apply_force_at_point(&mut self, force: Vector<Real>, point: Point<Real>, wake_up: bool) {
        if self.is_dynamic() && self.accepts_velocity_change(wake_up) {
            self.force += force;
            self.torque += (point - self.world_com).cross(&force);
        }
    }

    /// Instantly changes the momentum at the center of mass.
    pub fn apply_impulse(&mut self, impulse: Vector<Real>, wake_up: bool) {
        if self.is_dynamic() && self.accepts_velocity_change(wake_up) {
            self.linvel += impulse * self.effective_inv_mass;
        }
    }

    /// Instantly changes the angular momentum.
    pub fn apply_torque_impulse(&mut self, torque_impulse: AngVector<Real>, wake_up: bool) {
        if self.is_dynamic() && self.accepts_velocity_change(wake_up) {
            self.angvel += self.effective_world_inv_inertia * torque_impulse;
        }
    }

    /// Instantly changes the momentum at a world-space point.
    pub fn apply_impulse_at_point(
        &mut self,
        impulse: Vector<Real>,
        point: Point<Real>,
        wake_up: bool,
    ) {
        let torque_impulse = (point - self.world_com).cross(&impulse);
        self.apply_impulse(impulse, wake_up);
        self.apply_torque_impulse(torque_impulse, wake_up);
    }

    /// Recomputes the aggregated mass from the base values and the given
    /// collider contributions, each already expressed in the body frame.
    pub(crate) fn set_collider_mass_contributions(
        &mut self,
        contributions: impl Iterator<Item = MassProperties>,
    ) {
        let mut total = self.base_mass_properties;
        if self.colliders_contribute_mass {
            for mprops in contributions {
                total += mprops;
            }
        }
        self.mass_properties = total;
        self.update_world_mass_properties();
    }

    /// Refreshes world-space center of mass and the effective inverse
    /// mass/inertia after a pose or mass change.
    pub(crate) fn update_world_mass_properties(&mut self) {
        self.world_com = self.position * self.mass_properties.local_com;

        if !self.is_dynamic() {
            self.effective_inv_mass = 0.0;
            self.effective_world_inv_inertia = AngularInertia::zeros();
            return;
        }

        self.effective_inv_mass = if self.translations_locked {
            0.0
        } else {
            self.mass_properties.inv_mass
        };

        self.effective_world_inv_inertia = if self.rotations_locked {
            AngularInertia::zeros()
        } else {
            let inv_principal = self
                .mass_properties
                .principal_inertia()
                .map(|i| if i > DEFAULT_EPSILON { 1.0 / i } else { 0.0 });
            let frame = (self.position.rotation
                * self.mass_properties.principal_inertia_local_frame)
                .to_rotation_matrix();
            frame.matrix() * AngularInertia::from_diagonal(&inv_principal) * frame.matrix().transpose()
        };
    }

    /// Integrates gravity, applied forces and damping into the velocities.
    pub(crate) fn integrate_forces(&mut self, dt: Real, gravity: &Vector<Real>) {
        let linacc = if self.translations_locked {
            Vector::zeros()
        } else {
            self.force * self.effective_inv_mass + gravity * self.gravity_scale
        };
        let angacc = self.effective_world_inv_inertia * self.torque;

        self.linvel += linacc * dt;
        self.angvel += angacc * dt;
        self.linvel *= 1.0 / (1.0 + dt * self.linear_damping);
        self.angvel *= 1.0 / (1.0 + dt * self.angular_damping);
    }

    /// Applies velocity plus position correction to the pose.
    pub(crate) fn integrate_position(&mut self, dt: Real) {
        let (dlin, dang) = self.position_correction;
        let linvel = self.linvel + dlin;
        let angvel = self.angvel + dang;
        self.position = integrate_pose(&self.position, &self.world_com, &linvel, &angvel, dt);
        self.position_correction = (Vector::zeros(), AngVector::zeros());
        self.update_world_mass_properties();
    }

    pub(crate) fn reset_forces(&mut self) {
        self.force = Vector::zeros();
        self.torque = AngVector::zeros();
    }
}

/// Advances `position` by a constant velocity, rotating about `com`.
fn integrate_pose(
    position: &Isometry<Real>,
    com: &Point<Real>,
    linvel: &Vector<Real>,
    angvel: &AngVector<Real>,
    dt: Real,
) -> Isometry<Real> {
    let shift = Translation::from(com.coords);
    let delta = Isometry::new(linvel * dt, angvel * dt);
    let mut result = shift * delta * shift.inverse() * position;
    result.rotation.renormalize_fast();
    result
}

/// Descriptor used to create a [`RigidBody`].
#[derive(Clone, Debug)]
pub struct RigidBodyDesc {
    status: BodyStatus,
    translation: Vector<Real>,
    rotation: Quaternion<Real>,
    linvel: Vector<Real>,
    angvel: AngVector<Real>,
    linear_damping: Real,
    angular_damping: Real,
    gravity_scale: Real,
    can_sleep: bool,
    sleeping: bool,
    mass: Real,
    center_of_mass: Point<Real>,
    principal_inertia: AngVector<Real>,
    principal_inertia_frame: Quaternion<Real>,
    colliders_contribute_mass: bool,
    translations_locked: bool,
    rotations_locked: bool,
    user_data: u128,
}

impl RigidBodyDesc {
    /// A descriptor for a body with the given status at the origin.
    pub fn new(status: BodyStatus) -> Self {
        Self {
            status,
            translation: Vector::zeros(),
            rotation: Quaternion::identity(),
            linvel: Vector::zeros(),
            angvel: AngVector::zeros(),
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            can_sleep: true,
            sleeping: false,
            mass: 0.0,
            center_of_mass: Point::origin(),
            principal_inertia: AngVector::zeros(),
            principal_inertia_frame: Quaternion::identity(),
            colliders_contribute_mass: true,
            translations_locked: false,
            rotations_locked: false,
            user_data: 0,
        }
    }

    /// A dynamic body.
    pub fn dynamic() -> Self {
        Self::new(BodyStatus::Dynamic)
    }

    /// A static body.
    pub fn new_static() -> Self {
        Self::new(BodyStatus::Static)
    }

    /// A kinematic body.
    pub fn kinematic() -> Self {
        Self::new(BodyStatus::Kinematic)
    }

    /// Initial translation.
    pub fn translation(mut self, translation: Vector<Real>) -> Self {
        self.translation = translation;
        self
    }

    /// Initial orientation.
    pub fn rotation(mut self, rotation: Rotation<Real>) -> Self {
        self.rotation = rotation.into_inner();
        self
    }

    /// Initial orientation as a raw quaternion, normalized on creation.
    pub fn quaternion(mut self, rotation: Quaternion<Real>) -> Self {
        self.rotation = rotation;
        self
    }

    /// Initial pose.
    pub fn position(mut self, position: Isometry<Real>) -> Self {
        self.translation = position.translation.vector;
        self.rotation = position.rotation.into_inner();
        self
    }

    /// Initial linear velocity.
    pub fn linvel(mut self, linvel: Vector<Real>) -> Self {
        self.linvel = linvel;
        self
    }

    /// Initial angular velocity.
    pub fn angvel(mut self, angvel: AngVector<Real>) -> Self {
        self.angvel = angvel;
        self
    }

    /// Linear damping coefficient.
    pub fn linear_damping(mut self, damping: Real) -> Self {
        self.linear_damping = damping;
        self
    }

    /// Angular damping coefficient.
    pub fn angular_damping(mut self, damping: Real) -> Self {
        self.angular_damping = damping;
        self
    }

    /// Gravity multiplier.
    pub fn gravity_scale(mut self, scale: Real) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Whether the body may fall asleep.
    pub fn can_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    /// Whether the body starts asleep.
    pub fn sleeping(mut self, sleeping: bool) -> Self {
        self.sleeping = sleeping;
        self
    }

    /// Base mass. Collider densities add to it when `colliders_contribute` is set.
    pub fn mass(mut self, mass: Real, colliders_contribute: bool) -> Self {
        self.mass = mass;
        self.colliders_contribute_mass = colliders_contribute;
        self
    }

    /// Base center of mass in the body frame.
    pub fn center_of_mass(mut self, com: Point<Real>) -> Self {
        self.center_of_mass = com;
        self
    }

    /// Base principal angular inertia and the frame it is expressed in.
    pub fn principal_angular_inertia(
        mut self,
        inertia: AngVector<Real>,
        frame: Rotation<Real>,
    ) -> Self {
        self.principal_inertia = inertia;
        self.principal_inertia_frame = frame.into_inner();
        self
    }

    /// Prevents any translation.
    pub fn lock_translations(mut self) -> Self {
        self.translations_locked = true;
        self
    }

    /// Prevents any rotation.
    pub fn lock_rotations(mut self) -> Self {
        self.rotations_locked = true;
        self
    }

    /// Caller data stored on the body.
    pub fn user_data(mut self, data: u128) -> Self {
        self.user_data = data;
        self
    }

    /// Rejects descriptors that would put NaNs or degenerate frames into
    /// the simulation.
    pub fn validate(&self) -> Result<()> {
        validate_quaternion("rotation", &self.rotation)?;
        validate_quaternion("principal inertia frame", &self.principal_inertia_frame)?;

        for (name, v) in [
            ("translation", &self.translation),
            ("linear velocity", &self.linvel),
            ("angular velocity", &self.angvel),
            ("center of mass", &self.center_of_mass.coords),
        ] {
            if !is_finite_vector(v) {
                return Err(PhysicsError::DegenerateInput(format!(
                    "{name} is not finite: {v:?}"
                )));
            }
        }

        for (name, value) in [
            ("linear damping", self.linear_damping),
            ("angular damping", self.angular_damping),
            ("mass", self.mass),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PhysicsError::DegenerateInput(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }

        if !self.gravity_scale.is_finite() {
            return Err(PhysicsError::DegenerateInput(format!(
                "gravity scale is not finite: {}",
                self.gravity_scale
            )));
        }

        if !self.principal_inertia.iter().all(|i| i.is_finite() && *i >= 0.0) {
            return Err(PhysicsError::DegenerateInput(format!(
                "principal inertia must be non-negative, got {:?}",
                self.principal_inertia
            )));
        }

        Ok(())
    }

    /// Builds the body. Callers validate first.
    pub(crate) fn build(&self) -> RigidBody {
        let rotation = Unit::new_normalize(self.rotation);
        let frame = Unit::new_normalize(self.principal_inertia_frame);
        let base = MassProperties::with_principal_inertia_frame(
            self.center_of_mass,
            self.mass,
            self.principal_inertia,
            frame,
        );

        // Static bodies never sleep but keep `can_sleep` for a later status change.
        let activation = match (self.status, self.sleeping) {
            (BodyStatus::Static, _) => ActivationStatus::awake(self.can_sleep),
            (_, true) => ActivationStatus::asleep(self.can_sleep),
            (_, false) => ActivationStatus::awake(self.can_sleep),
        };
        let asleep = activation.sleeping;

        let mut body = RigidBody {
            position: Isometry::from_parts(Translation::from(self.translation), rotation),
            next_kinematic_position: None,
            linvel: if asleep || self.status == BodyStatus::Static {
                Vector::zeros()
            } else {
                self.linvel
            },
            angvel: if asleep || self.status == BodyStatus::Static {
                AngVector::zeros()
            } else {
                self.angvel
            },
            force: Vector::zeros(),
            torque: AngVector::zeros(),
            position_correction: (Vector::zeros(), AngVector::zeros()),
            base_mass_properties: base,
            mass_properties: base,
            colliders_contribute_mass: self.colliders_contribute_mass,
            world_com: Point::origin(),
            effective_inv_mass: 0.0,
            effective_world_inv_inertia: AngularInertia::zeros(),
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
            gravity_scale: self.gravity_scale,
            status: self.status,
            activation,
            colliders: Vec::new(),
            translations_locked: self.translations_locked,
            rotations_locked: self.rotations_locked,
            user_data: self.user_data,
        };
        body.update_world_mass_properties();
        body
    }
}

fn validate_quaternion(name: &str, q: &Quaternion<Real>) -> Result<()> {
    let norm = q.norm();
    if !norm.is_finite() || norm < DEFAULT_EPSILON {
        return Err(PhysicsError::DegenerateInput(format!(
            "{name} quaternion has zero or non-finite length"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_zero_quaternion() {
        let desc = RigidBodyDesc::dynamic().quaternion(Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert!(matches!(
            desc.validate(),
            Err(PhysicsError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_rejects_negative_mass_and_nan() {
        assert!(RigidBodyDesc::dynamic().mass(-1.0, true).validate().is_err());
        assert!(RigidBodyDesc::dynamic()
            .linvel(Vector::new(Real::NAN, 0.0, 0.0))
            .validate()
            .is_err());
        assert!(RigidBodyDesc::dynamic().linear_damping(-0.1).validate().is_err());
    }

    #[test]
    fn test_raw_quaternion_is_normalized() {
        let body = RigidBodyDesc::dynamic()
            .quaternion(Quaternion::new(2.0, 0.0, 0.0, 0.0))
            .build();
        assert_relative_eq!(body.rotation().angle(), 0.0, epsilon = 1.0e-6);
    }

    #[test]
    fn test_static_body_ignores_velocity_changes() {
        let mut body = RigidBodyDesc::new_static().build();
        body.set_linvel(Vector::new(1.0, 0.0, 0.0), true);
        body.apply_impulse(Vector::new(1.0, 0.0, 0.0), true);
        assert_eq!(*body.linvel(), Vector::zeros());
        assert!(!body.is_moving());
    }

    #[test]
    fn test_impulse_uses_mass() {
        let mut body = RigidBodyDesc::dynamic().mass(2.0, true).build();
        body.apply_impulse(Vector::new(4.0, 0.0, 0.0), true);
        assert_relative_eq!(*body.linvel(), Vector::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_wake_flag_on_setter() {
        let mut body = RigidBodyDesc::dynamic().sleeping(true).build();
        assert!(body.is_sleeping());

        body.set_linvel(Vector::new(0.0, 1.0, 0.0), false);
        assert!(body.is_sleeping());

        body.set_linvel(Vector::new(0.0, 1.0, 0.0), true);
        assert!(!body.is_sleeping());
    }

    #[test]
    fn test_sleeping_body_keeps_zero_velocity_without_wake_up() {
        let mut body = RigidBodyDesc::dynamic().mass(1.0, true).build();
        body.sleep();

        body.set_linvel(Vector::new(3.0, 0.0, 0.0), false);
        body.set_angvel(AngVector::new(0.0, 1.0, 0.0), false);
        body.apply_impulse(Vector::new(0.0, 2.0, 0.0), false);
        body.apply_impulse_at_point(Vector::new(1.0, 0.0, 0.0), Point::new(0.0, 1.0, 0.0), false);
        body.apply_force(Vector::new(5.0, 0.0, 0.0), false);

        assert!(body.is_sleeping());
        assert_eq!(*body.linvel(), Vector::zeros());
        assert_eq!(*body.angvel(), AngVector::zeros());

        // Nothing stored fires once the body wakes.
        body.wake_up(true);
        body.integrate_forces(0.1, &Vector::zeros());
        assert_eq!(*body.linvel(), Vector::zeros());

        body.apply_impulse(Vector::new(0.0, 2.0, 0.0), false);
        assert_relative_eq!(*body.linvel(), Vector::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_static_body_keeps_can_sleep_through_status_change() {
        let mut body = RigidBodyDesc::new_static().can_sleep(true).build();
        assert!(!body.is_sleeping());

        body.set_body_status(BodyStatus::Dynamic);
        assert!(body.activation().can_sleep());

        let mut pinned = RigidBodyDesc::new_static().can_sleep(false).build();
        pinned.set_body_status(BodyStatus::Dynamic);
        assert!(!pinned.activation().can_sleep());
    }

    #[test]
    fn test_sleep_zeroes_velocity() {
        let mut body = RigidBodyDesc::dynamic()
            .linvel(Vector::new(1.0, 2.0, 3.0))
            .angvel(AngVector::new(0.5, 0.0, 0.0))
            .build();
        body.sleep();
        assert!(body.is_sleeping());
        assert_eq!(*body.linvel(), Vector::zeros());
        assert_eq!(*body.angvel(), AngVector::zeros());
    }

    #[test]
    fn test_kinematic_target_only_for_kinematic() {
        let mut dynamic = RigidBodyDesc::dynamic().build();
        dynamic.set_next_kinematic_translation(Vector::new(1.0, 0.0, 0.0));
        assert!(dynamic.next_kinematic_position().is_none());

        let mut kinematic = RigidBodyDesc::kinematic().build();
        kinematic.set_next_kinematic_translation(Vector::new(1.0, 0.0, 0.0));
        kinematic.set_next_kinematic_rotation(Rotation::from_axis_angle(&Vector::y_axis(), 0.5));
        let next = kinematic.next_kinematic_position().unwrap();
        assert_relative_eq!(next.translation.vector, Vector::new(1.0, 0.0, 0.0));
        assert_relative_eq!(next.rotation.angle(), 0.5, epsilon = 1.0e-6);
    }

    #[test]
    fn test_force_integration_with_damping() {
        let mut body = RigidBodyDesc::dynamic()
            .mass(1.0, true)
            .linear_damping(1.0)
            .build();
        body.apply_force(Vector::new(10.0, 0.0, 0.0), true);
        body.integrate_forces(0.1, &Vector::zeros());
        // (10 * 0.1) / (1 + 0.1)
        assert_relative_eq!(body.linvel().x, 1.0 / 1.1, epsilon = 1.0e-5);
    }

    #[test]
    fn test_rotation_about_offset_center_of_mass() {
        let mut body = RigidBodyDesc::dynamic()
            .mass(1.0, false)
            .center_of_mass(Point::new(1.0, 0.0, 0.0))
            .principal_angular_inertia(AngVector::repeat(1.0), Rotation::identity())
            .angvel(AngVector::new(0.0, std::f32::consts::PI, 0.0))
            .build();
        body.integrate_position(1.0);

        // Half a turn around the center of mass moves the origin to (2, 0, 0).
        assert_relative_eq!(*body.translation(), Vector::new(2.0, 0.0, 0.0), epsilon = 1.0e-4);
        assert_relative_eq!(*body.center_of_mass(), Point::new(1.0, 0.0, 0.0), epsilon = 1.0e-4);
    }
}
