//! Colliders and their descriptors.

use nalgebra::{DMatrix, Quaternion, Unit};
use parry3d::bounding_volume::Aabb;
use parry3d::mass_properties::MassProperties;

use crate::dynamics::RigidBodyHandle;
use crate::error::{PhysicsError, Result};
use crate::geometry::{InteractionGroups, Shape, ShapeType};
use crate::math::{is_finite_vector, Isometry, Point, Real, Rotation, Translation, Vector, DEFAULT_EPSILON};

/// Geometry attached to a rigid body (or to the world) that takes part in
/// collision detection. Created through [`ColliderDesc`].
#[derive(Clone, Debug)]
pub struct Collider {
    pub(crate) shape: Shape,
    pub(crate) density: Option<Real>,
    pub(crate) friction: Real,
    pub(crate) restitution: Real,
    pub(crate) is_sensor: bool,
    pub(crate) collision_groups: InteractionGroups,
    pub(crate) solver_groups: InteractionGroups,
    pub(crate) parent: Option<RigidBodyHandle>,
    pub(crate) position_wrt_parent: Isometry<Real>,
    pub(crate) position: Isometry<Real>,
    /// Arbitrary data attached by the caller.
    pub user_data: u128,
}

impl Collider {
    /// World-space pose, as of the last step or attachment.
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

    /// Pose relative to the parent body (or to the world if free-standing).
    pub fn position_wrt_parent(&self) -> &Isometry<Real> {
        &self.position_wrt_parent
    }

    /// The shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The shape's variant.
    pub fn shape_type(&self) -> ShapeType {
        self.shape.shape_type()
    }

    /// Sensors report proximity instead of generating contacts.
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Body this collider is attached to.
    pub fn parent(&self) -> Option<RigidBodyHandle> {
        self.parent
    }

    /// Friction coefficient.
    pub fn friction(&self) -> Real {
        self.friction
    }

    /// Restitution coefficient.
    pub fn restitution(&self) -> Real {
        self.restitution
    }

    /// Density, if this collider contributes mass.
    pub fn density(&self) -> Option<Real> {
        self.density
    }

    /// Groups used to filter contact and proximity detection.
    pub fn collision_groups(&self) -> InteractionGroups {
        self.collision_groups
    }

    /// Groups used to filter which contacts reach the solver.
    pub fn solver_groups(&self) -> InteractionGroups {
        self.solver_groups
    }

    /// Sets the friction coefficient. Negative or non-finite values are rejected.
    pub fn set_friction(&mut self, friction: Real) -> Result<()> {
        self.friction = validate_coefficient("friction", friction)?;
        Ok(())
    }

    /// Sets the restitution coefficient. Negative or non-finite values are rejected.
    pub fn set_restitution(&mut self, restitution: Real) -> Result<()> {
        self.restitution = validate_coefficient("restitution", restitution)?;
        Ok(())
    }

    /// Sets the collision groups.
    pub fn set_collision_groups(&mut self, groups: InteractionGroups) {
        self.collision_groups = groups;
    }

    /// Sets the solver groups.
    pub fn set_solver_groups(&mut self, groups: InteractionGroups) {
        self.solver_groups = groups;
    }

    /// World-space bounding box at the current pose.
    pub fn compute_aabb(&self) -> Aabb {
        self.shape.compute_aabb(&self.position)
    }

    /// Mass contribution expressed in the parent body frame.
    pub fn mass_properties(&self) -> MassProperties {
        match self.density {
            Some(density) => self
                .shape
                .mass_properties(density)
                .transform_by(&self.position_wrt_parent),
            None => MassProperties::new(Point::origin(), 0.0, Vector::zeros()),
        }
    }
}

/// Descriptor used to create a [`Collider`].
#[derive(Clone, Debug)]
pub struct ColliderDesc {
    shape: Shape,
    density: Option<Real>,
    friction: Real,
    restitution: Real,
    translation: Vector<Real>,
    rotation: Quaternion<Real>,
    is_sensor: bool,
    collision_groups: InteractionGroups,
    solver_groups: InteractionGroups,
    user_data: u128,
}

impl ColliderDesc {
    /// A descriptor for the given shape with default material.
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            density: None,
            friction: 0.5,
            restitution: 0.0,
            translation: Vector::zeros(),
            rotation: Quaternion::identity(),
            is_sensor: false,
            collision_groups: InteractionGroups::all(),
            solver_groups: InteractionGroups::all(),
            user_data: 0,
        }
    }

    /// A ball collider.
    pub fn ball(radius: Real) -> Self {
        Self::new(Shape::ball(radius))
    }

    /// A cuboid collider.
    pub fn cuboid(hx: Real, hy: Real, hz: Real) -> Self {
        Self::new(Shape::cuboid(hx, hy, hz))
    }

    /// A capsule collider along Y.
    pub fn capsule(half_height: Real, radius: Real) -> Self {
        Self::new(Shape::capsule(half_height, radius))
    }

    /// A cylinder collider along Y.
    pub fn cylinder(half_height: Real, radius: Real) -> Self {
        Self::new(Shape::cylinder(half_height, radius))
    }

    /// A cone collider along Y.
    pub fn cone(half_height: Real, radius: Real) -> Self {
        Self::new(Shape::cone(half_height, radius))
    }

    /// A triangle mesh collider.
    pub fn trimesh(vertices: Vec<Point<Real>>, indices: Vec<[u32; 3]>) -> Result<Self> {
        Shape::trimesh(vertices, indices).map(Self::new)
    }

    /// A height field collider.
    pub fn heightfield(heights: DMatrix<Real>, scale: Vector<Real>) -> Result<Self> {
        Shape::heightfield(heights, scale).map(Self::new)
    }

    /// Density; colliders without one add no mass to their parent.
    pub fn density(mut self, density: Real) -> Self {
        self.density = Some(density);
        self
    }

    /// Friction coefficient.
    pub fn friction(mut self, friction: Real) -> Self {
        self.friction = friction;
        self
    }

    /// Restitution coefficient.
    pub fn restitution(mut self, restitution: Real) -> Self {
        self.restitution = restitution;
        self
    }

    /// Translation relative to the parent.
    pub fn translation(mut self, translation: Vector<Real>) -> Self {
        self.translation = translation;
        self
    }

    /// Orientation relative to the parent.
    pub fn rotation(mut self, rotation: Rotation<Real>) -> Self {
        self.rotation = rotation.into_inner();
        self
    }

    /// Orientation relative to the parent as a raw quaternion.
    pub fn quaternion(mut self, rotation: Quaternion<Real>) -> Self {
        self.rotation = rotation;
        self
    }

    /// Turns the collider into a sensor.
    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Collision groups.
    pub fn collision_groups(mut self, groups: InteractionGroups) -> Self {
        self.collision_groups = groups;
        self
    }

    /// Solver groups.
    pub fn solver_groups(mut self, groups: InteractionGroups) -> Self {
        self.solver_groups = groups;
        self
    }

    /// Caller data stored on the collider.
    pub fn user_data(mut self, data: u128) -> Self {
        self.user_data = data;
        self
    }

    /// Rejects descriptors with degenerate geometry or material.
    pub fn validate(&self) -> Result<()> {
        self.shape.validate()?;

        if let Some(density) = self.density {
            if !(density.is_finite() && density >= 0.0) {
                return Err(PhysicsError::DegenerateInput(format!(
                    "density must be non-negative and finite, got {density}"
                )));
            }
        }

        validate_coefficient("friction", self.friction)?;
        validate_coefficient("restitution", self.restitution)?;

        if !is_finite_vector(&self.translation) {
            return Err(PhysicsError::DegenerateInput(format!(
                "translation is not finite: {:?}",
                self.translation
            )));
        }

        let norm = self.rotation.norm();
        if !norm.is_finite() || norm < DEFAULT_EPSILON {
            return Err(PhysicsError::DegenerateInput(
                "rotation quaternion has zero or non-finite length".into(),
            ));
        }

        Ok(())
    }

    /// Builds the collider. Callers validate first.
    pub(crate) fn build(&self, parent: Option<RigidBodyHandle>) -> Collider {
        let position_wrt_parent = Isometry::from_parts(
            Translation::from(self.translation),
            Unit::new_normalize(self.rotation),
        );

        Collider {
            shape: self.shape.clone(),
            density: self.density,
            friction: self.friction,
            restitution: self.restitution,
            is_sensor: self.is_sensor,
            collision_groups: self.collision_groups,
            solver_groups: self.solver_groups,
            parent,
            position_wrt_parent,
            position: position_wrt_parent,
            user_data: self.user_data,
        }
    }
}

fn validate_coefficient(name: &str, value: Real) -> Result<Real> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PhysicsError::DegenerateInput(format!(
            "{name} must be non-negative and finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_negative_density() {
        assert!(matches!(
            ColliderDesc::ball(1.0).density(-1.0).validate(),
            Err(PhysicsError::DegenerateInput(_))
        ));
        assert!(ColliderDesc::ball(1.0).density(Real::NAN).validate().is_err());
        assert!(ColliderDesc::ball(1.0).density(0.0).validate().is_ok());
    }

    #[test]
    fn test_material_setters_reject_bad_values() {
        let mut collider = ColliderDesc::ball(1.0).friction(0.3).build(None);

        assert!(collider.set_friction(-0.5).is_err());
        assert!(collider.set_restitution(Real::NAN).is_err());
        assert_relative_eq!(collider.friction(), 0.3);
        assert_relative_eq!(collider.restitution(), 0.0);

        collider.set_friction(0.8).unwrap();
        collider.set_restitution(0.25).unwrap();
        assert_relative_eq!(collider.friction(), 0.8);
        assert_relative_eq!(collider.restitution(), 0.25);
    }

    #[test]
    fn test_massless_collider_contributes_nothing() {
        let collider = ColliderDesc::cuboid(1.0, 1.0, 1.0).build(None);
        assert_relative_eq!(collider.mass_properties().mass(), 0.0);
    }

    #[test]
    fn test_rejects_zero_quaternion() {
        let desc = ColliderDesc::ball(1.0).quaternion(Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert!(desc.validate().is_err());
    }

    #[test]
    fn test_no_density_no_mass() {
        let collider = ColliderDesc::cuboid(1.0, 1.0, 1.0).build(None);
        assert_eq!(collider.mass_properties().mass(), 0.0);
    }

    #[test]
    fn test_mass_is_expressed_in_parent_frame() {
        let collider = ColliderDesc::ball(0.5)
            .density(1.0)
            .translation(Vector::new(0.0, 2.0, 0.0))
            .build(None);
        let mprops = collider.mass_properties();
        assert_relative_eq!(mprops.local_com, Point::new(0.0, 2.0, 0.0), epsilon = 1.0e-5);
    }
}
