//! Closed set of collision shapes.

use nalgebra::DMatrix;
use parry3d::bounding_volume::Aabb;
use parry3d::mass_properties::MassProperties;
use parry3d::shape::{Ball, Capsule, Cone, Cuboid, Cylinder, HeightField, TriMesh};
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::math::{Isometry, Point, Real, Vector};

/// Discriminant of a [`Shape`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeType {
    /// Sphere.
    Ball,
    /// Box.
    Cuboid,
    /// Y-aligned capsule.
    Capsule,
    /// Triangle mesh.
    TriMesh,
    /// Height field on the XZ plane.
    HeightField,
    /// Y-aligned cylinder.
    Cylinder,
    /// Y-aligned cone.
    Cone,
}

/// Collision shape attached to a collider.
///
/// Every geometric query goes through [`Shape::as_parry`], so adding a
/// variant is a compile error at each place that must learn about it.
#[derive(Clone, Debug)]
pub enum Shape {
    /// Sphere.
    Ball(Ball),
    /// Box given by half extents.
    Cuboid(Cuboid),
    /// Capsule along the local Y axis.
    Capsule(Capsule),
    /// Triangle mesh.
    TriMesh(TriMesh),
    /// Height field.
    HeightField(HeightField),
    /// Cylinder along the local Y axis.
    Cylinder(Cylinder),
    /// Cone along the local Y axis.
    Cone(Cone),
}

impl Shape {
    /// A sphere of the given radius.
    pub fn ball(radius: Real) -> Self {
        Shape::Ball(Ball::new(radius))
    }

    /// A box with the given half extents.
    pub fn cuboid(hx: Real, hy: Real, hz: Real) -> Self {
        Shape::Cuboid(Cuboid::new(Vector::new(hx, hy, hz)))
    }

    /// A capsule along Y; `half_height` excludes the caps.
    pub fn capsule(half_height: Real, radius: Real) -> Self {
        Shape::Capsule(Capsule::new_y(half_height, radius))
    }

    /// A cylinder along Y.
    pub fn cylinder(half_height: Real, radius: Real) -> Self {
        // `Cylinder::new` asserts on the sign; bad dimensions are left to `validate`.
        Shape::Cylinder(Cylinder {
            half_height,
            radius,
        })
    }

    /// A cone along Y with its apex at `+half_height`.
    pub fn cone(half_height: Real, radius: Real) -> Self {
        Shape::Cone(Cone {
            half_height,
            radius,
        })
    }

    /// A triangle mesh.
    pub fn trimesh(vertices: Vec<Point<Real>>, indices: Vec<[u32; 3]>) -> Result<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(PhysicsError::DegenerateInput("empty triangle mesh".into()));
        }
        if vertices.iter().any(|p| !p.coords.iter().all(|x| x.is_finite())) {
            return Err(PhysicsError::DegenerateInput(
                "triangle mesh has non-finite vertices".into(),
            ));
        }
        if let Some(tri) = indices
            .iter()
            .find(|tri| tri.iter().any(|&i| i as usize >= vertices.len()))
        {
            return Err(PhysicsError::DegenerateInput(format!(
                "triangle {tri:?} indexes past {} vertices",
                vertices.len()
            )));
        }

        TriMesh::new(vertices, indices)
            .map(Shape::TriMesh)
            .map_err(|e| PhysicsError::DegenerateInput(format!("failed to create trimesh: {e:?}")))
    }

    /// A height field; `heights` is sampled on a regular grid scaled by `scale`.
    pub fn heightfield(heights: DMatrix<Real>, scale: Vector<Real>) -> Result<Self> {
        if heights.nrows() < 2 || heights.ncols() < 2 {
            return Err(PhysicsError::DegenerateInput(format!(
                "heightfield needs at least 2x2 samples, got {}x{}",
                heights.nrows(),
                heights.ncols()
            )));
        }
        if !heights.iter().all(|h| h.is_finite()) {
            return Err(PhysicsError::DegenerateInput(
                "heightfield has non-finite samples".into(),
            ));
        }
        if !scale.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(PhysicsError::DegenerateInput(format!(
                "heightfield scale must be positive, got {scale:?}"
            )));
        }

        Ok(Shape::HeightField(HeightField::new(heights, scale)))
    }

    /// Which variant this is.
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Ball(_) => ShapeType::Ball,
            Shape::Cuboid(_) => ShapeType::Cuboid,
            Shape::Capsule(_) => ShapeType::Capsule,
            Shape::TriMesh(_) => ShapeType::TriMesh,
            Shape::HeightField(_) => ShapeType::HeightField,
            Shape::Cylinder(_) => ShapeType::Cylinder,
            Shape::Cone(_) => ShapeType::Cone,
        }
    }

    /// The geometry as seen by the query dispatcher.
    pub fn as_parry(&self) -> &dyn parry3d::shape::Shape {
        match self {
            Shape::Ball(s) => s,
            Shape::Cuboid(s) => s,
            Shape::Capsule(s) => s,
            Shape::TriMesh(s) => s,
            Shape::HeightField(s) => s,
            Shape::Cylinder(s) => s,
            Shape::Cone(s) => s,
        }
    }

    /// Rejects non-positive or non-finite dimensions.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: Real| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(PhysicsError::DegenerateInput(format!(
                    "{name} must be positive and finite, got {value}"
                )))
            }
        };

        match self {
            Shape::Ball(s) => positive("ball radius", s.radius),
            Shape::Cuboid(s) => {
                positive("cuboid half extent x", s.half_extents.x)?;
                positive("cuboid half extent y", s.half_extents.y)?;
                positive("cuboid half extent z", s.half_extents.z)
            }
            Shape::Capsule(s) => {
                positive("capsule radius", s.radius)?;
                let half_height = s.half_height();
                if half_height.is_finite() && half_height >= 0.0 {
                    Ok(())
                } else {
                    Err(PhysicsError::DegenerateInput(format!(
                        "capsule half height must be non-negative, got {half_height}"
                    )))
                }
            }
            Shape::Cylinder(s) => {
                positive("cylinder half height", s.half_height)?;
                positive("cylinder radius", s.radius)
            }
            Shape::Cone(s) => {
                positive("cone half height", s.half_height)?;
                positive("cone radius", s.radius)
            }
            // Checked by their fallible constructors.
            Shape::TriMesh(_) | Shape::HeightField(_) => Ok(()),
        }
    }

    /// World-space bounding box at `position`.
    pub fn compute_aabb(&self, position: &Isometry<Real>) -> Aabb {
        self.as_parry().compute_aabb(position)
    }

    /// Mass properties in the shape's local frame.
    pub fn mass_properties(&self, density: Real) -> MassProperties {
        self.as_parry().mass_properties(density)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ball_mass() {
        let shape = Shape::ball(0.5);
        let mprops = shape.mass_properties(2.0);
        let expected = 2.0 * 4.0 / 3.0 * std::f32::consts::PI * 0.125;
        assert_relative_eq!(mprops.mass(), expected, epsilon = 1.0e-4);
    }

    #[test]
    fn test_cuboid_aabb() {
        let shape = Shape::cuboid(1.0, 2.0, 3.0);
        let aabb = shape.compute_aabb(&Isometry::translation(10.0, 0.0, 0.0));
        assert_relative_eq!(aabb.mins, Point::new(9.0, -2.0, -3.0), epsilon = 1.0e-5);
        assert_relative_eq!(aabb.maxs, Point::new(11.0, 2.0, 3.0), epsilon = 1.0e-5);
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(Shape::ball(-1.0).validate().is_err());
        assert!(Shape::ball(Real::NAN).validate().is_err());
        assert!(Shape::cuboid(1.0, 0.0, 1.0).validate().is_err());
        assert!(Shape::cylinder(1.0, -0.5).validate().is_err());
        assert!(Shape::capsule(0.0, 0.5).validate().is_ok());
        assert!(Shape::cone(1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_negative_cylinder_and_cone_are_rejected_not_panicking() {
        for shape in [
            Shape::cylinder(-1.0, 0.5),
            Shape::cylinder(1.0, -0.5),
            Shape::cone(-1.0, 0.5),
            Shape::cone(1.0, Real::NAN),
        ] {
            assert!(matches!(
                shape.validate(),
                Err(PhysicsError::DegenerateInput(_))
            ));
        }
    }

    #[test]
    fn test_trimesh_rejects_empty_and_out_of_range() {
        assert!(Shape::trimesh(vec![], vec![]).is_err());

        let vertices = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(1.0, 0.0, 0.0),
            Point::new(0.0, 0.0, 1.0),
        ];
        assert!(Shape::trimesh(vertices.clone(), vec![[0, 1, 3]]).is_err());

        let mesh = Shape::trimesh(vertices, vec![[0, 1, 2]]).unwrap();
        assert_eq!(mesh.shape_type(), ShapeType::TriMesh);
    }

    #[test]
    fn test_heightfield_needs_grid() {
        let flat = DMatrix::zeros(1, 4);
        assert!(Shape::heightfield(flat, Vector::new(1.0, 1.0, 1.0)).is_err());

        let grid = DMatrix::zeros(3, 3);
        assert!(Shape::heightfield(grid.clone(), Vector::new(1.0, 0.0, 1.0)).is_err());
        let field = Shape::heightfield(grid, Vector::new(10.0, 1.0, 10.0)).unwrap();
        assert_eq!(field.shape_type(), ShapeType::HeightField);
    }
}
