//! Math aliases shared by every module.

pub use parry3d::math::{AngVector, Isometry, Point, Real, Rotation, Translation, Vector};

/// Angular inertia tensor expressed in world space.
pub type AngularInertia = nalgebra::Matrix3<Real>;

/// Below this norm a vector or quaternion is treated as zero.
pub const DEFAULT_EPSILON: Real = 1.0e-6;

/// Orthonormal pair spanning the plane orthogonal to the unit vector `n`.
pub fn tangent_basis(n: &Vector<Real>) -> (Vector<Real>, Vector<Real>) {
    let t1 = if n.x.abs() >= 0.57735 {
        Vector::new(n.y, -n.x, 0.0).normalize()
    } else {
        Vector::new(0.0, n.z, -n.y).normalize()
    };
    (t1, n.cross(&t1))
}

/// Returns true if every component is finite.
pub(crate) fn is_finite_vector(v: &Vector<Real>) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tangent_basis_is_orthonormal() {
        for n in [Vector::x(), Vector::y(), Vector::new(1.0, 2.0, -3.0).normalize()] {
            let (t1, t2) = tangent_basis(&n);
            assert_relative_eq!(t1.norm(), 1.0, epsilon = 1.0e-5);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = 1.0e-5);
            assert_relative_eq!(t1.dot(&n), 0.0, epsilon = 1.0e-5);
            assert_relative_eq!(t2.dot(&n), 0.0, epsilon = 1.0e-5);
            assert_relative_eq!(t1.dot(&t2), 0.0, epsilon = 1.0e-5);
        }
    }
}
