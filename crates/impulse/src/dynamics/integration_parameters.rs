//! Per-step simulation parameters.

use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::math::Real;

/// Parameters driving one call to `PhysicsPipeline::step`.
///
/// Deserializes with every missing field taken from [`Default`], so a
/// config file only needs to name what it overrides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationParameters {
    /// Time step length (seconds).
    pub dt: Real,
    /// Fraction of contact penetration corrected per step (0..=1).
    pub erp: Real,
    /// Fraction of joint drift corrected per step (0..=1).
    pub joint_erp: Real,
    /// Scale applied to last step's impulses before solving (0..=1).
    pub warmstart_coeff: Real,
    /// Approach speed below which contacts do not bounce (m/s).
    pub restitution_velocity_threshold: Real,
    /// Penetration left uncorrected to avoid jitter (m).
    pub allowed_linear_error: Real,
    /// Distance at which contacts are generated before touching (m).
    pub prediction_distance: Real,
    /// Joint angular drift left uncorrected (rad).
    pub allowed_angular_error: Real,
    /// Largest positional correction applied in one step (m).
    pub max_linear_correction: Real,
    /// Largest angular correction applied in one step (rad).
    pub max_angular_correction: Real,
    /// Velocity solver iterations.
    pub max_velocity_iterations: usize,
    /// Position correction iterations.
    pub max_position_iterations: usize,
    /// Linear speed below which a body counts as at rest (m/s).
    pub sleep_linear_threshold: Real,
    /// Angular speed below which a body counts as at rest (rad/s).
    pub sleep_angular_threshold: Real,
    /// Consecutive at-rest steps before a body may fall asleep.
    pub sleep_step_threshold: u32,
    /// Enlargement of broad-phase bounding boxes (m).
    pub broad_phase_margin: Real,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            erp: 0.2,
            joint_erp: 0.2,
            warmstart_coeff: 1.0,
            restitution_velocity_threshold: 1.0,
            allowed_linear_error: 0.005,
            prediction_distance: 0.002,
            allowed_angular_error: 0.001,
            max_linear_correction: 0.2,
            max_angular_correction: 0.2,
            max_velocity_iterations: 4,
            max_position_iterations: 1,
            sleep_linear_threshold: 0.15,
            sleep_angular_threshold: 0.15,
            sleep_step_threshold: 30,
            broad_phase_margin: 0.1,
        }
    }
}

impl IntegrationParameters {
    /// Inverse of the time step, or zero for a zero step.
    pub fn inv_dt(&self) -> Real {
        if self.dt == 0.0 {
            0.0
        } else {
            1.0 / self.dt
        }
    }

    /// Validate parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(PhysicsError::DegenerateInput(format!(
                "time step must be positive and finite, got {}",
                self.dt
            )));
        }

        let unit_fractions = [
            ("erp", self.erp),
            ("joint_erp", self.joint_erp),
            ("warmstart_coeff", self.warmstart_coeff),
        ];
        for (name, value) in unit_fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(PhysicsError::DegenerateInput(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let non_negative = [
            ("restitution_velocity_threshold", self.restitution_velocity_threshold),
            ("allowed_linear_error", self.allowed_linear_error),
            ("prediction_distance", self.prediction_distance),
            ("allowed_angular_error", self.allowed_angular_error),
            ("max_linear_correction", self.max_linear_correction),
            ("max_angular_correction", self.max_angular_correction),
            ("sleep_linear_threshold", self.sleep_linear_threshold),
            ("sleep_angular_threshold", self.sleep_angular_threshold),
            ("broad_phase_margin", self.broad_phase_margin),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PhysicsError::DegenerateInput(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }

        if self.max_velocity_iterations == 0 {
            return Err(PhysicsError::DegenerateInput(
                "at least one velocity iteration is required".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(IntegrationParameters::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_time_step() {
        for dt in [0.0, -1.0, Real::NAN, Real::INFINITY] {
            let params = IntegrationParameters {
                dt,
                ..Default::default()
            };
            assert!(matches!(
                params.validate(),
                Err(PhysicsError::DegenerateInput(_))
            ));
        }
    }

    #[test]
    fn test_rejects_out_of_range_erp() {
        let params = IntegrationParameters {
            erp: 1.5,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_json_config() {
        let json = r#"{ "dt": 0.01, "max_velocity_iterations": 8 }"#;
        let params: IntegrationParameters = serde_json::from_str(json).unwrap();

        assert_eq!(params.dt, 0.01);
        assert_eq!(params.max_velocity_iterations, 8);
        assert_eq!(
            params.sleep_step_threshold,
            IntegrationParameters::default().sleep_step_threshold
        );
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_inv_dt() {
        let params = IntegrationParameters {
            dt: 0.5,
            ..Default::default()
        };
        assert_eq!(params.inv_dt(), 2.0);
    }
}
