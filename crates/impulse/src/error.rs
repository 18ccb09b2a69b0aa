//! Error types for the simulation core.

use std::fmt;

use thiserror::Error;

/// Kind of entity a handle refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A rigid body.
    RigidBody,
    /// A collider.
    Collider,
    /// A joint.
    Joint,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::RigidBody => f.write_str("rigid body"),
            EntityKind::Collider => f.write_str("collider"),
            EntityKind::Joint => f.write_str("joint"),
        }
    }
}

/// Errors that can occur while building or stepping a simulation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Handle generation no longer matches its slot.
    #[error("Stale {kind} handle: {handle}")]
    StaleHandle {
        /// What the handle refers to.
        kind: EntityKind,
        /// Debug rendering of the handle.
        handle: String,
    },

    /// An internal buffer ran out of room.
    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// Cross-references between sets are inconsistent.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A descriptor or parameter block was rejected.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// Invalid joint configuration.
    #[error("Invalid joint configuration: {0}")]
    InvalidJoint(String),
}

impl PhysicsError {
    pub(crate) fn stale(kind: EntityKind, handle: impl fmt::Debug) -> Self {
        PhysicsError::StaleHandle {
            kind,
            handle: format!("{handle:?}"),
        }
    }

    /// Returns true for conditions the world cannot safely continue past.
    ///
    /// Stale handles and rejected input leave every set untouched and are
    /// safe to report and ignore.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PhysicsError::CapacityExhausted(_) | PhysicsError::InvariantViolation(_)
        )
    }
}

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(PhysicsError::InvariantViolation("x".into()).is_fatal());
        assert!(PhysicsError::CapacityExhausted("x".into()).is_fatal());
        assert!(!PhysicsError::DegenerateInput("x".into()).is_fatal());
        assert!(!PhysicsError::InvalidJoint("x".into()).is_fatal());
        assert!(!PhysicsError::stale(EntityKind::Collider, 3).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = PhysicsError::stale(EntityKind::RigidBody, "h");
        assert_eq!(err.to_string(), "Stale rigid body handle: \"h\"");
    }
}
