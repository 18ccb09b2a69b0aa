//! Collision shapes, colliders and the two collision detection phases.

mod broad_phase;
mod collider;
mod collider_set;
mod interaction_groups;
mod narrow_phase;
mod shape;

pub use broad_phase::{BroadPhase, BroadPhasePairEvent, ColliderPair};
pub use collider::{Collider, ColliderDesc};
pub use collider_set::{ColliderHandle, ColliderSet};
pub use interaction_groups::InteractionGroups;
pub use narrow_phase::{ContactImpulse, ContactManifoldData, ContactPair, NarrowPhase, Proximity};
pub use parry3d::bounding_volume::Aabb;
pub use parry3d::query::Ray;
pub use shape::{Shape, ShapeType};
