//! Stepping, querying and event reporting.

mod event_queue;
mod physics_pipeline;
mod query_pipeline;
mod world;

pub use event_queue::{ContactEvent, EventQueue, ProximityEvent};
pub use physics_pipeline::PhysicsPipeline;
pub use query_pipeline::{QueryPipeline, RayColliderHit};
pub use world::PhysicsWorld;
