#![warn(missing_docs)]

//! Rigid-body simulation core.
//!
//! This crate holds the state of a 3D rigid-body simulation and the
//! pipelines that advance and query it:
//!
//! - Rigid bodies, colliders and joints in generation-tagged sets, with
//!   cascading removal that never leaves a dangling cross-reference
//! - Broad and narrow phase collision detection with contact and sensor
//!   events
//! - A fixed-order step pipeline with sleeping islands and kinematic bodies
//! - Ray and box queries over a caller-refreshed bounding volume hierarchy
//!
//! Geometric queries are delegated to `parry3d`.
//!
//! # Example
//!
//! ```
//! use impulse::dynamics::RigidBodyDesc;
//! use impulse::geometry::{ColliderDesc, Ray};
//! use impulse::math::{Point, Vector};
//! use impulse::pipeline::PhysicsWorld;
//!
//! let mut world = PhysicsWorld::new();
//! world
//!     .insert_collider(ColliderDesc::cuboid(10.0, 0.5, 10.0), None)
//!     .unwrap();
//! let body = world
//!     .insert_body(RigidBodyDesc::dynamic().translation(Vector::new(0.0, 3.0, 0.0)))
//!     .unwrap();
//! world
//!     .insert_collider(ColliderDesc::ball(0.5).density(1.0), Some(body))
//!     .unwrap();
//!
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0).unwrap();
//! }
//!
//! let ray = Ray::new(Point::new(0.0, 10.0, 0.0), -Vector::y());
//! assert!(world.cast_ray(&ray, 100.0).is_some());
//! ```

mod cascade;
mod error;
mod handle;

pub mod dynamics;
pub mod geometry;
pub mod math;
pub mod pipeline;

pub use error::{EntityKind, PhysicsError, Result};
