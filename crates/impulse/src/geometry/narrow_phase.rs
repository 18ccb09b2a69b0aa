//! Narrow phase: exact contact and proximity state for broad-phase pairs.
//!
//! Solid pairs keep their parry contact manifolds across steps so that the
//! impulses stored on each contact point can warm start the solver. Pairs
//! involving a sensor only track a [`Proximity`] classification.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use parry3d::query::{
    self, ClosestPoints, ContactManifold, ContactManifoldsWorkspace, DefaultQueryDispatcher,
    PersistentQueryDispatcher,
};
use serde::{Deserialize, Serialize};

use crate::dynamics::{IntegrationParameters, RigidBody, RigidBodyHandle, RigidBodySet};
use crate::geometry::{BroadPhasePairEvent, Collider, ColliderHandle, ColliderPair, ColliderSet};
use crate::math::Real;
use crate::pipeline::{ContactEvent, EventQueue, ProximityEvent};

/// Classification of a sensor pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Proximity {
    /// The shapes overlap.
    Intersecting,
    /// The shapes are apart but closer than the prediction distance.
    WithinMargin,
    /// The shapes are further apart than the prediction distance.
    Disjoint,
}

/// Impulses accumulated by the solver on one contact point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContactImpulse {
    /// Impulse along the contact normal.
    pub normal: Real,
    /// Friction impulses along the two tangent directions.
    pub tangent: [Real; 2],
}

/// Manifold type stored by the narrow phase.
pub type ContactManifoldData = ContactManifold<(), ContactImpulse>;

/// Contact state of two solid colliders.
pub struct ContactPair {
    /// Smaller collider handle.
    pub collider1: ColliderHandle,
    /// Larger collider handle.
    pub collider2: ColliderHandle,
    pub(crate) manifolds: Vec<ContactManifoldData>,
    pub(crate) workspace: Option<ContactManifoldsWorkspace>,
    pub(crate) touching: bool,
    pub(crate) solver_active: bool,
}

impl ContactPair {
    fn new(pair: ColliderPair) -> Self {
        Self {
            collider1: pair.collider1,
            collider2: pair.collider2,
            manifolds: Vec::new(),
            workspace: None,
            touching: false,
            solver_active: false,
        }
    }

    /// Returns true if at least one contact point lies within the
    /// prediction distance.
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    /// Returns true if the solver receives this pair's contacts.
    pub fn is_solver_active(&self) -> bool {
        self.solver_active
    }

    /// Contact manifolds, in the local frames of the two colliders.
    pub fn manifolds(&self) -> &[ContactManifoldData] {
        &self.manifolds
    }

    /// Number of contact points over every manifold.
    pub fn contact_count(&self) -> usize {
        self.manifolds.iter().map(|m| m.points.len()).sum()
    }

    /// Sum of the normal impulses applied during the last step.
    pub fn total_normal_impulse(&self) -> Real {
        self.manifolds
            .iter()
            .flat_map(|m| m.points.iter())
            .map(|p| p.data.normal)
            .sum()
    }

    fn clear(&mut self) {
        self.manifolds.clear();
        self.touching = false;
        self.solver_active = false;
    }
}

impl fmt::Debug for ContactPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContactPair")
            .field("collider1", &self.collider1)
            .field("collider2", &self.collider2)
            .field("touching", &self.touching)
            .field("solver_active", &self.solver_active)
            .field("contacts", &self.contact_count())
            .finish()
    }
}

/// Exact contact and proximity tracking for every broad-phase pair.
#[derive(Debug, Default)]
pub struct NarrowPhase {
    contact_pairs: BTreeMap<ColliderPair, ContactPair>,
    intersection_pairs: BTreeMap<ColliderPair, Proximity>,
    unsupported: HashSet<ColliderPair>,
    pending_contact_events: Vec<ContactEvent>,
    pending_proximity_events: Vec<ProximityEvent>,
}

impl NarrowPhase {
    /// Creates an empty narrow phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contact state between two colliders, in either order.
    pub fn contact_pair(&self, h1: ColliderHandle, h2: ColliderHandle) -> Option<&ContactPair> {
        self.contact_pairs.get(&ColliderPair::new(h1, h2))
    }

    /// Proximity between two colliders, at least one of them a sensor.
    pub fn intersection_pair(&self, h1: ColliderHandle, h2: ColliderHandle) -> Option<Proximity> {
        self.intersection_pairs
            .get(&ColliderPair::new(h1, h2))
            .copied()
    }

    /// Every tracked solid pair, in handle order.
    pub fn contact_pairs(&self) -> impl Iterator<Item = &ContactPair> {
        self.contact_pairs.values()
    }

    /// Every tracked sensor pair, in handle order.
    pub fn intersection_pairs(
        &self,
    ) -> impl Iterator<Item = (ColliderHandle, ColliderHandle, Proximity)> + '_ {
        self.intersection_pairs
            .iter()
            .map(|(pair, prox)| (pair.collider1, pair.collider2, *prox))
    }

    /// Forgets every pair involving `handle`.
    ///
    /// A touching pair produces a `Stopped` event and a sensor pair that was
    /// not disjoint produces a transition to `Disjoint`. These are held back
    /// until the next step flushes them. Bodies that were touching the removed
    /// collider are woken.
    pub fn remove_collider(
        &mut self,
        handle: ColliderHandle,
        colliders: &ColliderSet,
        bodies: &mut RigidBodySet,
    ) {
        let contacts: Vec<ColliderPair> = self
            .contact_pairs
            .keys()
            .filter(|pair| pair.contains(handle))
            .copied()
            .collect();
        for pair in contacts {
            let Some(contact) = self.contact_pairs.remove(&pair) else {
                continue;
            };
            if !contact.touching {
                continue;
            }
            self.pending_contact_events
                .push(ContactEvent::Stopped(pair.collider1, pair.collider2));

            let other = if pair.collider1 == handle {
                pair.collider2
            } else {
                pair.collider1
            };
            let parent = colliders.lookup(other).and_then(|c| c.parent);
            if let Some(body) = parent.and_then(|p| bodies.lookup_mut(p)) {
                body.wake_up(true);
            }
        }

        let sensors: Vec<ColliderPair> = self
            .intersection_pairs
            .keys()
            .filter(|pair| pair.contains(handle))
            .copied()
            .collect();
        for pair in sensors {
            if let Some(prev) = self.intersection_pairs.remove(&pair) {
                if prev != Proximity::Disjoint {
                    self.pending_proximity_events.push(ProximityEvent {
                        collider1: pair.collider1,
                        collider2: pair.collider2,
                        prev_status: prev,
                        new_status: Proximity::Disjoint,
                    });
                }
            }
        }

        self.unsupported.retain(|pair| !pair.contains(handle));
    }

    /// Moves events produced by removals into `events`.
    pub(crate) fn flush_pending_events(&mut self, events: &mut EventQueue) {
        for event in self.pending_contact_events.drain(..) {
            events.push_contact(event);
        }
        for event in self.pending_proximity_events.drain(..) {
            events.push_proximity(event);
        }
    }

    /// Starts or stops tracking pairs reported by the broad phase.
    pub(crate) fn register_pairs(
        &mut self,
        colliders: &ColliderSet,
        broad_phase_events: &[BroadPhasePairEvent],
        events: &mut EventQueue,
    ) {
        for event in broad_phase_events {
            match *event {
                BroadPhasePairEvent::AddPair(pair) => {
                    let (Some(co1), Some(co2)) =
                        (colliders.lookup(pair.collider1), colliders.lookup(pair.collider2))
                    else {
                        continue;
                    };
                    if co1.is_sensor || co2.is_sensor {
                        self.intersection_pairs
                            .entry(pair)
                            .or_insert(Proximity::Disjoint);
                    } else {
                        self.contact_pairs
                            .entry(pair)
                            .or_insert_with(|| ContactPair::new(pair));
                    }
                }
                BroadPhasePairEvent::DeletePair(pair) => {
                    if let Some(contact) = self.contact_pairs.remove(&pair) {
                        if contact.touching {
                            events.push_contact(ContactEvent::Stopped(
                                pair.collider1,
                                pair.collider2,
                            ));
                        }
                    }
                    if let Some(prev) = self.intersection_pairs.remove(&pair) {
                        if prev != Proximity::Disjoint {
                            events.push_proximity(ProximityEvent {
                                collider1: pair.collider1,
                                collider2: pair.collider2,
                                prev_status: prev,
                                new_status: Proximity::Disjoint,
                            });
                        }
                    }
                    self.unsupported.remove(&pair);
                }
            }
        }
    }

    /// Updates the manifolds of every solid pair and reports touching
    /// transitions, in pair order.
    pub(crate) fn compute_contacts(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        events: &mut EventQueue,
    ) {
        for (pair, contact) in self.contact_pairs.iter_mut() {
            let (Some(co1), Some(co2)) =
                (colliders.lookup(pair.collider1), colliders.lookup(pair.collider2))
            else {
                continue;
            };
            let b1 = parent_body(co1, bodies);
            let b2 = parent_body(co2, bodies);
            let was_touching = contact.touching;

            let any_dynamic = is_dynamic(b1) || is_dynamic(b2);
            if !any_dynamic {
                contact.clear();
            } else if !(is_stirring(b1) || is_stirring(b2)) {
                // Everything involved is asleep or idle; keep the last state.
                continue;
            } else if !co1.collision_groups.test(co2.collision_groups) {
                contact.clear();
            } else {
                let pos12 = co1.position.inv_mul(&co2.position);
                let result = DefaultQueryDispatcher.contact_manifolds(
                    &pos12,
                    co1.shape.as_parry(),
                    co2.shape.as_parry(),
                    params.prediction_distance,
                    &mut contact.manifolds,
                    &mut contact.workspace,
                );
                if result.is_err() {
                    if self.unsupported.insert(*pair) {
                        log::warn!(
                            "no contact generator for {:?} against {:?}; treating {:?} as separated",
                            co1.shape_type(),
                            co2.shape_type(),
                            pair
                        );
                    }
                    contact.manifolds.clear();
                }
                contact.touching = contact.manifolds.iter().any(|m| !m.points.is_empty());
                contact.solver_active =
                    contact.touching && co1.solver_groups.test(co2.solver_groups);
            }

            match (was_touching, contact.touching) {
                (false, true) => {
                    events.push_contact(ContactEvent::Started(pair.collider1, pair.collider2))
                }
                (true, false) => {
                    events.push_contact(ContactEvent::Stopped(pair.collider1, pair.collider2))
                }
                _ => {}
            }
        }
    }

    /// Reclassifies every sensor pair and reports changes, in pair order.
    pub(crate) fn compute_proximities(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        events: &mut EventQueue,
    ) {
        for (pair, proximity) in self.intersection_pairs.iter_mut() {
            let (Some(co1), Some(co2)) =
                (colliders.lookup(pair.collider1), colliders.lookup(pair.collider2))
            else {
                continue;
            };
            let b1 = parent_body(co1, bodies);
            let b2 = parent_body(co2, bodies);
            if !(is_stirring(b1) || is_stirring(b2)) {
                continue;
            }

            let new = if !co1.collision_groups.test(co2.collision_groups) {
                Proximity::Disjoint
            } else {
                match query::closest_points(
                    &co1.position,
                    co1.shape.as_parry(),
                    &co2.position,
                    co2.shape.as_parry(),
                    params.prediction_distance,
                ) {
                    Ok(ClosestPoints::Intersecting) => Proximity::Intersecting,
                    Ok(ClosestPoints::WithinMargin(..)) => Proximity::WithinMargin,
                    Ok(ClosestPoints::Disjoint) => Proximity::Disjoint,
                    Err(_) => {
                        if self.unsupported.insert(*pair) {
                            log::warn!(
                                "no proximity query for {:?} against {:?}; treating {:?} as disjoint",
                                co1.shape_type(),
                                co2.shape_type(),
                                pair
                            );
                        }
                        Proximity::Disjoint
                    }
                }
            };

            if new != *proximity {
                events.push_proximity(ProximityEvent {
                    collider1: pair.collider1,
                    collider2: pair.collider2,
                    prev_status: *proximity,
                    new_status: new,
                });
                *proximity = new;
            }
        }
    }

    /// Body pairs linked by a touching contact.
    pub(crate) fn touching_body_pairs(
        &self,
        colliders: &ColliderSet,
    ) -> Vec<(RigidBodyHandle, RigidBodyHandle)> {
        self.contact_pairs
            .iter()
            .filter(|(_, contact)| contact.touching)
            .filter_map(|(pair, _)| {
                let p1 = colliders.lookup(pair.collider1)?.parent?;
                let p2 = colliders.lookup(pair.collider2)?.parent?;
                Some((p1, p2))
            })
            .collect()
    }

    pub(crate) fn solver_pairs_mut(&mut self) -> impl Iterator<Item = &mut ContactPair> {
        self.contact_pairs
            .values_mut()
            .filter(|contact| contact.solver_active)
    }
}

fn parent_body<'a>(collider: &Collider, bodies: &'a RigidBodySet) -> Option<&'a RigidBody> {
    collider.parent.and_then(|p| bodies.lookup(p))
}

fn is_dynamic(body: Option<&RigidBody>) -> bool {
    body.is_some_and(RigidBody::is_dynamic)
}

/// Awake dynamic or moving kinematic.
fn is_stirring(body: Option<&RigidBody>) -> bool {
    body.is_some_and(|b| (b.is_dynamic() && !b.is_sleeping()) || (b.is_kinematic() && b.is_moving()))
}
