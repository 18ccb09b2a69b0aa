//! Buffered contact and proximity events.

use serde::{Deserialize, Serialize};

use crate::geometry::{ColliderHandle, Proximity};

/// Two solid colliders started or stopped touching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactEvent {
    /// The colliders' contact manifold became non-empty.
    Started(ColliderHandle, ColliderHandle),
    /// The manifold became empty, or one collider was removed.
    Stopped(ColliderHandle, ColliderHandle),
}

impl ContactEvent {
    /// The two colliders involved.
    pub fn colliders(&self) -> (ColliderHandle, ColliderHandle) {
        match *self {
            ContactEvent::Started(a, b) | ContactEvent::Stopped(a, b) => (a, b),
        }
    }

    /// Returns true for [`ContactEvent::Started`].
    pub fn is_started(&self) -> bool {
        matches!(self, ContactEvent::Started(..))
    }
}

/// A sensor pair changed proximity classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProximityEvent {
    /// First collider.
    pub collider1: ColliderHandle,
    /// Second collider.
    pub collider2: ColliderHandle,
    /// Classification before the change.
    pub prev_status: Proximity,
    /// Classification after the change.
    pub new_status: Proximity,
}

/// Append-only buffers of events produced by the physics pipeline.
///
/// With `auto_drain` the pipeline clears both buffers at the start of every
/// step, so events must be read between steps. Without it, events pile up
/// until drained; [`EventQueue::with_capacity_limit`] bounds that growth by
/// dropping (and counting) events past the limit.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    auto_drain: bool,
    capacity_limit: Option<usize>,
    contact_events: Vec<ContactEvent>,
    proximity_events: Vec<ProximityEvent>,
    dropped_events: usize,
}

impl EventQueue {
    /// Creates an unbounded queue.
    pub fn new(auto_drain: bool) -> Self {
        Self {
            auto_drain,
            ..Default::default()
        }
    }

    /// Creates a queue holding at most `limit` events of each kind.
    pub fn with_capacity_limit(auto_drain: bool, limit: usize) -> Self {
        Self {
            auto_drain,
            capacity_limit: Some(limit),
            ..Default::default()
        }
    }

    /// Whether the pipeline clears this queue at the start of each step.
    pub fn auto_drain(&self) -> bool {
        self.auto_drain
    }

    /// Buffered contact events, oldest first.
    pub fn contact_events(&self) -> &[ContactEvent] {
        &self.contact_events
    }

    /// Buffered proximity events, oldest first.
    pub fn proximity_events(&self) -> &[ProximityEvent] {
        &self.proximity_events
    }

    /// Number of events discarded because a buffer was full.
    pub fn dropped_events(&self) -> usize {
        self.dropped_events
    }

    /// Visits every contact event as `(collider1, collider2, started)` in
    /// emission order, then clears the contact buffer.
    pub fn drain_contact_events(&mut self, mut visit: impl FnMut(ColliderHandle, ColliderHandle, bool)) {
        for event in self.contact_events.drain(..) {
            let (a, b) = event.colliders();
            visit(a, b, event.is_started());
        }
    }

    /// Visits every proximity event in emission order, then clears the
    /// proximity buffer.
    pub fn drain_proximity_events(
        &mut self,
        mut visit: impl FnMut(ColliderHandle, ColliderHandle, Proximity, Proximity),
    ) {
        for event in self.proximity_events.drain(..) {
            visit(
                event.collider1,
                event.collider2,
                event.prev_status,
                event.new_status,
            );
        }
    }

    /// Discards every buffered event.
    pub fn clear(&mut self) {
        self.contact_events.clear();
        self.proximity_events.clear();
    }

    pub(crate) fn push_contact(&mut self, event: ContactEvent) {
        if self.is_full(self.contact_events.len()) {
            self.record_drop("contact");
            return;
        }
        self.contact_events.push(event);
    }

    pub(crate) fn push_proximity(&mut self, event: ProximityEvent) {
        if self.is_full(self.proximity_events.len()) {
            self.record_drop("proximity");
            return;
        }
        self.proximity_events.push(event);
    }

    fn is_full(&self, len: usize) -> bool {
        self.capacity_limit.is_some_and(|limit| len >= limit)
    }

    fn record_drop(&mut self, kind: &str) {
        if self.dropped_events == 0 {
            log::warn!("{kind} event buffer full; dropping events until drained");
        }
        self.dropped_events += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use impulse_arena::Index;

    fn handle(i: u32) -> ColliderHandle {
        ColliderHandle(Index::from_raw_parts(i, 0))
    }

    #[test]
    fn test_drain_in_emission_order_then_empty() {
        let mut queue = EventQueue::new(false);
        queue.push_contact(ContactEvent::Started(handle(0), handle(1)));
        queue.push_contact(ContactEvent::Stopped(handle(2), handle(3)));

        let mut seen = Vec::new();
        queue.drain_contact_events(|a, b, started| seen.push((a, b, started)));
        assert_eq!(
            seen,
            vec![(handle(0), handle(1), true), (handle(2), handle(3), false)]
        );

        let mut count = 0;
        queue.drain_contact_events(|_, _, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_buffers_are_independent() {
        let mut queue = EventQueue::new(true);
        queue.push_contact(ContactEvent::Started(handle(0), handle(1)));
        queue.push_proximity(ProximityEvent {
            collider1: handle(0),
            collider2: handle(2),
            prev_status: Proximity::Disjoint,
            new_status: Proximity::Intersecting,
        });

        queue.drain_proximity_events(|a, b, prev, new| {
            assert_eq!((a, b), (handle(0), handle(2)));
            assert_eq!(prev, Proximity::Disjoint);
            assert_eq!(new, Proximity::Intersecting);
        });
        assert!(queue.proximity_events().is_empty());
        assert_eq!(queue.contact_events().len(), 1);

        queue.clear();
        assert!(queue.contact_events().is_empty());
    }

    #[test]
    fn test_capacity_limit_drops_and_counts() {
        let mut queue = EventQueue::with_capacity_limit(false, 2);
        for i in 0..5 {
            queue.push_contact(ContactEvent::Started(handle(i), handle(i + 1)));
        }
        assert_eq!(queue.contact_events().len(), 2);
        assert_eq!(queue.dropped_events(), 3);

        // Oldest events are kept.
        assert_eq!(queue.contact_events()[0].colliders(), (handle(0), handle(1)));

        queue.drain_contact_events(|_, _, _| {});
        queue.push_contact(ContactEvent::Stopped(handle(0), handle(1)));
        assert_eq!(queue.contact_events().len(), 1);
    }
}
