//! Sleep and wake-up of rigid bodies.
//!
//! A dynamic body counts the consecutive steps it spent below both velocity
//! thresholds. Bodies linked by a touching contact or a joint form an island;
//! an island falls asleep only once every member has been resting long
//! enough, and any member that is not resting keeps the whole island awake.

use std::collections::HashMap;

use crate::dynamics::{IntegrationParameters, RigidBodyHandle, RigidBodySet};

/// Per-body sleep bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivationStatus {
    pub(crate) sleeping: bool,
    pub(crate) can_sleep: bool,
    pub(crate) resting_steps: u32,
}

impl ActivationStatus {
    pub(crate) fn awake(can_sleep: bool) -> Self {
        Self {
            sleeping: false,
            can_sleep,
            resting_steps: 0,
        }
    }

    pub(crate) fn asleep(can_sleep: bool) -> Self {
        Self {
            sleeping: true,
            can_sleep,
            resting_steps: 0,
        }
    }

    /// Returns true if the body is asleep.
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Returns true if the body may fall asleep.
    pub fn can_sleep(&self) -> bool {
        self.can_sleep
    }

    /// Consecutive steps spent below the sleep velocity thresholds.
    pub fn resting_steps(&self) -> u32 {
        self.resting_steps
    }

    pub(crate) fn sleep(&mut self) {
        self.sleeping = true;
    }

    /// A strong wake-up restarts the rest counter; a weak one lets a body
    /// that is still at rest fall back asleep at the end of the step.
    pub(crate) fn wake_up(&mut self, strong: bool) {
        self.sleeping = false;
        if strong {
            self.resting_steps = 0;
        }
    }
}

/// Wakes sleeping dynamic bodies linked to an awake dynamic body or to a
/// moving kinematic body. Returns the bodies woken.
pub(crate) fn wake_linked_bodies(
    bodies: &mut RigidBodySet,
    links: &[(RigidBodyHandle, RigidBodyHandle)],
) -> Vec<RigidBodyHandle> {
    let mut to_wake = Vec::new();
    for &(h1, h2) in links {
        let (Some(b1), Some(b2)) = (bodies.lookup(h1), bodies.lookup(h2)) else {
            continue;
        };
        let stirs = |b: &crate::dynamics::RigidBody| {
            (b.is_dynamic() && !b.is_sleeping()) || (b.is_kinematic() && b.is_moving())
        };
        if b1.is_dynamic() && b1.is_sleeping() && stirs(b2) {
            to_wake.push(h1);
        }
        if b2.is_dynamic() && b2.is_sleeping() && stirs(b1) {
            to_wake.push(h2);
        }
    }

    let mut woken = Vec::new();
    for handle in to_wake {
        if let Some(body) = bodies.lookup_mut(handle) {
            if body.is_sleeping() {
                log::debug!("waking {handle:?} through contact or joint");
                body.wake_up(true);
                woken.push(handle);
            }
        }
    }
    woken
}

/// Updates rest counters, then puts resting islands to sleep and wakes the
/// sleeping members of islands that are not at rest.
pub(crate) fn update_sleep_states(
    params: &IntegrationParameters,
    bodies: &mut RigidBodySet,
    links: &[(RigidBodyHandle, RigidBodyHandle)],
) {
    let threshold = params.sleep_step_threshold.max(1);

    let mut index = HashMap::new();
    let mut members = Vec::new();
    for (handle, body) in bodies.iter_mut() {
        if !body.is_dynamic() {
            continue;
        }
        if !body.is_sleeping() {
            let resting = body.linvel.norm() < params.sleep_linear_threshold
                && body.angvel.norm() < params.sleep_angular_threshold;
            body.activation.resting_steps = if resting {
                body.activation.resting_steps.saturating_add(1)
            } else {
                0
            };
        }
        index.insert(handle, members.len());
        members.push(handle);
    }

    let mut islands = UnionFind::new(members.len());
    for (h1, h2) in links {
        if let (Some(&i1), Some(&i2)) = (index.get(h1), index.get(h2)) {
            islands.union(i1, i2);
        }
    }

    // An island is ready when every member is asleep or has rested long enough.
    let mut ready = vec![true; members.len()];
    for (i, handle) in members.iter().enumerate() {
        let root = islands.find(i);
        if let Some(body) = bodies.lookup(*handle) {
            let act = &body.activation;
            if !(act.sleeping || (act.can_sleep && act.resting_steps >= threshold)) {
                ready[root] = false;
            }
        }
    }

    for (i, handle) in members.iter().enumerate() {
        let root = islands.find(i);
        let Some(body) = bodies.lookup_mut(*handle) else {
            continue;
        };
        match (ready[root], body.is_sleeping()) {
            (true, false) => {
                log::debug!("{handle:?} falls asleep");
                body.sleep();
            }
            (false, true) => {
                log::debug!("waking {handle:?} with its island");
                body.wake_up(true);
            }
            _ => {}
        }
    }
}

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::RigidBodyDesc;
    use crate::math::Vector;

    fn params(threshold: u32) -> IntegrationParameters {
        IntegrationParameters {
            sleep_step_threshold: threshold,
            ..Default::default()
        }
    }

    #[test]
    fn test_resting_body_sleeps_after_threshold() {
        let mut bodies = RigidBodySet::new();
        let h = bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let params = params(3);

        for _ in 0..2 {
            update_sleep_states(&params, &mut bodies, &[]);
            assert!(!bodies.get(h).unwrap().is_sleeping());
        }
        update_sleep_states(&params, &mut bodies, &[]);
        assert!(bodies.get(h).unwrap().is_sleeping());
    }

    #[test]
    fn test_motion_resets_counter() {
        let mut bodies = RigidBodySet::new();
        let h = bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let params = params(2);

        update_sleep_states(&params, &mut bodies, &[]);
        assert_eq!(bodies.get(h).unwrap().activation().resting_steps(), 1);

        bodies
            .get_mut(h)
            .unwrap()
            .set_linvel(Vector::new(1.0, 0.0, 0.0), false);
        update_sleep_states(&params, &mut bodies, &[]);
        assert_eq!(bodies.get(h).unwrap().activation().resting_steps(), 0);
        assert!(!bodies.get(h).unwrap().is_sleeping());
    }

    #[test]
    fn test_island_waits_for_every_member() {
        let mut bodies = RigidBodySet::new();
        let still = bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let moving = bodies
            .insert(RigidBodyDesc::dynamic().linvel(Vector::new(0.0, 2.0, 0.0)))
            .unwrap();
        let alone = bodies.insert(RigidBodyDesc::dynamic()).unwrap();
        let links = [(still, moving)];

        update_sleep_states(&params(1), &mut bodies, &links);
        assert!(!bodies.get(still).unwrap().is_sleeping());
        assert!(!bodies.get(moving).unwrap().is_sleeping());
        assert!(bodies.get(alone).unwrap().is_sleeping());
    }

    #[test]
    fn test_awake_island_member_wakes_sleeper() {
        let mut bodies = RigidBodySet::new();
        let sleeper = bodies.insert(RigidBodyDesc::dynamic().sleeping(true)).unwrap();
        let moving = bodies
            .insert(RigidBodyDesc::dynamic().linvel(Vector::new(0.0, 2.0, 0.0)))
            .unwrap();

        update_sleep_states(&params(1), &mut bodies, &[(sleeper, moving)]);
        assert!(!bodies.get(sleeper).unwrap().is_sleeping());
    }

    #[test]
    fn test_can_sleep_false_keeps_island_awake() {
        let mut bodies = RigidBodySet::new();
        let h = bodies
            .insert(RigidBodyDesc::dynamic().can_sleep(false))
            .unwrap();
        for _ in 0..5 {
            update_sleep_states(&params(1), &mut bodies, &[]);
        }
        assert!(!bodies.get(h).unwrap().is_sleeping());
    }

    #[test]
    fn test_static_turned_dynamic_falls_asleep() {
        let mut bodies = RigidBodySet::new();
        let h = bodies
            .insert(RigidBodyDesc::new_static().can_sleep(true))
            .unwrap();
        bodies
            .get_mut(h)
            .unwrap()
            .set_body_status(crate::dynamics::BodyStatus::Dynamic);

        for _ in 0..3 {
            update_sleep_states(&params(3), &mut bodies, &[]);
        }
        assert!(bodies.get(h).unwrap().is_sleeping());
    }

    #[test]
    fn test_moving_kinematic_wakes_linked_sleeper() {
        let mut bodies = RigidBodySet::new();
        let sleeper = bodies.insert(RigidBodyDesc::dynamic().sleeping(true)).unwrap();
        let platform = bodies
            .insert(RigidBodyDesc::kinematic().linvel(Vector::new(1.0, 0.0, 0.0)))
            .unwrap();
        let idle = bodies.insert(RigidBodyDesc::kinematic()).unwrap();
        let other = bodies.insert(RigidBodyDesc::dynamic().sleeping(true)).unwrap();

        let woken = wake_linked_bodies(&mut bodies, &[(idle, other), (sleeper, platform)]);
        assert_eq!(woken, vec![sleeper]);
        assert!(!bodies.get(sleeper).unwrap().is_sleeping());
        assert!(bodies.get(other).unwrap().is_sleeping());
    }

    #[test]
    fn test_weak_wake_keeps_counter() {
        let mut status = ActivationStatus::awake(true);
        status.resting_steps = 7;
        status.sleep();
        status.wake_up(false);
        assert!(!status.is_sleeping());
        assert_eq!(status.resting_steps(), 7);
        status.wake_up(true);
        assert_eq!(status.resting_steps(), 0);
    }
}
