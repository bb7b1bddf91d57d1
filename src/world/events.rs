//! Contact begin/end events derived from manifold occupancy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::utils::allocator::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactEvent {
    /// The pair's manifold went from empty to non-empty, or a trigger pair
    /// started overlapping.
    Began { body_a: EntityId, body_b: EntityId },
    /// The pair stopped touching or one of its bodies was removed.
    Ended { body_a: EntityId, body_b: EntityId },
}

impl ContactEvent {
    pub fn bodies(&self) -> (EntityId, EntityId) {
        match *self {
            ContactEvent::Began { body_a, body_b } | ContactEvent::Ended { body_a, body_b } => (body_a, body_b),
        }
    }
}

/// Snapshot of one persistent contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactState {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub point_count: usize,
    pub normal_impulse: f32,
    pub inactive_time: f32,
}

/// Tracks which pairs touched last step and queues transitions.
#[derive(Debug, Default, Clone)]
pub(crate) struct EventTracker {
    touching: BTreeSet<(EntityId, EntityId)>,
    queue: Vec<ContactEvent>,
}

impl EventTracker {
    /// Replaces the touching set, queueing `Ended` before `Began` events,
    /// each group in pair order.
    pub fn update(&mut self, touching: BTreeSet<(EntityId, EntityId)>) {
        for &(body_a, body_b) in self.touching.difference(&touching) {
            self.queue.push(ContactEvent::Ended { body_a, body_b });
        }
        for &(body_a, body_b) in touching.difference(&self.touching) {
            self.queue.push(ContactEvent::Began { body_a, body_b });
        }
        self.touching = touching;
    }

    pub fn retire_body(&mut self, body: EntityId) {
        let gone: Vec<_> = self
            .touching
            .iter()
            .filter(|(a, b)| *a == body || *b == body)
            .copied()
            .collect();
        for pair in gone {
            self.touching.remove(&pair);
            self.queue.push(ContactEvent::Ended {
                body_a: pair.0,
                body_b: pair.1,
            });
        }
    }

    #[cfg(test)]
    pub fn is_touching(&self, body_a: EntityId, body_b: EntityId) -> bool {
        self.touching
            .contains(&EntityId::ordered_pair(body_a, body_b))
    }

    pub fn drain(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.queue)
    }

    pub fn clear(&mut self) {
        self.touching.clear();
        self.queue.clear();
    }
}
