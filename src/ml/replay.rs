use rand::Rng;
use rand::seq::index;

use crate::error::{AgentError, ConfigError};

pub const DEFAULT_CAPACITY: usize = 10_000;

/// One environment transition, immutable once stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub done: bool,
}

impl Transition {
    pub fn new(
        state: Vec<f32>,
        action: usize,
        reward: f32,
        next_state: Vec<f32>,
        done: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }
}

/// Fixed-capacity ring of transitions. Once full, each push overwrites the
/// slot at `head`, which always holds the oldest entry.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    slots: Vec<Transition>,
    capacity: usize,
    head: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Positive("replay capacity"));
        }
        Ok(Self {
            slots: Vec::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            head: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, transition: Transition) {
        if self.slots.len() < self.capacity {
            self.slots.push(transition);
        } else {
            self.slots[self.head] = transition;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Draws `count` distinct transitions uniformly at random.
    pub fn sample<R: Rng>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<&Transition>, AgentError> {
        if self.slots.len() < count {
            return Err(AgentError::InsufficientData {
                required: count,
                available: self.slots.len(),
            });
        }
        Ok(index::sample(rng, self.slots.len(), count)
            .into_iter()
            .map(|slot| &self.slots[slot])
            .collect())
    }

    /// Stored transitions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn transition(tag: usize) -> Transition {
        Transition::new(vec![tag as f32], 0, tag as f32, vec![0.0], false)
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            ReplayBuffer::new(0).unwrap_err(),
            ConfigError::Positive("replay capacity")
        );
    }

    #[test]
    fn push_evicts_oldest_once_full() {
        let mut buffer = ReplayBuffer::new(4).expect("capacity");
        for tag in 0..7 {
            buffer.push(transition(tag));
        }
        assert_eq!(buffer.len(), 4);
        let rewards: Vec<f32> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn sample_is_without_replacement() {
        let mut buffer = ReplayBuffer::new(16).expect("capacity");
        for tag in 0..16 {
            buffer.push(transition(tag));
        }
        let mut rng = StdRng::seed_from_u64(3);
        let batch = buffer.sample(16, &mut rng).expect("full sample");
        let distinct: HashSet<u32> = batch.iter().map(|t| t.reward as u32).collect();
        assert_eq!(distinct.len(), 16);
    }

    #[test]
    fn sample_rejects_oversized_request() {
        let mut buffer = ReplayBuffer::new(8).expect("capacity");
        buffer.push(transition(0));
        let mut rng = StdRng::seed_from_u64(1);
        let err = buffer.sample(2, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            AgentError::InsufficientData {
                required: 2,
                available: 1
            }
        ));
    }

    #[test]
    fn clear_resets_ring_position() {
        let mut buffer = ReplayBuffer::new(2).expect("capacity");
        for tag in 0..3 {
            buffer.push(transition(tag));
        }
        buffer.clear();
        buffer.push(transition(9));
        assert_eq!(buffer.iter().map(|t| t.reward).collect::<Vec<_>>(), vec![9.0]);
    }
}
