//! In-flight message schedule.
//!
//! Every effect the engine emits turns into a [`Delivery`] queued here with a
//! randomized delay; deliveries that come due in the same round are handed
//! back in shuffled order. This is where response/push interleavings come
//! from.

use lanes_core::{MutationId, PushEvent, SyncError, Ticket};

use crate::rng::DeterministicRng;

/// One completion waiting to be fed back into the engine.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Result of a mutating REST call.
    RestResult {
        mutation: MutationId,
        result: Result<Option<Ticket>, SyncError>,
    },
    /// Result of a bulk list call.
    FetchResult {
        generation: u64,
        tickets: Vec<Ticket>,
    },
    /// A frame on the push channel.
    Push(PushEvent),
    /// The push channel finished its handshake.
    PushConnected,
    /// The host's reconnect backoff timer fired.
    RetryElapsed,
}

#[derive(Debug, Clone)]
struct Entry {
    due_round: u64,
    seq: u64,
    delivery: Delivery,
}

/// Delay-ordered queue of pending deliveries.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    entries: Vec<Entry>,
    seq: u64,
}

impl DeliveryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue a delivery to come due at `due_round`.
    pub fn push(&mut self, due_round: u64, delivery: Delivery) {
        self.seq += 1;
        self.entries.push(Entry {
            due_round,
            seq: self.seq,
            delivery,
        });
    }

    /// Remove and return everything due by `round`, in shuffled order.
    pub fn take_ready(&mut self, round: u64, rng: &mut DeterministicRng) -> Vec<Delivery> {
        let mut ready: Vec<Entry> = Vec::new();
        let mut rest: Vec<Entry> = Vec::new();
        for entry in self.entries.drain(..) {
            if entry.due_round <= round {
                ready.push(entry);
            } else {
                rest.push(entry);
            }
        }
        self.entries = rest;

        // Stable base order, then a Fisher-Yates pass for the interleaving.
        ready.sort_by_key(|e| (e.due_round, e.seq));
        let mut deliveries: Vec<Delivery> = ready.into_iter().map(|e| e.delivery).collect();
        shuffle(&mut deliveries, rng);
        deliveries
    }

    /// Remove and return everything regardless of due round.
    pub fn drain_all(&mut self, rng: &mut DeterministicRng) -> Vec<Delivery> {
        self.take_ready(u64::MAX, rng)
    }
}

fn shuffle(deliveries: &mut [Delivery], rng: &mut DeterministicRng) {
    for i in (1..deliveries.len()).rev() {
        let j = rng.pick_index(i + 1);
        deliveries.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(generation: u64) -> Delivery {
        Delivery::FetchResult {
            generation,
            tickets: vec![],
        }
    }

    fn generations(deliveries: &[Delivery]) -> Vec<u64> {
        deliveries
            .iter()
            .map(|d| match d {
                Delivery::FetchResult { generation, .. } => *generation,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn only_due_entries_are_released() {
        let mut queue = DeliveryQueue::new();
        let mut rng = DeterministicRng::new(0);
        queue.push(1, marker(1));
        queue.push(3, marker(2));

        let ready = queue.take_ready(1, &mut rng);
        assert_eq!(generations(&ready), vec![1]);
        assert_eq!(queue.len(), 1);

        let rest = queue.take_ready(5, &mut rng);
        assert_eq!(generations(&rest), vec![2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn same_seed_same_interleaving() {
        let order = |seed: u64| {
            let mut queue = DeliveryQueue::new();
            let mut rng = DeterministicRng::new(seed);
            for g in 0..10 {
                queue.push(0, marker(g));
            }
            generations(&queue.drain_all(&mut rng))
        };
        assert_eq!(order(5), order(5));
        assert_ne!(order(5), order(6), "different seeds reorder differently");
    }
}
