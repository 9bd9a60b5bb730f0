//! The priority-ordered write scheduler (spec §4.6): among streams with
//! positive send window and pending DATA, the next to write is chosen by
//! ordering key `(dependency, 256 − weight, !exclusive, stream_id)`,
//! ascending. Dependencies form a DAG rooted at stream 0; a cycle is
//! rejected as `PROTOCOL_ERROR` rather than silently re-rooted, per the
//! Open Question resolution recorded in DESIGN.md.
//!
//! Grounded in the general shape of `rama-http-core`'s `h2::proto::streams`
//! priority handling (a dirty-flag-rebuilt ordering over the stream table)
//! adapted to the plain binary-heap-of-keys spec §4.6 describes.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    dependency: u32,
    inverted_weight: u16,
    not_exclusive: bool,
    stream_id: u32,
}

pub struct Scheduler {
    /// `stream_id -> (dependency, weight, exclusive)`, the priority tree.
    priorities: HashMap<u32, (u32, u8, bool)>,
    pending: Vec<u32>,
    dirty: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            priorities: HashMap::new(),
            pending: Vec::new(),
            dirty: false,
        }
    }

    /// Records (or updates) a stream's priority. Returns `Err` if doing so
    /// would create a dependency cycle.
    pub fn set_priority(
        &mut self,
        stream_id: u32,
        dependency: u32,
        weight: u8,
        exclusive: bool,
    ) -> Result<(), CycleDetected> {
        let mut candidate = self.priorities.clone();
        candidate.insert(stream_id, (dependency, weight, exclusive));
        if has_cycle(&candidate, stream_id) {
            return Err(CycleDetected);
        }
        self.priorities = candidate;
        self.dirty = true;
        Ok(())
    }

    pub fn mark_pending(&mut self, stream_id: u32) {
        if !self.pending.contains(&stream_id) {
            self.pending.push(stream_id);
            self.dirty = true;
        }
    }

    pub fn remove_pending(&mut self, stream_id: u32) {
        self.pending.retain(|&id| id != stream_id);
    }

    fn key_for(&self, stream_id: u32) -> OrderKey {
        let (dependency, weight, exclusive) =
            self.priorities.get(&stream_id).copied().unwrap_or((0, 16, false));
        OrderKey {
            dependency,
            inverted_weight: 256 - weight as u16,
            not_exclusive: !exclusive,
            stream_id,
        }
    }

    /// Returns the pending stream ids in write order. The heap is "lazily
    /// rebuilt" in the sense that this recomputes the full order on demand
    /// rather than maintaining an always-valid heap — correct and simple,
    /// since connection write batches are small.
    pub fn next_order(&mut self) -> Vec<u32> {
        let mut heap: BinaryHeap<Reverse<OrderKey>> = self
            .pending
            .iter()
            .map(|&id| Reverse(self.key_for(id)))
            .collect();
        self.dirty = false;
        let mut order = Vec::with_capacity(heap.len());
        while let Some(Reverse(key)) = heap.pop() {
            order.push(key.stream_id);
        }
        order
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("priority dependency graph contains a cycle")]
pub struct CycleDetected;

fn has_cycle(priorities: &HashMap<u32, (u32, u8, bool)>, start: u32) -> bool {
    let mut visited = std::collections::HashSet::new();
    let mut current = start;
    loop {
        if current == 0 {
            return false; // reached the root
        }
        if !visited.insert(current) {
            return true;
        }
        match priorities.get(&current) {
            Some(&(dependency, _, _)) => current = dependency,
            None => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_dependency_then_weight_then_stream_id() {
        let mut sched = Scheduler::new();
        sched.set_priority(3, 0, 0, false).unwrap(); // weight 0 -> lowest actual weight
        sched.set_priority(5, 0, 255, false).unwrap(); // weight 255 -> highest
        sched.mark_pending(3);
        sched.mark_pending(5);
        let order = sched.next_order();
        // Higher weight (255) should be scheduled before lower weight (0).
        assert_eq!(order, vec![5, 3]);
    }

    #[test]
    fn rejects_cycle_in_dependency_graph() {
        let mut sched = Scheduler::new();
        sched.set_priority(3, 5, 16, false).unwrap();
        assert!(sched.set_priority(5, 3, 16, false).is_err());
    }

    #[test]
    fn default_priority_is_weight_16_rooted_at_zero() {
        let mut sched = Scheduler::new();
        sched.mark_pending(7);
        let key = sched.key_for(7);
        assert_eq!(key.dependency, 0);
        assert_eq!(key.inverted_weight, 256 - 16);
    }
}
