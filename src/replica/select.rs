//! Coordinator selection strategies

use crate::common::{ActiveNodeSet, NodeRef};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks the node that collects votes for a request
pub trait CoordinatorSelector: Send + Sync {
    /// `None` only for an empty set
    fn select(&self, active: &ActiveNodeSet) -> Option<NodeRef>;
}

/// Uniformly random choice per request
#[derive(Debug, Default)]
pub struct RandomSelector;

impl CoordinatorSelector for RandomSelector {
    fn select(&self, active: &ActiveNodeSet) -> Option<NodeRef> {
        if active.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..active.len());
        active.get(index).cloned()
    }
}

/// Cycles through the set in node-id order
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl CoordinatorSelector for RoundRobinSelector {
    fn select(&self, active: &ActiveNodeSet) -> Option<NodeRef> {
        if active.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % active.len();
        active.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> ActiveNodeSet {
        vec![
            NodeRef::with_id(1, "a"),
            NodeRef::with_id(2, "b"),
            NodeRef::with_id(3, "c"),
        ]
        .into()
    }

    #[test]
    fn test_empty_set_selects_nothing() {
        let empty = ActiveNodeSet::new();
        assert!(RandomSelector.select(&empty).is_none());
        assert!(RoundRobinSelector::default().select(&empty).is_none());
    }

    #[test]
    fn test_random_stays_in_set() {
        let active = three();
        for _ in 0..50 {
            let chosen = RandomSelector.select(&active).unwrap();
            assert!(active.contains(&chosen));
        }
    }

    #[test]
    fn test_round_robin_cycles() {
        let active = three();
        let selector = RoundRobinSelector::default();
        let picks: Vec<u64> = (0..4)
            .map(|_| selector.select(&active).unwrap().node_id)
            .collect();
        assert_eq!(picks, vec![1, 2, 3, 1]);
    }
}
