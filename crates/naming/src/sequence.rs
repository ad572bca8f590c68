//! Per-kind sequence counter

use crate::kind::ResourceKind;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Hands out per-kind sequence numbers for one deployment.
///
/// Every kind starts at zero and advances by one for each descriptor of
/// that kind. The counter is owned by a deployment, so two deployments (or
/// two tests) never share numbering.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: Mutex<HashMap<ResourceKind, u32>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next sequence number for `kind`
    pub fn next(&self, kind: ResourceKind) -> u32 {
        let mut next = lock(&self.next);
        let slot = next.entry(kind).or_insert(0);
        let sequence = *slot;
        *slot += 1;
        log::trace!("sequence {sequence} assigned to {kind}");
        sequence
    }

    /// The number the next call to [`SequenceCounter::next`] would return
    pub fn peek(&self, kind: ResourceKind) -> u32 {
        lock(&self.next).get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counts_per_kind() {
        let counter = SequenceCounter::new();
        assert_eq!(counter.next(ResourceKind::ResourceGroup), 0);
        assert_eq!(counter.next(ResourceKind::ResourceGroup), 1);
        assert_eq!(counter.next(ResourceKind::StorageAccount), 0);
        assert_eq!(counter.peek(ResourceKind::ResourceGroup), 2);
        assert_eq!(counter.peek(ResourceKind::KeyVault), 0);
    }

    #[test]
    fn test_concurrent_increments_do_not_collide() {
        let counter = Arc::new(SequenceCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| counter.next(ResourceKind::FirewallRule))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(counter.peek(ResourceKind::FirewallRule), 400);
    }

    #[test]
    fn test_keeps_counting_after_poisoned_lock() {
        let counter = Arc::new(SequenceCounter::new());
        counter.next(ResourceKind::KeyVault);

        let poisoner = Arc::clone(&counter);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.next.lock().unwrap();
            panic!("poison the counter");
        })
        .join();
        assert!(joined.is_err());
        assert!(counter.next.is_poisoned());

        assert_eq!(counter.next(ResourceKind::KeyVault), 1);
        assert_eq!(counter.peek(ResourceKind::KeyVault), 2);
    }
}
