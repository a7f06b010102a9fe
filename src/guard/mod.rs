//! Per-requester single-flight guard.
//!
//! A requester id is inserted with one atomic test-and-set, so two near-simultaneous
//! requests from the same user cannot both observe it as free. Holding a [`JobPermit`]
//! keeps the id marked; dropping it releases the id on every exit path, unwinding included.
//! Each permit carries a generation, so a stale permit never clears a newer holder.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct JobGuard {
    held: DashMap<String, u64>,
    generation: AtomicU64,
}

impl JobGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark `requester` as busy. Returns `None` without side effects if it already is.
    pub fn try_acquire(self: &Arc<Self>, requester: &str) -> Option<JobPermit> {
        match self.held.entry(requester.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                slot.insert(generation);
                tracing::debug!("Job guard acquired for {}", requester);
                Some(JobPermit {
                    guard: Arc::clone(self),
                    requester: requester.to_string(),
                    generation,
                })
            }
        }
    }

    /// Clear the busy mark. Safe to call for ids that are not held.
    pub fn release(&self, requester: &str) {
        if self.held.remove(requester).is_some() {
            tracing::debug!("Job guard released for {}", requester);
        }
    }

    pub fn is_held(&self, requester: &str) -> bool {
        self.held.contains_key(requester)
    }

    /// Number of requesters with a download in flight
    pub fn active_count(&self) -> usize {
        self.held.len()
    }
}

/// Proof that a requester holds the guard
#[derive(Debug)]
pub struct JobPermit {
    guard: Arc<JobGuard>,
    requester: String,
    generation: u64,
}

impl JobPermit {
    pub fn requester(&self) -> &str {
        &self.requester
    }
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        let removed = self
            .guard
            .held
            .remove_if(&self.requester, |_, generation| *generation == self.generation);
        if removed.is_some() {
            tracing::debug!("Job guard released for {}", self.requester);
        }
    }
}
