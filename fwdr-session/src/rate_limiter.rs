//! Per-domain hourly message counter with rolling 24-hour buckets (§3, §4.1).
//!
//! Mutation is guarded by a single `parking_lot::Mutex` wrapping both the current-hour
//! index and the 24 slot maps together, so the hour-rollover check and the map mutation
//! happen under one critical section (§5 "Shared state").

use std::collections::HashMap;

use chrono::Timelike;
use fwdr_common::Domain;

const SLOTS: usize = 24;

struct State {
    current_hour: usize,
    slots: [HashMap<Domain, u64>; SLOTS],
}

impl State {
    fn new(current_hour: usize) -> Self {
        Self {
            current_hour,
            slots: std::array::from_fn(|_| HashMap::new()),
        }
    }

    /// Reconciles the current-hour index against `hour`, resetting that slot from any
    /// prior day before exposing it (§3's rate-counter invariant, §4.1).
    fn reconcile(&mut self, hour: usize) {
        if hour != self.current_hour {
            self.slots[hour] = HashMap::new();
            self.current_hour = hour;
        }
    }
}

/// Shared across all connection handlers (§4.1 "Scheduling").
pub struct RateLimiter {
    state: parking_lot::Mutex<State>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self { state: parking_lot::Mutex::new(State::new(current_hour())) }
    }

    /// Reconciles the current hour, then increments `domain`'s counter in that slot.
    pub fn inc(&self, domain: &Domain) {
        let mut state = self.state.lock();
        state.reconcile(current_hour());
        *state.slots[state.current_hour].entry(domain.clone()).or_insert(0) += 1;
    }

    /// Reconciles the current hour, then returns `domain`'s counter in that slot, or 0
    /// if the domain has no entry (§4.1).
    #[must_use]
    pub fn get_count(&self, domain: &Domain) -> u64 {
        let mut state = self.state.lock();
        state.reconcile(current_hour());
        state.slots[state.current_hour].get(domain).copied().unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn current_hour() -> usize {
    chrono::Local::now().hour() as usize
}
