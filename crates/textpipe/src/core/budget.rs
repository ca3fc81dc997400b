//! Thread budget allocation across concurrent item lanes.
//!
//! The global budget `G` is represented by `G` semaphore permits. Every Linear
//! invocation holds the permits matching the budget it was granted, so the sum of
//! budgets of in-flight invocations can never exceed `G`.
//!
//! Grants are computed at stage entry as `max(1, floor(G / K))` where `K` is the
//! number of active lanes, capped by what is currently free. When the input has
//! announced how many items it will produce, `K` is never less than the number
//! of items still to finish (up to `G`), so the first lane of a run does not take
//! the whole budget just because its siblings have not started yet. A grant is held for
//! the whole invocation and only returned when it completes; capacity freed by a
//! finishing lane is picked up by lanes entering their next stage.

use crate::types::ThreadBudget;
use crate::{Result, TextpipeError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Per-lane share of `max_threads` when `active_lanes` lanes are running.
pub fn lane_share(max_threads: usize, active_lanes: usize) -> usize {
    (max_threads / active_lanes.max(1)).max(1)
}

#[derive(Debug, Default)]
struct LaneCounts {
    active: usize,
    expected: usize,
}

/// Partitions the global thread budget between lanes.
#[derive(Debug)]
pub struct ThreadBudgetAllocator {
    max_threads: usize,
    permits: Arc<Semaphore>,
    lanes: Mutex<LaneCounts>,
}

impl ThreadBudgetAllocator {
    /// Create an allocator for a global budget of `max_threads` (at least 1).
    pub fn new(max_threads: usize) -> Self {
        let max_threads = max_threads.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            max_threads,
            permits: Arc::new(Semaphore::new(max_threads)),
            lanes: Mutex::new(LaneCounts::default()),
        }
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Number of lanes currently registered.
    pub fn active_lanes(&self) -> usize {
        self.lanes.lock().active
    }

    /// Announce how many items the run will carry. Every closed lane counts one
    /// of them as finished.
    pub fn expect_lanes(&self, items: usize) {
        self.lanes.lock().expected = items;
    }

    /// Count an announced item that never got a lane (e.g. it failed to load).
    pub fn retire_expected(&self) {
        let mut lanes = self.lanes.lock();
        lanes.expected = lanes.expected.saturating_sub(1);
    }

    /// The `K` grants are divided by.
    fn demand(&self) -> usize {
        let lanes = self.lanes.lock();
        lanes.active.max(lanes.expected.min(self.max_threads))
    }

    /// Threads currently granted to in-flight invocations.
    pub fn granted(&self) -> usize {
        self.max_threads - self.permits.available_permits()
    }

    /// Register a lane. The lane counts towards `K` until the guard is dropped.
    pub fn open_lane(self: &Arc<Self>) -> LaneGuard {
        self.lanes.lock().active += 1;
        LaneGuard {
            allocator: Arc::clone(self),
        }
    }

    /// Grant a budget for one stage invocation, waiting until it is available.
    pub async fn enter_stage(&self) -> Result<BudgetGrant> {
        let share = lane_share(self.max_threads, self.demand());
        let threads = share.min(self.permits.available_permits()).max(1);
        let permits = u32::try_from(threads).unwrap_or(u32::MAX);

        let permit = Arc::clone(&self.permits)
            .acquire_many_owned(permits)
            .await
            .map_err(|_| TextpipeError::Other("Thread budget semaphore closed".to_string()))?;

        Ok(BudgetGrant {
            budget: ThreadBudget::new(permits as usize),
            _permit: permit,
        })
    }
}

/// Lane registration; deregisters on drop.
#[derive(Debug)]
pub struct LaneGuard {
    allocator: Arc<ThreadBudgetAllocator>,
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        let mut lanes = self.allocator.lanes.lock();
        lanes.active = lanes.active.saturating_sub(1);
        lanes.expected = lanes.expected.saturating_sub(1);
    }
}

/// A budget held for one invocation. Capacity returns to the pool on drop.
#[derive(Debug)]
pub struct BudgetGrant {
    budget: ThreadBudget,
    _permit: OwnedSemaphorePermit,
}

impl BudgetGrant {
    pub fn budget(&self) -> ThreadBudget {
        self.budget
    }
}
