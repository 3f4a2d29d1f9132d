use tracing::debug;

use crate::constants::{DEFAULT_INFLIGHT_CAP, MAX_WORKERS};

/// Worker count and in-flight item budget for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelismProfile {
    pub workers: usize,
    /// Upper bound on items buffered in a queue when sizing is automatic.
    pub inflight_items: usize,
}

impl Default for ParallelismProfile {
    fn default() -> Self {
        Self::single_threaded()
    }
}

impl ParallelismProfile {
    pub fn single_threaded() -> Self {
        Self { workers: 1, inflight_items: 1 }
    }

    pub fn new(workers: usize, inflight_items: usize) -> Self {
        Self {
            workers: workers.clamp(1, MAX_WORKERS),
            inflight_items: inflight_items.max(1),
        }
    }

    /// Size from the host: one worker per core minus one, and as many
    /// in-flight items of `item_len` bytes as fit in `mem_fraction` of
    /// available memory, capped at `hard_cap`.
    pub fn dynamic(item_len: usize, mem_fraction: f64, hard_cap: usize) -> Self {
        let cores = num_cpus::get();
        let workers = cores.saturating_sub(1).clamp(1, MAX_WORKERS);

        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let avail_bytes = sys.available_memory();

        let budget = (avail_bytes as f64 * mem_fraction.clamp(0.0, 1.0)) as u64;
        let per_item = item_len.max(1) as u64;
        let fit = (budget / per_item).min(hard_cap.max(1) as u64) as usize;

        let profile = Self { workers, inflight_items: fit.max(1) };
        debug!(
            "[PROFILE] cores={} workers={} inflight_items={} avail_bytes={}",
            cores, profile.workers, profile.inflight_items, avail_bytes
        );
        profile
    }

    /// [`dynamic`](Self::dynamic) with the default memory fraction and cap.
    pub fn for_item_len(item_len: usize) -> Self {
        Self::dynamic(item_len, crate::constants::DEFAULT_MEM_FRACTION, DEFAULT_INFLIGHT_CAP)
    }
}
