use crate::sync::{AtomicU64, Ordering};

// For each signed 32-bit field X we store an unsigned 32-bit value Y biased
// by 2^31 (Y = X + 2^31). The counter therefore never holds a negative
// field, and arbitrary signed deltas can be applied to either or both
// fields with a single 64-bit add without a borrow of the lower 32 bits
// corrupting the upper 32 bits:
//   0x00000000 is the most negative value,
//   0x80000000 is zero,
//   0xffffffff is the most positive value.
const BIAS: u32 = 1 << 31;
const PACKED_ZERO: u64 = ((BIAS as u64) << 32) | BIAS as u64;

/// The number of busy workers and the number of unblocked tasks, packed
/// into a single atomic 64-bit value.
///
/// Together the two counters indicate whether the task graph can still make
/// progress: with 0 busy workers but > 0 unblocked tasks another worker is
/// about to become busy; with 0 unblocked tasks but > 0 busy workers a
/// worker is still running. Only when both reach 0 is the graph incapable
/// of further progress.
#[derive(Debug)]
#[repr(align(128))]
pub(crate) struct BusyThreadsAndUnblockedTasks {
    packed: AtomicU64,
}

impl BusyThreadsAndUnblockedTasks {
    /// Initializes both counters to 0.
    pub(crate) fn new() -> Self {
        Self {
            packed: AtomicU64::new(PACKED_ZERO),
        }
    }

    /// Atomically increments each counter by its own, possibly negative,
    /// delta.
    pub(crate) fn add(&self, busy_threads: i32, unblocked_tasks: i32, order: Ordering) {
        self.packed
            .fetch_add(pack_increment(busy_threads, unblocked_tasks), order);
    }

    /// Atomically increments each counter by its own delta, returning both
    /// values as they were prior to the increment.
    pub(crate) fn fetch_add(
        &self,
        busy_threads: i32,
        unblocked_tasks: i32,
        order: Ordering,
    ) -> (i32, i32) {
        unpack(
            self.packed
                .fetch_add(pack_increment(busy_threads, unblocked_tasks), order),
        )
    }

    /// Atomically loads both counter values.
    pub(crate) fn load(&self, order: Ordering) -> (i32, i32) {
        unpack(self.packed.load(order))
    }
}

// The single 64-bit amount that raises busy threads (upper 32 bits) and
// unblocked tasks (lower 32 bits) by the given deltas: each unblocked task
// adds 1, each busy thread adds 2^32. Sign extension combined with the bias
// on each field keeps the add exact for negative deltas, because the borrow
// out of the low field and the extension bits of the high field cancel.
fn pack_increment(busy_threads: i32, unblocked_tasks: i32) -> u64 {
    ((busy_threads as i64 as u64) << 32).wrapping_add(unblocked_tasks as i64 as u64)
}

// Extracting a field yields the unsigned biased value Y = X + 2^31;
// subtracting the bias back out recovers X.
fn unpack(packed: u64) -> (i32, i32) {
    let busy_threads = ((packed >> 32) as u32).wrapping_sub(BIAS) as i32;
    let unblocked_tasks = (packed as u32).wrapping_sub(BIAS) as i32;
    (busy_threads, unblocked_tasks)
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn zero_initialized() {
        let counters = BusyThreadsAndUnblockedTasks::new();
        assert_eq!(counters.load(Ordering::Relaxed), (0, 0));
    }

    #[test]
    fn signed_round_trip() {
        let counters = BusyThreadsAndUnblockedTasks::new();
        counters.add(3, -2, Ordering::Relaxed);
        assert_eq!(counters.load(Ordering::Relaxed), (3, -2));
        counters.add(-5, 7, Ordering::Relaxed);
        assert_eq!(counters.load(Ordering::Relaxed), (-2, 5));
        counters.add(2, -5, Ordering::Relaxed);
        assert_eq!(counters.load(Ordering::Relaxed), (0, 0));
    }

    #[test]
    fn fetch_add_returns_prior_values() {
        let counters = BusyThreadsAndUnblockedTasks::new();
        assert_eq!(counters.fetch_add(1, 0, Ordering::Relaxed), (0, 0));
        assert_eq!(counters.fetch_add(-1, 42, Ordering::Relaxed), (1, 0));
        assert_eq!(counters.load(Ordering::Relaxed), (0, 42));
    }

    #[test]
    fn negative_low_field_does_not_borrow_into_high_field() {
        let counters = BusyThreadsAndUnblockedTasks::new();
        counters.add(0, -1, Ordering::Relaxed);
        assert_eq!(counters.load(Ordering::Relaxed), (0, -1));
        counters.add(-1, -1, Ordering::Relaxed);
        assert_eq!(counters.load(Ordering::Relaxed), (-1, -2));
        counters.add(1, 2, Ordering::Relaxed);
        assert_eq!(counters.load(Ordering::Relaxed), (0, 0));
    }
}
