use core::sync::atomic::{AtomicUsize, Ordering};
use std::env;

/// Environment variable consulted for the initial concurrency limit.
///
/// Accepts a positive integer; `1` disables concurrency entirely, making
/// every parallel primitive run its callback serially on the calling thread.
pub const THREAD_LIMIT_ENV: &str = "CTG_THREAD_LIMIT";

// 0 means "not yet initialized"; the effective limit is always >= 1.
static CONCURRENCY_LIMIT: AtomicUsize = AtomicUsize::new(0);

fn initial_limit() -> usize {
    env::var(THREAD_LIMIT_ENV)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|&limit| limit > 0)
        .unwrap_or_else(rayon::current_num_threads)
        .max(1)
}

/// Returns the process-wide concurrency limit.
///
/// Initialized on first use from [`THREAD_LIMIT_ENV`], falling back to the
/// width of the current rayon thread pool.
pub fn concurrency_limit() -> usize {
    match CONCURRENCY_LIMIT.load(Ordering::Relaxed) {
        0 => {
            let limit = initial_limit();
            tracing::debug!(limit, "concurrency limit initialized");
            // Initialization may race; both sides compute the same value
            // unless `set_concurrency_limit` won, which takes precedence.
            match CONCURRENCY_LIMIT.compare_exchange(
                0,
                limit,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => limit,
                Err(previous) => previous,
            }
        }
        limit => limit,
    }
}

/// Overrides the process-wide concurrency limit.
///
/// A limit of `1` routes all parallel primitives through their serial
/// fallbacks. Values below `1` are clamped to `1`.
pub fn set_concurrency_limit(limit: usize) {
    CONCURRENCY_LIMIT.store(limit.max(1), Ordering::Relaxed);
}

/// Returns `true` if parallel primitives may actually run concurrently.
pub fn has_concurrency() -> bool {
    concurrency_limit() > 1
}
