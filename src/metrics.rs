// Engine metrics module
//
// Provides lightweight counters for monitoring generation and optimization outcomes

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Engine-wide counters
///
/// Uses atomic operations for thread-safe tracking without locks. One instance is
/// shared via `Arc` between the resolver, generator and optimizer of a
/// [`crate::services::BuildEngine`].
#[derive(Debug)]
pub struct EngineMetrics {
    /// Random or fixed-weapon builds produced
    pub builds_generated: AtomicU64,

    /// Generation requests that returned an error
    pub builds_failed: AtomicU64,

    /// Quest builds produced (whether or not they satisfy every requirement)
    pub quest_builds: AtomicU64,

    /// Quest builds meeting every requirement
    pub quest_builds_satisfied: AtomicU64,

    /// Slots left empty because nothing was affordable
    pub slots_unfilled: AtomicU64,

    /// Modules bought on the flea market because no trader offer was unlocked
    pub flea_fallbacks: AtomicU64,

    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,

    /// Total time spent in generation and optimization, in microseconds
    pub total_build_time_us: AtomicU64,

    start_time: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            builds_generated: AtomicU64::new(0),
            builds_failed: AtomicU64::new(0),
            quest_builds: AtomicU64::new(0),
            quest_builds_satisfied: AtomicU64::new(0),
            slots_unfilled: AtomicU64::new(0),
            flea_fallbacks: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            total_build_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_build_generated(&self) {
        self.builds_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_build_failed(&self) {
        self.builds_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished quest build
    pub fn record_quest_build(&self, satisfied: bool) {
        self.quest_builds.fetch_add(1, Ordering::Relaxed);
        if satisfied {
            self.quest_builds_satisfied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_slot_unfilled(&self) {
        self.slots_unfilled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flea_fallback(&self) {
        self.flea_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_build_time(&self, duration: Duration) {
        self.total_build_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of cache lookups served from the cache, 0.0 when there were none
    pub fn cache_hit_ratio(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Engine Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Builds: {} generated, {} failed, {} unfilled slots, {} flea fallbacks",
            self.builds_generated.load(Ordering::Relaxed),
            self.builds_failed.load(Ordering::Relaxed),
            self.slots_unfilled.load(Ordering::Relaxed),
            self.flea_fallbacks.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Quest builds: {} total, {} satisfied",
            self.quest_builds.load(Ordering::Relaxed),
            self.quest_builds_satisfied.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Slot cache: {} hits, {} misses ({:.0}% hit ratio)",
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
            self.cache_hit_ratio() * 100.0
        );
        tracing::info!(
            "Total build time: {:.2}ms",
            self.total_build_time_us.load(Ordering::Relaxed) as f64 / 1000.0
        );
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
