//! Allocator statistics

use core::fmt;

/// Point-in-time statistics of one allocator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Bytes currently in use, padding and headers included
    pub allocated_bytes: usize,
    /// Highest `allocated_bytes` seen since creation or the last reset
    pub peak_allocated_bytes: usize,
    /// Allocations currently live
    pub live_allocations: usize,
    /// Successful raw allocations
    pub allocation_count: usize,
    /// Successful raw deallocations
    pub deallocation_count: usize,
    /// Raw allocations that found the region exhausted
    pub failed_allocations: usize,
    /// Region size in bytes
    pub capacity: usize,
}

impl AllocatorStats {
    /// Fraction of the region in use, from 0.0 to 1.0
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.allocated_bytes as f64 / self.capacity as f64
        }
    }
}

impl fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} bytes used (peak {}), {} live, {} allocs, {} deallocs, {} failed",
            self.allocated_bytes,
            self.capacity,
            self.peak_allocated_bytes,
            self.live_allocations,
            self.allocation_count,
            self.deallocation_count,
            self.failed_allocations,
        )
    }
}

/// Counters kept next to the usage state when statistics are enabled
///
/// Always mutated under the allocator's lock or through `&mut`, so plain
/// integers are enough.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StatsCounters {
    enabled: bool,
    peak: usize,
    allocations: usize,
    deallocations: usize,
    failures: usize,
}

impl StatsCounters {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    #[inline]
    pub(crate) fn record_allocation(&mut self, used_after: usize) {
        if self.enabled {
            self.allocations += 1;
            self.peak = self.peak.max(used_after);
        }
    }

    #[inline]
    pub(crate) fn record_deallocation(&mut self) {
        if self.enabled {
            self.deallocations += 1;
        }
    }

    #[inline]
    pub(crate) fn record_failure(&mut self) {
        if self.enabled {
            self.failures += 1;
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.enabled);
    }

    pub(crate) fn snapshot(&self, used: usize, live: usize, capacity: usize) -> AllocatorStats {
        AllocatorStats {
            allocated_bytes: used,
            peak_allocated_bytes: if self.enabled { self.peak } else { used },
            live_allocations: live,
            allocation_count: self.allocations,
            deallocation_count: self.deallocations,
            failed_allocations: self.failures,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counters_track_peak() {
        let mut counters = StatsCounters::new(true);
        counters.record_allocation(64);
        counters.record_allocation(128);
        counters.record_deallocation();
        counters.record_failure();

        assert_eq!(
            counters.snapshot(64, 1, 256),
            AllocatorStats {
                allocated_bytes: 64,
                peak_allocated_bytes: 128,
                live_allocations: 1,
                allocation_count: 2,
                deallocation_count: 1,
                failed_allocations: 1,
                capacity: 256,
            }
        );
    }

    #[test]
    fn test_disabled_counters_stay_zero() {
        let mut counters = StatsCounters::new(false);
        counters.record_allocation(64);
        counters.record_failure();
        let stats = counters.snapshot(64, 1, 256);
        assert_eq!(stats.allocation_count, 0);
        assert_eq!(stats.failed_allocations, 0);
        assert_eq!(stats.peak_allocated_bytes, 64);
    }

    #[test]
    fn test_utilization() {
        let stats = AllocatorStats {
            allocated_bytes: 64,
            capacity: 256,
            ..AllocatorStats::default()
        };
        assert!((stats.utilization() - 0.25).abs() < f64::EPSILON);
    }
}
