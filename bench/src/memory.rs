//! Memory profiling utilities using dhat.
//!
//! Profiling adds overhead and is only compiled in when requested:
//!
//! ```bash
//! cargo bench -p skein_bench --features memory_profiling
//! ```
//!
//! After a profiled run, load the generated `dhat-heap.json` at
//! <https://nnethercote.github.io/dh_view/dh_view.html>.

/// Start a heap profile for the duration of the returned guard. Returns
/// `None` when profiling is compiled out.
#[cfg(feature = "memory_profiling")]
pub fn heap_profile() -> Option<dhat::Profiler> {
    Some(dhat::Profiler::new_heap())
}

/// Start a heap profile for the duration of the returned guard. Returns
/// `None` when profiling is compiled out.
#[cfg(not(feature = "memory_profiling"))]
pub fn heap_profile() -> Option<()> {
    None
}

/// Memory statistics captured during a benchmark run.
#[derive(Debug, Clone, Default)]
pub struct MemoryStats {
    /// Total bytes allocated during the measurement.
    pub bytes_allocated: u64,
    /// Total number of allocations.
    pub allocation_count: u64,
    /// Peak heap usage in bytes.
    pub peak_bytes: u64,
}

impl MemoryStats {
    /// Bytes allocated per entity for a given population.
    pub fn bytes_per_entity(&self, entity_count: usize) -> f64 {
        if entity_count == 0 {
            0.0
        } else {
            self.bytes_allocated as f64 / entity_count as f64
        }
    }

    /// Allocations per entity for a given population.
    pub fn allocations_per_entity(&self, entity_count: usize) -> f64 {
        if entity_count == 0 {
            0.0
        } else {
            self.allocation_count as f64 / entity_count as f64
        }
    }
}

impl std::fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "allocated: {} bytes ({} allocs), peak: {} bytes",
            self.bytes_allocated, self.allocation_count, self.peak_bytes
        )
    }
}
