//! Benchmark utilities for the skein runtime.
//!
//! This crate provides the shared infrastructure for benchmarking the
//! entity-component core:
//!
//! - **Fixtures**: pre-registered worlds and seeded population helpers
//! - **Microbenchmarks**: individual operations (attach, iterate, compact)
//! - **Scenario benchmarks**: sustained churn workloads
//! - **Memory tracking**: heap allocation profiling via dhat
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p skein_bench
//!
//! # Run a specific group
//! cargo bench -p skein_bench -- iterate
//!
//! # Run with memory profiling (slower)
//! cargo bench -p skein_bench --features memory_profiling
//! ```
//!
//! Results are written to `target/criterion/` with HTML reports. Memory
//! profiles land in `dhat-heap.json` for DHAT's viewer.

pub mod fixtures;
pub mod memory;

#[cfg(feature = "memory_profiling")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;
