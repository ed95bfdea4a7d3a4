// Benchmark workload generator, timer, and utilization reporter.
//
// A thin external collaborator: it only ever calls create/alloc/free/
// free_memory/destroy through the Bench trait, never reaching into either
// allocator's internals. Two-pass structure: one pass timed, one pass on a
// freshly re-created allocator dedicated to the utilization measurement, so
// the fragmentation left behind by the timing run never skews the reported
// percentage.

use std::time::Instant;

use log::info;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::best_fit::BestFitAllocator;
use crate::error::AllocatorError;
use crate::mkc::MkcAllocator;

// Operations the harness needs from either allocator. Both
// BestFitAllocator and MkcAllocator implement it directly; the harness
// never sees their distinct internals past this seam.
pub trait Bench: Sized {
    fn create(region_size: usize) -> Result<Self, AllocatorError>;
    fn alloc(&mut self, n: usize) -> *mut u8;
    fn free(&mut self, p: *mut u8);
    fn free_memory(&self) -> usize;
}

impl Bench for BestFitAllocator {
    fn create(region_size: usize) -> Result<Self, AllocatorError> {
        BestFitAllocator::create(region_size)
    }
    fn alloc(&mut self, n: usize) -> *mut u8 {
        BestFitAllocator::alloc(self, n)
    }
    fn free(&mut self, p: *mut u8) {
        BestFitAllocator::free(self, p)
    }
    fn free_memory(&self) -> usize {
        BestFitAllocator::free_memory(self)
    }
}

impl Bench for MkcAllocator {
    fn create(region_size: usize) -> Result<Self, AllocatorError> {
        MkcAllocator::create(region_size)
    }
    fn alloc(&mut self, n: usize) -> *mut u8 {
        MkcAllocator::alloc(self, n)
    }
    fn free(&mut self, p: *mut u8) {
        MkcAllocator::free(self, p)
    }
    fn free_memory(&self) -> usize {
        MkcAllocator::free_memory(self)
    }
}

// Parameters the workload is generated from.
#[derive(Debug, Clone, Copy)]
pub struct WorkloadConfig {
    pub num_operations: usize,
    pub max_block_size: usize,
    pub region_size: usize,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            num_operations: 100_000,
            max_block_size: 128,
            region_size: 4 * 1024 * 1024,
            seed: 1_234_567,
        }
    }
}

// Timings and utilization collected for a single allocator.
#[derive(Debug, Clone, Copy)]
pub struct BenchResult {
    pub alloc_time: std::time::Duration,
    pub free_time: std::time::Duration,
    pub utilization_pct: f64,
}

// Run the full two-pass benchmark for one allocator type against config.
// Pass 1 drives num_operations allocations of 1 + (rng % max_block_size)
// bytes, timing the alloc phase and the free phase separately, then
// destroys the allocator. Pass 2 creates a fresh allocator instance and
// repeats the same (re-seeded) request sequence purely to measure
// utilization.
pub fn run<A: Bench>(config: &WorkloadConfig) -> Result<BenchResult, AllocatorError> {
    let mut alloc = A::create(config.region_size)?;
    let mut rng = Pcg64::seed_from_u64(config.seed);
    let mut pointers = Vec::with_capacity(config.num_operations);

    let start = Instant::now();
    for _ in 0..config.num_operations {
        let size = 1 + rng.gen_range(0..config.max_block_size);
        pointers.push(alloc.alloc(size));
    }
    let alloc_time = start.elapsed();
    info!("allocated {} blocks in {:?}", config.num_operations, alloc_time);

    let start = Instant::now();
    for p in pointers.drain(..) {
        alloc.free(p);
    }
    let free_time = start.elapsed();
    info!("freed {} blocks in {:?}", config.num_operations, free_time);

    drop(alloc);

    // second pass, fresh allocator, same seed: measures utilization alone.
    let mut alloc = A::create(config.region_size)?;
    let mut rng = Pcg64::seed_from_u64(config.seed);
    let mut total_requested = 0usize;
    let mut pointers = Vec::with_capacity(config.num_operations);
    for _ in 0..config.num_operations {
        let size = 1 + rng.gen_range(0..config.max_block_size);
        let p = alloc.alloc(size);
        if !p.is_null() {
            total_requested += size;
            pointers.push(p);
        }
    }

    let free_memory = alloc.free_memory();
    let used_memory = config.region_size.saturating_sub(free_memory);
    let utilization_pct = if used_memory > 0 {
        total_requested as f64 / used_memory as f64 * 100.0
    } else {
        0.0
    };
    info!("utilization: {:.2}%", utilization_pct);

    for p in pointers {
        alloc.free(p);
    }

    Ok(BenchResult {
        alloc_time,
        free_time,
        utilization_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> WorkloadConfig {
        WorkloadConfig {
            num_operations: 2_000,
            max_block_size: 64,
            region_size: 512 * 1024,
            seed: 42,
        }
    }

    #[test]
    fn best_fit_runs_and_reports_plausible_utilization() {
        let result = run::<BestFitAllocator>(&small_config()).unwrap();
        assert!(result.utilization_pct > 0.0 && result.utilization_pct <= 100.0);
    }

    #[test]
    fn mkc_runs_and_reports_plausible_utilization() {
        let result = run::<MkcAllocator>(&small_config()).unwrap();
        assert!(result.utilization_pct > 0.0 && result.utilization_pct <= 100.0);
    }

    #[test]
    fn rejects_undersized_region() {
        let config = WorkloadConfig {
            region_size: 8,
            ..small_config()
        };
        assert!(run::<BestFitAllocator>(&config).is_err());
        assert!(run::<MkcAllocator>(&config).is_err());
    }
}
