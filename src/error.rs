// Typed failure modes for allocator creation. alloc/free keep the
// raw-pointer, null-returning contract unchanged; only create gets a
// typed Result, since a failed create never hands out a region to
// reason about.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocatorError {
    // The requested region is smaller than the allocator's minimum.
    #[error("region of {requested} bytes is below the minimum of {minimum} bytes")]
    InsufficientRegion { requested: usize, minimum: usize },

    // The OS mapping primitive failed to provide the region.
    #[error("failed to map backing region: {0}")]
    Mapping(#[from] std::io::Error),
}
