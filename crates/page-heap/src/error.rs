//! Error types reported by the heap.

use snafu::Snafu;

use crate::store::GrowError;

/// Errors returned by [`Heap::try_allocate`](crate::Heap::try_allocate).
///
/// Every variant means the same thing to a caller of
/// [`Heap::allocate`](crate::Heap::allocate): out of memory. The variants
/// only tell why.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum AllocError {
    /// The backing store refused to grow.
    #[snafu(display("out of memory: requested={requested}"))]
    OutOfMemory {
        requested: usize,
        #[snafu(source)]
        source: GrowError,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    /// The request cannot be represented in a block header once rounded up.
    #[snafu(display("allocation too large: requested={requested}"))]
    Oversized {
        requested: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    /// The free list still had no fitting block after growing once.
    #[snafu(display("no fitting block after growth: requested={requested}"))]
    NoFit {
        requested: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}

/// Free-list damage detected by [`Heap::validate`](crate::Heap::validate).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum LayoutError {
    #[snafu(display("free block out of bounds: addr={addr:#x}, end={end:#x}, len={len:#x}"))]
    OutOfBounds {
        addr: usize,
        end: usize,
        len: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("misaligned free block: addr={addr:#x}"))]
    Misaligned {
        addr: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("unaligned free block size: addr={addr:#x}, size={size}"))]
    UnalignedSize {
        addr: usize,
        size: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("free block inside the reserved region: addr={addr:#x}"))]
    Reserved {
        addr: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("free list out of order: prev={prev:#x}, addr={addr:#x}"))]
    Unordered {
        prev: usize,
        addr: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("overlapping free blocks: prev={prev:#x}, prev_end={prev_end:#x}, addr={addr:#x}"))]
    Overlapping {
        prev: usize,
        prev_end: usize,
        addr: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("adjacent free blocks not merged: prev={prev:#x}, addr={addr:#x}"))]
    Unmerged {
        prev: usize,
        addr: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}
