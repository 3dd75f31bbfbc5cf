//! Block headers stored inline in the backing store.
//!
//! Every block, free or allocated, starts with a [`BlockHeader`]. The payload
//! handed out to callers begins immediately after it.
//!
//! ```text
//! ┌──────────────────────────────────┬───────────────────────┐
//! │ BlockHeader (8 bytes)            │ Payload (size bytes)  │
//! │ ┌─────────────┬────────────────┐ │                       │
//! │ │ next: u32   │ size: u32      │ │                       │
//! │ └─────────────┴────────────────┘ │                       │
//! └──────────────────────────────────┴───────────────────────┘
//! ^ block address                    ^ payload address
//! ```
//!
//! Links and sizes are 32-bit byte offsets into the store. Offset 0 lies in
//! the reserved low region and is never a block, so a zero link means "no
//! successor".

use dataview::{DataView, Pod};
use platform_cast::CastFrom as _;

/// Size of a block header in bytes.
pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

/// Metadata prefixed to every block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod)]
pub(crate) struct BlockHeader {
    /// Offset of the next free block. Only meaningful while the block is free;
    /// zero at the tail of the list and for allocated blocks.
    next: u32,
    /// Payload size in bytes, not counting the header itself.
    size: u32,
}
const _: () = assert!(HEADER_SIZE == 8);

impl BlockHeader {
    pub(crate) fn new(size: usize, next: Option<usize>) -> Self {
        Self {
            next: next.map_or(0, encode),
            size: encode(size),
        }
    }

    pub(crate) fn size(self) -> usize {
        usize::cast_from(self.size)
    }

    pub(crate) fn next(self) -> Option<usize> {
        (self.next != 0).then(|| usize::cast_from(self.next))
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = encode(size);
    }

    pub(crate) fn set_next(&mut self, next: Option<usize>) {
        self.next = next.map_or(0, encode);
    }

    /// Reads the header of the block at `addr`.
    ///
    /// # Panics
    ///
    /// Panics if the header does not lie inside `mem`.
    pub(crate) fn read(mem: &DataView, addr: usize) -> Self {
        *mem.get::<Self>(addr)
    }

    /// Reads the header of the block at `addr`, or `None` if it does not lie
    /// inside `mem`.
    pub(crate) fn try_read(mem: &DataView, addr: usize) -> Option<Self> {
        mem.try_get::<Self>(addr).copied()
    }

    /// Writes this header at `addr`.
    ///
    /// # Panics
    ///
    /// Panics if the header does not lie inside `mem`.
    pub(crate) fn write(self, mem: &mut DataView, addr: usize) {
        *mem.get_mut::<Self>(addr) = self;
    }
}

/// Returns the address one past the payload of a block at `addr` holding
/// `size` payload bytes.
///
/// A free block at this address would be physically adjacent.
pub(crate) fn block_end(addr: usize, size: usize) -> usize {
    addr + HEADER_SIZE + size
}

fn encode(value: usize) -> u32 {
    u32::try_from(value).expect("heap offsets and sizes must fit in 32 bits")
}
