//! Address-ordered free list.
//!
//! Free blocks are chained through the `next` field of their headers in
//! strictly ascending address order. Keeping the list sorted lets both
//! neighbours of a freed block be found in a single pass, and makes physical
//! adjacency a matter of comparing one block's end with the next block's
//! address.
//!
//! ```text
//!  head
//!   │
//!   ▼
//! ┌────┬──────┐      ┌────┬─────┬────┬──────┐      ┌────┬──────────┐
//! │ hd │ free │ ···  │ hd │used │ hd │ free │ ···  │ hd │   free   │
//! └─┬──┴──────┘      └────┴─────┴─┬──┴──────┘      └────┴──────────┘
//!   └─────────────────────────────┘▲  └──────────────────▲
//!                                  next                  next
//! ```
//!
//! # Invariants
//!
//! - Addresses are strictly increasing from head to tail.
//! - No two free blocks are physically adjacent; such pairs are merged as
//!   soon as they appear.
//! - `size` never includes the header.

use dataview::DataView;
use log::trace;

use crate::header::{BlockHeader, HEADER_SIZE, block_end};

/// A free block as seen while walking the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FreeBlock {
    /// Offset of the block header in the backing store.
    pub addr: usize,
    /// Payload size in bytes, excluding the header.
    pub size: usize,
}

impl FreeBlock {
    /// Returns the offset one past the end of the block.
    #[must_use]
    pub fn end(&self) -> usize {
        block_end(self.addr, self.size)
    }
}

/// Head of a singly linked list of free blocks.
///
/// The list nodes live inside the backing store, so every operation takes
/// the store's bytes as a [`DataView`].
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    head: Option<usize>,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    pub(crate) fn iter<'a>(&self, mem: &'a DataView) -> FreeBlocks<'a> {
        FreeBlocks {
            mem,
            next: self.head,
        }
    }

    /// Removes the first block able to hold `size` bytes and returns its
    /// address.
    ///
    /// Candidates are visited in address order. A block of exactly `size`
    /// bytes is unlinked whole. A larger block is split: the front part is
    /// shrunk to `size` and handed out, and the remainder becomes a new free
    /// block taking the original's place in the list.
    ///
    /// `size` must be a multiple of the header size, so the remainder of a
    /// split always has room for its own header.
    pub(crate) fn take_first_fit(&mut self, mem: &mut DataView, size: usize) -> Option<usize> {
        assert!(size.is_multiple_of(HEADER_SIZE));

        let mut prev = None;
        let mut current = self.head;
        while let Some(addr) = current {
            let mut header = BlockHeader::read(mem, addr);
            let block_size = header.size();

            if block_size == size {
                trace!("exact fit: addr={addr:#x}, size={size}");
                self.relink(mem, prev, header.next());
                header.set_next(None);
                header.write(mem, addr);
                return Some(addr);
            }

            if block_size > size {
                let remainder_addr = block_end(addr, size);
                let remainder_size = block_size - size - HEADER_SIZE;
                trace!(
                    "split: addr={addr:#x}, size={size}, \
                     remainder_addr={remainder_addr:#x}, remainder_size={remainder_size}"
                );
                BlockHeader::new(remainder_size, header.next()).write(mem, remainder_addr);
                self.relink(mem, prev, Some(remainder_addr));
                BlockHeader::new(size, None).write(mem, addr);
                return Some(addr);
            }

            prev = current;
            current = header.next();
        }

        None
    }

    /// Inserts the block at `addr` into the list, keeping address order and
    /// merging it with physically adjacent neighbours.
    ///
    /// The block's header must already hold its payload size. Its link is
    /// overwritten.
    pub(crate) fn insert(&mut self, mem: &mut DataView, addr: usize) {
        let mut block = BlockHeader::read(mem, addr);

        // Find the last free block before `addr` and the first one after it.
        let mut prev = None;
        let mut next = self.head;
        while let Some(next_addr) = next {
            if next_addr > addr {
                break;
            }
            debug_assert_ne!(next_addr, addr, "block {addr:#x} is already free");
            prev = next;
            next = BlockHeader::read(mem, next_addr).next();
        }

        block.set_next(next);
        if let Some(next_addr) = next {
            if block_end(addr, block.size()) == next_addr {
                let next_header = BlockHeader::read(mem, next_addr);
                trace!("merge with next: addr={addr:#x}, next={next_addr:#x}");
                block.set_size(block.size() + HEADER_SIZE + next_header.size());
                block.set_next(next_header.next());
            }
        }
        block.write(mem, addr);

        let Some(prev_addr) = prev else {
            self.head = Some(addr);
            return;
        };

        let mut prev_header = BlockHeader::read(mem, prev_addr);
        if block_end(prev_addr, prev_header.size()) == addr {
            trace!("merge with prev: addr={addr:#x}, prev={prev_addr:#x}");
            prev_header.set_size(prev_header.size() + HEADER_SIZE + block.size());
            prev_header.set_next(block.next());
        } else {
            prev_header.set_next(Some(addr));
        }
        prev_header.write(mem, prev_addr);
    }

    /// Points `prev` (or the head, if `prev` is `None`) at `next`.
    fn relink(&mut self, mem: &mut DataView, prev: Option<usize>, next: Option<usize>) {
        match prev {
            None => self.head = next,
            Some(prev_addr) => {
                let mut prev_header = BlockHeader::read(mem, prev_addr);
                prev_header.set_next(next);
                prev_header.write(mem, prev_addr);
            }
        }
    }
}

/// Iterator over the free list in address order.
#[derive(Clone)]
pub struct FreeBlocks<'a> {
    mem: &'a DataView,
    next: Option<usize>,
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let addr = self.next?;
        let header = BlockHeader::read(self.mem, addr);
        self.next = header.next();
        Some(FreeBlock {
            addr,
            size: header.size(),
        })
    }
}
