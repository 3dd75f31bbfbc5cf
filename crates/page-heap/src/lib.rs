//! A first-fit heap over a single page-growable byte range.
//!
//! This crate provides a freestanding dynamic memory allocator for
//! environments that offer nothing but a flat byte range which can report its
//! length and grow by fixed-size pages, such as a WebAssembly linear memory.
//! It is `no_std` and does not rely on any operating-system service.
//!
//! # Overview
//!
//! - [`Heap`] is the allocator. It owns its [`BackingStore`] and all
//!   allocator state, so independent heaps can coexist.
//! - [`BackingStore`] is the growth provider: a byte range starting at
//!   offset 0, grown in pages of [`PAGE_SIZE`] bytes, never shrunk.
//! - [`PagedBuffer`] is an owned, optionally page-limited backing store.
//!
//! Pointers handed out by the heap are byte offsets into the store
//! ([`HeapPtr`]), not machine addresses.
//!
//! # Algorithm
//!
//! - **Free list**: free blocks form a singly linked list kept in ascending
//!   address order. The links live in the blocks' own headers.
//! - **Allocation**: first fit. The list is scanned from the lowest address;
//!   an exact fit is taken whole, a larger block is split and its remainder
//!   stays on the list.
//! - **Deallocation**: the block is inserted at its address-ordered position
//!   and merged with physically adjacent free neighbours.
//! - **Growth**: when nothing fits, the store grows by enough whole pages and
//!   the new region joins the free list. The request is retried once.
//!
//! # Usage Example
//!
//! ```rust
//! use page_heap::{Heap, PagedBuffer};
//!
//! // One initial page, allowed to grow to four.
//! let mut heap = Heap::new(PagedBuffer::new(1).with_max_pages(4));
//!
//! let a = heap.allocate(24).unwrap();
//! let b = heap.allocate(100_000).unwrap(); // grows the store
//! heap.payload_mut(a).copy_from_slice(&[7; 24]);
//!
//! unsafe {
//!     heap.free(Some(a));
//!     heap.free(Some(b));
//! }
//! heap.validate().unwrap();
//!
//! // Far more than four pages cannot be had.
//! assert!(heap.allocate(1 << 20).is_none());
//! ```
//!
//! # Memory Layout
//!
//! ```text
//! 0        8         16
//! ┌────────┬─────────┬──────────────────┬─────────┬────────────────┐
//! │reserved│ header  │ payload          │ header  │ payload        │ ...
//! └────────┴─────────┴──────────────────┴─────────┴────────────────┘
//! ```
//!
//! The first [`RESERVED_OFFSET`] bytes are never allocated so that offset 0
//! stays free to mean "null". Every header is [`HEADER_SIZE`] bytes, and
//! every payload size is a multiple of [`ALIGN`].
//!
//! # Safety
//!
//! The heap trusts its caller. Freeing a pointer twice, or one the heap never
//! handed out, is not detected and corrupts the free list. Because all
//! accesses go through bounds-checked slices, such misuse can make later
//! allocations overlap or panic, but it never causes undefined behaviour.
//! [`Heap::validate`] walks the free list and reports damage for tests and
//! debugging.
//!
//! # Thread Safety
//!
//! A [`Heap`] is a plain value with `&mut self` operations. Sharing one
//! between threads requires external synchronization.

#![no_std]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

pub mod error;
mod free_list;
mod header;
pub mod heap;
pub mod store;

pub use self::{
    error::{AllocError, LayoutError},
    free_list::{FreeBlock, FreeBlocks},
    header::HEADER_SIZE,
    heap::{ALIGN, Heap, HeapPtr, RESERVED_OFFSET},
    store::{BackingStore, GrowError, MAX_PAGES, PAGE_SIZE, PagedBuffer},
};
