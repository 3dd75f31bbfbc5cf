//! The allocator context.
//!
//! [`Heap`] owns a [`BackingStore`] together with the head of its free list
//! and a flag recording whether the initial free block has been laid out.
//! Nothing is global: each heap is an independent allocator.
//!
//! # Layout
//!
//! ```text
//! 0        8                                                   len
//! ┌────────┬──────────┬────────────┬──────────┬──────────────────┐
//! │reserved│ header   │ payload    │ header   │ payload ...      │
//! └────────┴──────────┴────────────┴──────────┴──────────────────┘
//! ```
//!
//! The first [`RESERVED_OFFSET`] bytes are never handed out, so offset 0 can
//! serve as the null pointer. Payload sizes are rounded up to [`ALIGN`]
//! bytes, which keeps every header and every payload 8-byte aligned.
//!
//! # Growth
//!
//! When no free block fits a request, the heap asks the store for enough
//! whole pages to hold the request plus one header, lays a free block over
//! the new region, and frees it like any other block. If the store's former
//! tail was free, the two merge. The request is then retried once; a second
//! miss is reported as out of memory rather than growing again.

use core::{fmt, num::NonZeroUsize};

use dataview::DataView;
use log::{debug, trace, warn};
use snafu::{OptionExt as _, ResultExt as _, ensure};

use crate::{
    error::{
        AllocError, LayoutError, MisalignedSnafu, NoFitSnafu, OutOfBoundsSnafu,
        OutOfMemorySnafu, OverlappingSnafu, OversizedSnafu, ReservedSnafu, UnalignedSizeSnafu,
        UnmergedSnafu, UnorderedSnafu,
    },
    free_list::{FreeBlock, FreeBlocks, FreeList},
    header::{BlockHeader, HEADER_SIZE},
    store::{BackingStore, GrowError, PAGE_SIZE},
};

/// Alignment of every payload and every payload size, in bytes.
pub const ALIGN: usize = 8;

/// Number of bytes at the start of the store that are never allocated.
pub const RESERVED_OFFSET: usize = 8;

const _: () = assert!(HEADER_SIZE.is_multiple_of(ALIGN));
const _: () = assert!(RESERVED_OFFSET.is_multiple_of(ALIGN));

/// Offset of an allocated payload inside a heap's backing store.
///
/// The offset is never zero; the absence of an allocation is spelled
/// `Option::<HeapPtr>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapPtr(NonZeroUsize);

impl HeapPtr {
    /// Wraps a raw payload offset, returning `None` for the null offset.
    #[must_use]
    pub fn from_addr(addr: usize) -> Option<Self> {
        NonZeroUsize::new(addr).map(Self)
    }

    /// Returns the payload offset.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.get()
    }

    fn from_block(block: usize) -> Self {
        Self::from_addr(block + HEADER_SIZE).expect("blocks never start at offset 0")
    }

    fn block(self) -> usize {
        self.addr() - HEADER_SIZE
    }
}

impl fmt::Display for HeapPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

/// A first-fit allocator over a single growable byte range.
///
/// The free list is laid out lazily: the first operation that needs it turns
/// the whole initial store, minus the reserved region, into one free block.
///
/// # Examples
///
/// ```
/// use page_heap::{Heap, PagedBuffer};
///
/// let mut heap = Heap::new(PagedBuffer::new(1));
/// let ptr = heap.allocate(100).unwrap();
/// heap.payload_mut(ptr).fill(0x2a);
/// assert_eq!(heap.payload(ptr).len(), 104);
///
/// unsafe {
///     heap.free(Some(ptr));
/// }
/// assert_eq!(heap.free_total(), 65536 - 16);
/// ```
#[derive(Debug)]
pub struct Heap<S> {
    store: S,
    free_list: FreeList,
    initialized: bool,
}

impl<S> Heap<S> {
    /// Creates a heap over `store`.
    ///
    /// The store is not touched until the first allocator operation.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self {
            store,
            free_list: FreeList::new(),
            initialized: false,
        }
    }

    /// Returns `true` once the initial free block has been laid out.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the heap and returns its backing store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S> Heap<S>
where
    S: BackingStore,
{
    /// Lays out the initial free block if that has not happened yet.
    ///
    /// The block starts at [`RESERVED_OFFSET`] and spans the rest of the
    /// store, up to its last multiple of [`ALIGN`]. A store too small to hold
    /// even a header leaves the free list empty; the first allocation then
    /// grows it.
    ///
    /// Calling this more than once has no further effect.
    pub fn ensure_initialized(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let len = self.store.len();
        let Some(size) = align_down(len).checked_sub(RESERVED_OFFSET + HEADER_SIZE) else {
            debug!("heap initialized without free space: len={len:#x}");
            return;
        };
        debug!("heap initialized: len={len:#x}, free={size}");

        let mem = DataView::from_mut(self.store.bytes_mut());
        BlockHeader::new(size, None).write(mem, RESERVED_OFFSET);
        self.free_list.insert(mem, RESERVED_OFFSET);
    }

    /// Allocates `bytes` bytes and returns the payload offset.
    ///
    /// The payload is rounded up to a multiple of [`ALIGN`] bytes and its
    /// contents are unspecified. Returns `None` when the store cannot grow
    /// enough to satisfy the request.
    pub fn allocate(&mut self, bytes: usize) -> Option<HeapPtr> {
        self.try_allocate(bytes).ok()
    }

    /// Allocates `bytes` bytes, reporting why on failure.
    ///
    /// Behaves exactly like [`allocate`](Self::allocate).
    pub fn try_allocate(&mut self, bytes: usize) -> Result<HeapPtr, AllocError> {
        self.allocate_block(bytes)
            .map(HeapPtr::from_block)
            .inspect(|ptr| trace!("allocate: bytes={bytes}, ptr={ptr}"))
            .inspect_err(|err| warn!("allocate failed: bytes={bytes}, {err}"))
    }

    fn allocate_block(&mut self, bytes: usize) -> Result<usize, AllocError> {
        self.ensure_initialized();

        let (size, size_with_header) =
            rounded_size(bytes).context(OversizedSnafu { requested: bytes })?;

        if self.free_list.is_empty() {
            self.grow(size_with_header)
                .context(OutOfMemorySnafu { requested: bytes })?;
        }

        let mut grown = false;
        loop {
            let mem = DataView::from_mut(self.store.bytes_mut());
            if let Some(addr) = self.free_list.take_first_fit(mem, size) {
                return Ok(addr);
            }

            // One growth per exhausted scan, never more.
            ensure!(!grown, NoFitSnafu { requested: bytes });
            self.grow(size)
                .context(OutOfMemorySnafu { requested: bytes })?;
            grown = true;
        }
    }

    /// Returns an allocation to the heap.
    ///
    /// Freeing `None` does nothing. The block is merged with any physically
    /// adjacent free neighbours.
    ///
    /// # Safety
    ///
    /// The heap trusts its caller and performs no validation. `ptr` must be
    /// `None` or a pointer returned by this heap's
    /// [`allocate`](Self::allocate) that has not been freed since. Anything
    /// else corrupts the free list, after which allocations may overlap.
    pub unsafe fn free(&mut self, ptr: Option<HeapPtr>) {
        self.ensure_initialized();

        let Some(ptr) = ptr else {
            return;
        };
        trace!("free: ptr={ptr}");

        let mem = DataView::from_mut(self.store.bytes_mut());
        self.free_list.insert(mem, ptr.block());
    }

    /// Returns the total payload bytes held by free blocks.
    ///
    /// Headers are not counted.
    pub fn free_total(&mut self) -> usize {
        self.ensure_initialized();
        self.free_blocks().map(|block| block.size).sum()
    }

    /// Returns the free blocks in address order.
    ///
    /// Unlike the other operations this does not lay out the initial free
    /// block, so an untouched heap reports none.
    #[must_use]
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        self.free_list.iter(DataView::from(self.store.bytes()))
    }

    /// Checks the free list for damage.
    ///
    /// Verifies that every free block lies inside the store past the
    /// reserved region, is aligned, and that the list is strictly ascending
    /// with no overlapping or unmerged neighbours. Meant for tests and
    /// debugging; the allocator never calls it.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mem = DataView::from(self.store.bytes());
        let len = self.store.len();

        let mut prev: Option<FreeBlock> = None;
        let mut next = self.free_list.head();
        while let Some(addr) = next {
            ensure!(addr >= RESERVED_OFFSET, ReservedSnafu { addr });
            ensure!(addr.is_multiple_of(ALIGN), MisalignedSnafu { addr });
            if let Some(prev) = prev {
                let (prev_addr, prev_end) = (prev.addr, prev.end());
                ensure!(
                    prev_addr < addr,
                    UnorderedSnafu {
                        prev: prev_addr,
                        addr
                    }
                );
                ensure!(
                    prev_end <= addr,
                    OverlappingSnafu {
                        prev: prev_addr,
                        prev_end,
                        addr
                    }
                );
                ensure!(
                    prev_end != addr,
                    UnmergedSnafu {
                        prev: prev_addr,
                        addr
                    }
                );
            }

            let header = BlockHeader::try_read(mem, addr).context(OutOfBoundsSnafu {
                addr,
                end: addr + HEADER_SIZE,
                len,
            })?;
            let block = FreeBlock {
                addr,
                size: header.size(),
            };
            ensure!(
                block.size.is_multiple_of(ALIGN),
                UnalignedSizeSnafu {
                    addr,
                    size: block.size
                }
            );
            ensure!(
                block.end() <= len,
                OutOfBoundsSnafu {
                    addr,
                    end: block.end(),
                    len
                }
            );

            prev = Some(block);
            next = header.next();
        }

        Ok(())
    }

    /// Returns the payload of a live allocation.
    ///
    /// The slice spans the rounded size recorded in the block header.
    ///
    /// `ptr` must come from this heap's [`allocate`](Self::allocate) and must
    /// not have been passed to [`free`](Self::free) since. The size of a freed
    /// block may already include merged neighbours, so the returned slice can
    /// cover free-list headers and other allocations.
    ///
    /// # Panics
    ///
    /// May panic if `ptr` is not a live allocation of this heap.
    #[must_use]
    pub fn payload(&self, ptr: HeapPtr) -> &[u8] {
        let size = BlockHeader::read(DataView::from(self.store.bytes()), ptr.block()).size();
        &self.store.bytes()[ptr.addr()..ptr.addr() + size]
    }

    /// Returns the payload of a live allocation for writing.
    ///
    /// `ptr` must be live, as for [`payload`](Self::payload). Writing through
    /// a freed pointer does not cause undefined behaviour, but it can
    /// overwrite free-list headers and corrupt the heap, after which
    /// allocations may overlap. [`validate`](Self::validate) detects some of
    /// this damage.
    ///
    /// # Panics
    ///
    /// May panic if `ptr` is not a live allocation of this heap.
    #[must_use]
    pub fn payload_mut(&mut self, ptr: HeapPtr) -> &mut [u8] {
        let size = BlockHeader::read(DataView::from(self.store.bytes()), ptr.block()).size();
        &mut self.store.bytes_mut()[ptr.addr()..ptr.addr() + size]
    }

    /// Grows the store far enough to hold `bytes` payload bytes plus a header
    /// and frees the new region into the list.
    ///
    /// The new block covers the aligned part of the added region. If that is
    /// too small for a header, the list is left as it was.
    fn grow(&mut self, bytes: usize) -> Result<(), GrowError> {
        let pages = bytes.saturating_add(HEADER_SIZE).div_ceil(PAGE_SIZE);
        let old_len = self.store.len();
        let new_len = self.store.grow(pages)?;

        // An empty store still keeps its reserved region.
        let start = old_len.next_multiple_of(ALIGN).max(RESERVED_OFFSET);
        let Some(size) = align_down(new_len).checked_sub(start + HEADER_SIZE) else {
            debug!("heap grown without free space: len={old_len:#x}->{new_len:#x}");
            return Ok(());
        };
        debug!("heap grown: pages={pages}, len={old_len:#x}->{new_len:#x}, free={size}");

        let mem = DataView::from_mut(self.store.bytes_mut());
        BlockHeader::new(size, None).write(mem, start);
        self.free_list.insert(mem, start);
        Ok(())
    }
}

fn align_down(len: usize) -> usize {
    len - len % ALIGN
}

/// Rounds a request up to the allocation granularity.
///
/// Returns the payload size and the payload size plus header, or `None` if
/// either does not fit a header's 32-bit size field.
fn rounded_size(bytes: usize) -> Option<(usize, usize)> {
    let size = bytes.checked_next_multiple_of(ALIGN)?;
    let size_with_header = size.checked_add(HEADER_SIZE)?;
    u32::try_from(size_with_header)
        .is_ok()
        .then_some((size, size_with_header))
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use dataview::PodMethods as _;
    use platform_cast::CastFrom as _;

    use super::*;
    use crate::store::PagedBuffer;

    fn blocks<S>(heap: &Heap<S>) -> Vec<(usize, usize)>
    where
        S: BackingStore,
    {
        heap.free_blocks().map(|b| (b.addr, b.size)).collect()
    }

    /// A store that grows by a single page no matter how many are asked for.
    struct StingyStore {
        inner: PagedBuffer,
        grow_calls: usize,
    }

    impl BackingStore for StingyStore {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn grow(&mut self, _pages: usize) -> Result<usize, GrowError> {
            self.grow_calls += 1;
            self.inner.grow(1)
        }

        fn bytes(&self) -> &[u8] {
            self.inner.bytes()
        }

        fn bytes_mut(&mut self) -> &mut [u8] {
            self.inner.bytes_mut()
        }
    }

    /// A store whose length is not a multiple of 8.
    struct OddStore {
        words: Vec<u64>,
        len: usize,
    }

    impl OddStore {
        fn new(len: usize) -> Self {
            Self {
                words: alloc::vec![0; len.div_ceil(8)],
                len,
            }
        }
    }

    impl BackingStore for OddStore {
        fn len(&self) -> usize {
            self.len
        }

        fn grow(&mut self, pages: usize) -> Result<usize, GrowError> {
            self.len += pages * PAGE_SIZE;
            self.words.resize(self.len.div_ceil(8), 0);
            Ok(self.len)
        }

        fn bytes(&self) -> &[u8] {
            &self.words.as_slice().as_bytes()[..self.len]
        }

        fn bytes_mut(&mut self) -> &mut [u8] {
            let len = self.len;
            &mut self.words.as_mut_slice().as_bytes_mut()[..len]
        }
    }

    #[test]
    fn test_rounded_size() {
        assert_eq!(rounded_size(0), Some((0, 8)));
        assert_eq!(rounded_size(1), Some((8, 16)));
        assert_eq!(rounded_size(8), Some((8, 16)));
        assert_eq!(rounded_size(9), Some((16, 24)));
        assert_eq!(rounded_size(usize::MAX), None);
        assert_eq!(rounded_size(usize::cast_from(u32::MAX)), None);
    }

    #[test]
    fn test_lazy_initialization() {
        let mut heap = Heap::new(PagedBuffer::new(1));
        assert!(!heap.is_initialized());
        assert!(blocks(&heap).is_empty());

        heap.ensure_initialized();
        assert!(heap.is_initialized());
        assert_eq!(blocks(&heap), [(RESERVED_OFFSET, PAGE_SIZE - 16)]);

        heap.ensure_initialized();
        heap.ensure_initialized();
        assert_eq!(blocks(&heap), [(RESERVED_OFFSET, PAGE_SIZE - 16)]);
    }

    #[test]
    fn test_operations_initialize() {
        let mut heap = Heap::new(PagedBuffer::with_len(64));
        assert_eq!(heap.free_total(), 48);

        let mut heap = Heap::new(PagedBuffer::with_len(64));
        unsafe {
            heap.free(None);
        }
        assert!(heap.is_initialized());
        assert_eq!(blocks(&heap), [(8, 48)]);

        let mut heap = Heap::new(PagedBuffer::with_len(64));
        assert_eq!(heap.allocate(48).map(HeapPtr::addr), Some(16));
    }

    #[test]
    fn test_initialize_tiny_store() {
        let mut heap = Heap::new(PagedBuffer::with_len(8));
        heap.ensure_initialized();
        assert!(blocks(&heap).is_empty());
        assert_eq!(heap.free_total(), 0);

        let ptr = heap.allocate(8).unwrap();
        assert_eq!(ptr.addr(), RESERVED_OFFSET + HEADER_SIZE);
        assert_eq!(heap.store().len(), 8 + PAGE_SIZE);
        heap.validate().unwrap();
    }

    #[test]
    fn test_initialize_empty_store() {
        let mut heap = Heap::new(PagedBuffer::default());
        let ptr = heap.allocate(16).unwrap();
        assert_eq!(ptr.addr(), RESERVED_OFFSET + HEADER_SIZE);
        assert_eq!(blocks(&heap), [(32, PAGE_SIZE - 32 - HEADER_SIZE)]);
        heap.validate().unwrap();
    }

    #[test]
    fn test_payload_is_rounded() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        let ptr = heap.allocate(1).unwrap();
        assert_eq!(ptr.addr(), 16);
        assert_eq!(heap.payload(ptr).len(), 8);

        let ptr = heap.allocate(0).unwrap();
        assert!(heap.payload(ptr).is_empty());
        heap.validate().unwrap();
    }

    #[test]
    fn test_payload_ignores_neighbour_merges() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        let a = heap.allocate(16).unwrap();
        let b = heap.allocate(16).unwrap();
        let c = heap.allocate(16).unwrap();
        heap.payload_mut(b).fill(0x5a);

        unsafe {
            heap.free(Some(a));
            heap.free(Some(c));
        }
        assert_eq!(blocks(&heap), [(8, 16), (56, 192)]);
        assert_eq!(heap.payload(b), [0x5a; 16]);
        assert_eq!(heap.payload_mut(b).len(), 16);
    }

    #[test]
    fn test_grow_when_list_is_empty() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        let first = heap.allocate(240).unwrap();
        assert_eq!(first.addr(), 16);
        assert!(blocks(&heap).is_empty());

        let second = heap.allocate(8).unwrap();
        assert_eq!(second.addr(), 256 + HEADER_SIZE);
        assert_eq!(heap.store().len(), 256 + PAGE_SIZE);
        assert_eq!(blocks(&heap), [(272, PAGE_SIZE - 16 - HEADER_SIZE)]);
        heap.validate().unwrap();
    }

    #[test]
    fn test_grow_merges_with_free_tail() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        let ptr = heap.allocate(1000).unwrap();
        assert_eq!(ptr.addr(), 16);
        assert_eq!(heap.store().len(), 256 + PAGE_SIZE);
        assert_eq!(blocks(&heap), [(1016, 240 + 8 + (PAGE_SIZE - 8) - 1000 - 8)]);
        heap.validate().unwrap();
    }

    #[test]
    fn test_grow_multiple_pages() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        let ptr = heap.allocate(200_000).unwrap();
        assert_eq!(ptr.addr(), 16);
        assert_eq!(heap.store().len(), 256 + 4 * PAGE_SIZE);

        unsafe {
            heap.free(Some(ptr));
        }
        assert_eq!(heap.free_total(), 256 + 4 * PAGE_SIZE - 16);
        heap.validate().unwrap();
    }

    #[test]
    fn test_growth_failure_leaves_heap_untouched() {
        let mut heap = Heap::new(PagedBuffer::with_len(256).with_max_pages(1));
        let ptr = heap.allocate(64).unwrap();
        let before = blocks(&heap);

        let err = heap.try_allocate(1000).unwrap_err();
        assert!(matches!(
            err,
            AllocError::OutOfMemory {
                requested: 1000,
                source: GrowError::PageLimit { .. },
                ..
            }
        ));
        assert!(heap.allocate(1000).is_none());
        assert_eq!(blocks(&heap), before);
        assert_eq!(heap.store().len(), 256);

        unsafe {
            heap.free(Some(ptr));
        }
        assert_eq!(blocks(&heap), [(8, 240)]);
    }

    #[test]
    fn test_growth_failure_on_empty_list() {
        let mut heap = Heap::new(PagedBuffer::with_len(256).with_max_pages(1));
        heap.allocate(240).unwrap();
        assert!(matches!(
            heap.try_allocate(8),
            Err(AllocError::OutOfMemory { requested: 8, .. })
        ));
        assert!(blocks(&heap).is_empty());
    }

    #[test]
    fn test_oversized() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        assert!(matches!(
            heap.try_allocate(usize::MAX),
            Err(AllocError::Oversized { .. })
        ));
        assert!(heap.allocate(usize::cast_from(u32::MAX)).is_none());
        assert_eq!(blocks(&heap), [(8, 240)]);
    }

    #[test]
    fn test_retry_after_growth_is_bounded() {
        let mut heap = Heap::new(StingyStore {
            inner: PagedBuffer::with_len(256),
            grow_calls: 0,
        });

        let err = heap.try_allocate(200_000).unwrap_err();
        assert!(matches!(err, AllocError::NoFit { requested: 200_000, .. }));
        assert_eq!(heap.store().grow_calls, 1);

        // The grown page stays in the heap.
        assert_eq!(blocks(&heap), [(8, 256 + PAGE_SIZE - 16)]);
        heap.validate().unwrap();
    }

    #[test]
    fn test_retry_after_growth_from_empty_list_is_bounded() {
        let mut heap = Heap::new(StingyStore {
            inner: PagedBuffer::with_len(256),
            grow_calls: 0,
        });
        heap.allocate(240).unwrap();
        assert!(blocks(&heap).is_empty());

        let err = heap.try_allocate(200_000).unwrap_err();
        assert!(matches!(err, AllocError::NoFit { requested: 200_000, .. }));
        assert_eq!(heap.store().grow_calls, 2);

        // Both grown pages merged into one block.
        assert_eq!(blocks(&heap), [(256, 2 * PAGE_SIZE - HEADER_SIZE)]);
        heap.validate().unwrap();
    }

    #[test]
    fn test_unaligned_store_length() {
        let mut heap = Heap::new(OddStore::new(100));
        heap.ensure_initialized();
        assert_eq!(blocks(&heap), [(8, 80)]);

        let a = heap.allocate(80).unwrap();
        assert_eq!(a.addr(), 16);
        assert!(blocks(&heap).is_empty());

        // The new region starts at the next aligned offset past the old end.
        let b = heap.allocate(8).unwrap();
        assert_eq!(b.addr(), 112);
        assert_eq!(blocks(&heap), [(120, 65504)]);
        heap.validate().unwrap();

        unsafe {
            heap.free(Some(a));
        }
        assert_eq!(blocks(&heap), [(8, 80), (120, 65504)]);
        heap.validate().unwrap();
    }

    #[test]
    fn test_unaligned_store_split() {
        let mut heap = Heap::new(OddStore::new(100));
        let ptr = heap.allocate(40).unwrap();
        assert_eq!(ptr.addr(), 16);
        assert_eq!(blocks(&heap), [(56, 32)]);
        assert!(heap.allocate(33).is_some());
        heap.validate().unwrap();
    }

    #[test]
    fn test_free_null_is_noop() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        let ptr = heap.allocate(32).unwrap();
        let before = blocks(&heap);

        unsafe {
            heap.free(None);
        }
        assert_eq!(blocks(&heap), before);

        unsafe {
            heap.free(Some(ptr));
        }
        assert_eq!(blocks(&heap), [(8, 240)]);
    }

    #[test]
    fn test_validate_unmerged() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        heap.ensure_initialized();

        // Lay out two adjacent free blocks by hand.
        let mem = DataView::from_mut(heap.store.bytes_mut());
        BlockHeader::new(16, Some(32)).write(mem, 8);
        BlockHeader::new(208, None).write(mem, 32);
        assert!(matches!(
            heap.validate(),
            Err(LayoutError::Unmerged { prev: 8, addr: 32, .. })
        ));
    }

    #[test]
    fn test_validate_unordered() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        heap.ensure_initialized();

        let mem = DataView::from_mut(heap.store.bytes_mut());
        BlockHeader::new(8, Some(8)).write(mem, 8);
        assert!(matches!(
            heap.validate(),
            Err(LayoutError::Unordered { prev: 8, addr: 8, .. })
        ));
    }

    #[test]
    fn test_validate_out_of_bounds() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        heap.ensure_initialized();

        let mem = DataView::from_mut(heap.store.bytes_mut());
        BlockHeader::new(248, None).write(mem, 8);
        assert!(matches!(
            heap.validate(),
            Err(LayoutError::OutOfBounds { addr: 8, .. })
        ));
    }

    #[test]
    fn test_into_store() {
        let mut heap = Heap::new(PagedBuffer::with_len(256));
        let ptr = heap.allocate(8).unwrap();
        heap.payload_mut(ptr).copy_from_slice(b"pageheap");

        let store = heap.into_store();
        assert_eq!(&store.bytes()[16..24], b"pageheap");
    }

    #[test]
    fn test_heap_ptr() {
        assert_eq!(HeapPtr::from_addr(0), None);
        let ptr = HeapPtr::from_addr(0x10).unwrap();
        assert_eq!(ptr.addr(), 0x10);
        assert_eq!(alloc::format!("{ptr}"), "0x10");
    }
}
