//! Backing stores managed by a [`Heap`](crate::Heap).
//!
//! A backing store is a contiguous byte range starting at offset 0 that can be
//! extended by whole pages of [`PAGE_SIZE`] bytes and never shrinks. The heap
//! only ever asks two things of it: how long it is, and to grow.
//!
//! [`PagedBuffer`] is the store used on hosted targets: an owned, 8-byte
//! aligned buffer with an optional page limit.

use alloc::vec::Vec;

use dataview::PodMethods as _;
use snafu::{Snafu, ensure};

/// Growth granularity of a backing store in bytes.
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages a backing store may hold.
///
/// Block headers address the store with 32-bit offsets, which caps it at
/// 4 GiB.
pub const MAX_PAGES: usize = 65536;

/// Errors reported when a backing store cannot grow.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GrowError {
    #[snafu(display(
        "page limit reached: requested_pages={requested_pages}, \
         current_pages={current_pages}, max_pages={max_pages}"
    ))]
    PageLimit {
        requested_pages: usize,
        current_pages: usize,
        max_pages: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display(
        "address space exhausted: requested_pages={requested_pages}, \
         current_pages={current_pages}"
    ))]
    AddressSpace {
        requested_pages: usize,
        current_pages: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}

/// A flat, growable byte range starting at offset 0.
///
/// Implementations must keep [`bytes`](Self::bytes) exactly
/// [`len`](Self::len) bytes long, aligned to 8 bytes, and must preserve
/// existing contents across [`grow`](Self::grow).
///
/// The length need not be a multiple of 8. A [`Heap`](crate::Heap) leaves
/// any trailing bytes past the last multiple of [`ALIGN`](crate::ALIGN)
/// unused.
pub trait BackingStore {
    /// Returns the current length of the store in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no bytes at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extends the store by `pages` pages of [`PAGE_SIZE`] bytes.
    ///
    /// Returns the new total length. On failure the store is left unchanged.
    fn grow(&mut self, pages: usize) -> Result<usize, GrowError>;

    /// Returns the whole store as bytes.
    fn bytes(&self) -> &[u8];

    /// Returns the whole store as mutable bytes.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// An owned backing store that grows by appending zeroed pages.
///
/// The buffer is kept as 64-bit words so that every 8-byte aligned offset is
/// suitably aligned for block headers.
///
/// # Examples
///
/// ```
/// use page_heap::{BackingStore as _, PAGE_SIZE, PagedBuffer};
///
/// let mut store = PagedBuffer::new(1).with_max_pages(2);
/// assert_eq!(store.len(), PAGE_SIZE);
/// assert_eq!(store.grow(1).unwrap(), 2 * PAGE_SIZE);
/// assert!(store.grow(1).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagedBuffer {
    words: Vec<u64>,
    max_pages: Option<usize>,
}

impl PagedBuffer {
    /// Creates a store holding `pages` zeroed pages.
    ///
    /// # Panics
    ///
    /// Panics if `pages` exceeds [`MAX_PAGES`].
    #[must_use]
    pub fn new(pages: usize) -> Self {
        assert!(pages <= MAX_PAGES, "store must not exceed {MAX_PAGES} pages");
        Self::with_len(pages * PAGE_SIZE)
    }

    /// Creates a store holding `len` zeroed bytes.
    ///
    /// The length does not need to be a whole number of pages, which keeps
    /// small test heaps small. Growth still happens in whole pages.
    ///
    /// # Panics
    ///
    /// Panics if `len` is not a multiple of 8 or needs more than
    /// [`MAX_PAGES`] pages.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        assert!(len.is_multiple_of(8), "store length must be a multiple of 8");
        assert!(
            len.div_ceil(PAGE_SIZE) <= MAX_PAGES,
            "store must not exceed {MAX_PAGES} pages"
        );
        let mut words = Vec::new();
        words.resize(len / 8, 0);
        Self {
            words,
            max_pages: None,
        }
    }

    /// Limits the store to `max_pages` pages in total.
    ///
    /// Growth that would exceed the limit fails with
    /// [`GrowError::PageLimit`].
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Returns the page limit, if any.
    #[must_use]
    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Returns the number of pages the store currently spans.
    ///
    /// A trailing partial page counts as a whole one.
    #[must_use]
    pub fn pages(&self) -> usize {
        self.len().div_ceil(PAGE_SIZE)
    }
}

impl BackingStore for PagedBuffer {
    fn len(&self) -> usize {
        self.words.len() * 8
    }

    fn grow(&mut self, pages: usize) -> Result<usize, GrowError> {
        let current_pages = self.pages();
        let total_pages = current_pages.checked_add(pages);

        if let Some(max_pages) = self.max_pages {
            ensure!(
                total_pages.is_some_and(|total| total <= max_pages),
                PageLimitSnafu {
                    requested_pages: pages,
                    current_pages,
                    max_pages,
                }
            );
        }

        let new_len = total_pages
            .filter(|&total| total <= MAX_PAGES)
            .and_then(|_| pages.checked_mul(PAGE_SIZE))
            .and_then(|grown| self.len().checked_add(grown));
        let Some(new_len) = new_len else {
            return AddressSpaceSnafu {
                requested_pages: pages,
                current_pages,
            }
            .fail();
        };

        self.words.resize(new_len / 8, 0);
        Ok(new_len)
    }

    fn bytes(&self) -> &[u8] {
        self.words.as_slice().as_bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.words.as_mut_slice().as_bytes_mut()
    }
}
