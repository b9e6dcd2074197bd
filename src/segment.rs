//! A [`Segment`] is one owned byte buffer in a [`crate::SegmentIovec`].
//!
//! Each segment has a *capacity* (the size of its backing allocation)
//! and a logical *length* (the prefix of that allocation that holds
//! valid bytes).  The two only diverge after a partial consume shrinks
//! the segment in place.
//!
//! Live segments are counted process-wide; a segment stops counting
//! when it is dropped or when its storage is handed back to the caller,
//! so each backing allocation is released exactly once.
use std::borrow::Cow;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::Result;

static NUM_LIVE_SEGMENTS: AtomicUsize = AtomicUsize::new(0);
static NUM_LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);

/// Conceptually, a [`Segment`] is a `Box<[u8]>` with a logical length
/// that may be shorter than the allocation.
#[derive(Debug)]
pub struct Segment {
    storage: Box<[u8]>,
    len: usize, // Always <= storage.len()
}

/// Allocates exactly `len` bytes, or fails with [`Error::OutOfMemory`]
/// instead of aborting.
fn try_alloc(len: usize) -> Result<Vec<u8>> {
    let mut ret = Vec::new();
    ret.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    Ok(ret)
}

impl Segment {
    fn from_storage(storage: Box<[u8]>) -> Segment {
        NUM_LIVE_SEGMENTS.fetch_add(1, Ordering::Relaxed);
        NUM_LIVE_BYTES.fetch_add(storage.len(), Ordering::Relaxed);

        let len = storage.len();
        Segment { storage, len }
    }

    /// Creates an exact-size segment with a copy of `bytes`.
    pub fn copy_from(bytes: &[u8]) -> Result<Segment> {
        let mut storage = try_alloc(bytes.len())?;
        storage.extend_from_slice(bytes);
        Ok(Segment::from_storage(storage.into_boxed_slice()))
    }

    /// Creates an exact-size segment of `len` copies of `fill`.
    pub fn filled(len: usize, fill: u8) -> Result<Segment> {
        let mut storage = try_alloc(len)?;
        storage.resize(len, fill);
        Ok(Segment::from_storage(storage.into_boxed_slice()))
    }

    /// Takes ownership of `bytes` without copying them.
    ///
    /// The segment's capacity is the vector's length: any spare
    /// capacity in `bytes` is dropped when converting to a boxed slice.
    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Segment {
        Segment::from_storage(bytes.into_boxed_slice())
    }

    /// Returns the process-wide number of live segments.
    #[must_use]
    pub fn num_live() -> usize {
        NUM_LIVE_SEGMENTS.load(Ordering::Relaxed)
    }

    /// Returns the process-wide number of bytes allocated for live segments.
    #[must_use]
    pub fn num_live_bytes() -> usize {
        NUM_LIVE_BYTES.load(Ordering::Relaxed)
    }

    /// Returns the number of logically valid bytes.
    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the size of the backing allocation.
    #[must_use]
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the logically valid bytes.
    #[must_use]
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Returns the logically valid bytes, mutably.  Vectored reads fill
    /// segments through this view.
    #[must_use]
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[..self.len]
    }

    /// Returns the segment's contents, borrowed when the storage
    /// is exactly the logical contents, and copied otherwise.
    ///
    /// After [`Segment::consume_front`], the storage holds stale bytes
    /// past the logical length; handing out the storage itself would
    /// expose them, so we copy the valid prefix instead.
    #[must_use]
    pub fn contents(&self) -> Cow<'_, [u8]> {
        if self.capacity() == self.len {
            Cow::Borrowed(&self.storage)
        } else {
            Cow::Owned(self.as_slice().to_vec())
        }
    }

    /// Drops the first `count` logical bytes: the suffix is shifted to
    /// the front of the storage, and the capacity does not change.
    ///
    /// Panics if `count` is not less than the segment's length; fully
    /// consumed segments must be released instead.
    pub fn consume_front(&mut self, count: usize) {
        assert!(count < self.len, "consume_front must leave bytes behind");

        self.storage.copy_within(count..self.len, 0);
        self.len -= count;
    }

    /// Releases the segment and returns its logical contents, without
    /// copying.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        let storage = std::mem::take(&mut self.storage);
        NUM_LIVE_BYTES.fetch_sub(storage.len(), Ordering::Relaxed);

        let mut ret = storage.into_vec();
        ret.truncate(self.len);
        self.len = 0;
        ret
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        NUM_LIVE_SEGMENTS.fetch_sub(1, Ordering::Relaxed);
        NUM_LIVE_BYTES.fetch_sub(self.storage.len(), Ordering::Relaxed);
    }
}

#[test]
fn test_exact_size_miri() {
    let segment = Segment::copy_from(b"abc").expect("should allocate");

    assert_eq!(segment.len(), 3);
    assert_eq!(segment.capacity(), 3);
    assert_eq!(segment.as_slice(), b"abc");
    assert!(matches!(segment.contents(), Cow::Borrowed(b"abc")));
}

#[test]
fn test_filled_miri() {
    let segment = Segment::filled(4, b' ').expect("should allocate");

    assert_eq!(segment.len(), 4);
    assert_eq!(segment.capacity(), 4);
    assert_eq!(segment.as_slice(), b"    ");

    let empty = Segment::filled(0, b' ').expect("should allocate");
    assert!(empty.is_empty());
    assert!(matches!(empty.contents(), Cow::Borrowed(b"")));
}

// A partial consume keeps the allocation, so `contents` must copy.
#[test]
fn test_consume_front_flips_to_copy_miri() {
    let mut segment = Segment::copy_from(b"abcdef").expect("should allocate");

    segment.consume_front(4);
    assert_eq!(segment.len(), 2);
    assert_eq!(segment.capacity(), 6);
    assert_eq!(segment.as_slice(), b"ef");

    let contents = segment.contents();
    assert!(matches!(contents, Cow::Owned(_)));
    assert_eq!(&*contents, b"ef");
}

#[test]
#[should_panic(expected = "consume_front must leave bytes behind")]
fn test_consume_front_everything_miri() {
    let mut segment = Segment::copy_from(b"ab").expect("should allocate");
    segment.consume_front(2);
}

#[test]
fn test_into_vec_miri() {
    let mut segment = Segment::from_vec(b"0123".to_vec());
    segment.consume_front(1);

    assert_eq!(segment.into_vec(), b"123");
}

#[test]
fn test_mut_slice_miri() {
    let mut segment = Segment::filled(3, 0).expect("should allocate");
    segment.as_mut_slice().copy_from_slice(b"xyz");

    assert_eq!(segment.as_slice(), b"xyz");
}

#[cfg(test)]
rusty_fork_test! {
    // Each segment counts once, and stops counting exactly once.
    #[test]
    fn test_live_accounting() {
        assert_eq!(Segment::num_live(), 0);
        assert_eq!(Segment::num_live_bytes(), 0);

        let first = Segment::copy_from(b"abc").expect("should allocate");
        let mut second = Segment::filled(5, b' ').expect("should allocate");
        assert_eq!(Segment::num_live(), 2);
        assert_eq!(Segment::num_live_bytes(), 8);

        // Partial consume keeps the allocation live.
        second.consume_front(3);
        assert_eq!(Segment::num_live(), 2);
        assert_eq!(Segment::num_live_bytes(), 8);

        assert_eq!(first.into_vec(), b"abc");
        assert_eq!(Segment::num_live(), 1);
        assert_eq!(Segment::num_live_bytes(), 5);

        std::mem::drop(second);
        assert_eq!(Segment::num_live(), 0);
        assert_eq!(Segment::num_live_bytes(), 0);
    }
}
