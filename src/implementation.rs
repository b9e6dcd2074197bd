use std::borrow::Cow;

use crate::iov_max;
use crate::segment::Segment;
use crate::Error;
use crate::Result;

/// Option struct for [`SegmentIovec::new_with_options`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SegmentIovecOptions {
    /// Maximum number of segments the vector may hold.  Must be in
    /// `1..=iov_max()`; defaults to [`iov_max()`].
    pub max_segments: usize,

    /// Maximum number of descriptors passed to a single vectored
    /// syscall.  Must be in `1..=iov_max()`; defaults to [`iov_max()`].
    pub max_descriptors: usize,

    /// The byte [`SegmentIovec::add_n`] fills fresh segments with.
    pub fill_byte: u8,
}

impl Default for SegmentIovecOptions {
    fn default() -> Self {
        SegmentIovecOptions {
            max_segments: iov_max(),
            max_descriptors: iov_max(),
            fill_byte: b' ',
        }
    }
}

impl SegmentIovecOptions {
    fn validate(&self) -> Result<()> {
        let limit = iov_max();

        if !(1..=limit).contains(&self.max_segments) {
            log::debug!(
                "rejecting max_segments={} (limit {})",
                self.max_segments,
                limit
            );
            return Err(Error::InvalidArgument("max_segments must be in 1..=IOV_MAX"));
        }

        if !(1..=limit).contains(&self.max_descriptors) {
            log::debug!(
                "rejecting max_descriptors={} (limit {})",
                self.max_descriptors,
                limit
            );
            return Err(Error::InvalidArgument(
                "max_descriptors must be in 1..=IOV_MAX",
            ));
        }

        Ok(())
    }
}

/// A [`SegmentIovec`] is an ordered list of owned byte [`Segment`]s,
/// with an exact running count of the bytes they hold.  The segment
/// order is the I/O order.
///
/// The vector never holds more than `max_segments` segments; mutations
/// that would exceed that limit, or that fail to allocate, leave the
/// vector untouched.
///
/// There is no internal locking: each logical stream should own its
/// `SegmentIovec`.  Dropping the vector releases every live segment.
#[derive(Debug)]
pub struct SegmentIovec {
    segments: Vec<Segment>,
    total_bytes: usize, // Sum of `segments[i].len()`
    options: SegmentIovecOptions,
}

impl Default for SegmentIovec {
    fn default() -> Self {
        SegmentIovec {
            segments: Vec::new(),
            total_bytes: 0,
            options: Default::default(),
        }
    }
}

impl SegmentIovec {
    /// Creates an empty vector with the default options.
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates an empty vector with `options`, after validating them.
    pub fn new_with_options(options: SegmentIovecOptions) -> Result<Self> {
        options.validate()?;
        Ok(SegmentIovec {
            options,
            ..Default::default()
        })
    }

    /// Creates an empty vector with room for `nvec` segments.
    ///
    /// Fails with [`Error::CapacityExceeded`] if `nvec` is more than
    /// the vector could ever hold.
    pub fn with_capacity(nvec: usize) -> Result<Self> {
        let mut ret = SegmentIovec::new();
        let limit = ret.options.max_segments;
        if nvec > limit {
            log::debug!("rejecting initial capacity {} (limit {})", nvec, limit);
            return Err(Error::CapacityExceeded { limit });
        }

        ret.segments
            .try_reserve_exact(nvec)
            .map_err(|_| Error::OutOfMemory)?;
        Ok(ret)
    }

    /// Returns the options this vector was created with.
    #[must_use]
    #[inline(always)]
    pub fn options(&self) -> &SegmentIovecOptions {
        &self.options
    }

    /// Makes sure there is room for one more segment, without mutating
    /// anything visible.
    fn reserve_one(&mut self) -> Result<()> {
        let limit = self.options.max_segments;
        if self.segments.len() >= limit {
            log::debug!("rejecting segment #{} (limit {})", limit + 1, limit);
            return Err(Error::CapacityExceeded { limit });
        }

        self.segments
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)
    }

    fn push(&mut self, segment: Segment) -> usize {
        debug_assert!(self.segments.len() < self.options.max_segments);

        let index = self.segments.len();
        self.total_bytes += segment.len();
        self.segments.push(segment);
        index
    }

    /// Appends a copy of `bytes` as a new exact-size segment.
    ///
    /// Returns the new segment's index.
    pub fn add(&mut self, bytes: &[u8]) -> Result<usize> {
        self.reserve_one()?;
        let segment = Segment::copy_from(bytes)?;
        Ok(self.push(segment))
    }

    /// Appends `bytes` as a new segment, without copying: the vector
    /// owns the buffer until the segment is removed.
    ///
    /// On failure, `bytes` is dropped.
    pub fn add_owned(&mut self, bytes: Vec<u8>) -> Result<usize> {
        self.reserve_one()?;
        Ok(self.push(Segment::from_vec(bytes)))
    }

    /// Appends a new segment of `n` bytes, all equal to the configured
    /// fill byte.  This is how callers size destination segments for
    /// [`crate::read_vectored`].
    ///
    /// Returns the new segment's index.
    pub fn add_n(&mut self, n: usize) -> Result<usize> {
        if n < 1 {
            log::debug!("rejecting empty add_n");
            return Err(Error::InvalidArgument("add_n expects at least 1 byte"));
        }

        self.reserve_one()?;
        let segment = Segment::filled(n, self.options.fill_byte)?;
        Ok(self.push(segment))
    }

    /// Replaces the segment at `index` with a copy of `bytes`.
    ///
    /// Returns `Ok(false)` without doing anything if `index` is out of
    /// range: `set` never grows the vector.
    pub fn set(&mut self, index: usize, bytes: &[u8]) -> Result<bool> {
        let Some(slot) = self.segments.get_mut(index) else {
            return Ok(false);
        };

        let segment = Segment::copy_from(bytes)?;
        let old = std::mem::replace(slot, segment);
        self.total_bytes = self.total_bytes - old.len() + bytes.len();
        Ok(true)
    }

    /// Returns the logical contents of the segment at `index`, or
    /// [`None`] if out of range.
    ///
    /// Exact-size segments are borrowed.  Segments that were partially
    /// consumed (capacity > length) are copied, so stale bytes past the
    /// logical length never leak.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Cow<'_, [u8]>> {
        self.segments.get(index).map(Segment::contents)
    }

    /// Removes the segment at `index` and returns its contents, or
    /// [`None`] if out of range.
    ///
    /// This takes constant time: the last segment moves into the
    /// vacated slot, so the order of the remaining segments is *not*
    /// preserved.  Use [`SegmentIovec::remove`] to keep the order.
    pub fn del(&mut self, index: usize) -> Option<Vec<u8>> {
        if index >= self.segments.len() {
            return None;
        }

        let segment = self.segments.swap_remove(index);
        self.total_bytes -= segment.len();
        Some(segment.into_vec())
    }

    /// Removes the segment at `index` and returns its contents, or
    /// [`None`] if out of range.  Later segments shift down by one,
    /// which takes linear time but preserves the I/O order.
    pub fn remove(&mut self, index: usize) -> Option<Vec<u8>> {
        if index >= self.segments.len() {
            return None;
        }

        let segment = self.segments.remove(index);
        self.total_bytes -= segment.len();
        Some(segment.into_vec())
    }

    /// Drops the first `count` bytes of the concatenated contents.
    ///
    /// Fully consumed segments are released, and the first partially
    /// consumed segment is shrunk in place (its capacity is unchanged).
    /// `count == 0` is a no-op, and consuming at least
    /// [`SegmentIovec::byte_count`] bytes empties the vector.
    ///
    /// Returns the updated byte count.
    pub fn consume(&mut self, count: usize) -> usize {
        if count == 0 {
            return self.total_bytes;
        }

        if count >= self.total_bytes {
            self.clear();
            return 0;
        }

        self.total_bytes -= count;

        let mut remaining = count;
        let mut head = 0;
        for segment in &mut self.segments {
            if remaining == 0 {
                break;
            }

            if segment.len() > remaining {
                segment.consume_front(remaining);
                break;
            }

            remaining -= segment.len();
            head += 1;
        }

        // Releases the fully consumed prefix and shifts the rest down.
        self.segments.drain(..head);
        self.total_bytes
    }

    /// Releases every segment.  The options are kept.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.total_bytes = 0;
    }

    /// Returns a copy of the concatenated contents of all segments.
    #[must_use]
    pub fn concat(&self) -> Vec<u8> {
        self.concat_range(0, self.total_bytes)
    }

    /// Returns a copy of the logical byte range `[offset, offset + len)`.
    ///
    /// The range is clamped to the vector's contents; an empty clamped
    /// range yields an empty result.
    #[must_use]
    pub fn concat_range(&self, offset: usize, len: usize) -> Vec<u8> {
        let offset = offset.min(self.total_bytes);
        let len = len.min(self.total_bytes - offset);
        let mut ret = Vec::with_capacity(len);

        let mut skip = offset;
        for segment in &self.segments {
            if ret.len() == len {
                break;
            }

            let bytes = segment.as_slice();
            if skip >= bytes.len() {
                skip -= bytes.len();
                continue;
            }

            let bytes = &bytes[skip..];
            skip = 0;
            let wanted = bytes.len().min(len - ret.len());
            ret.extend_from_slice(&bytes[..wanted]);
        }

        debug_assert_eq!(ret.len(), len);
        ret
    }

    /// Returns the total number of logical bytes in all segments.
    #[must_use]
    #[inline(always)]
    pub fn byte_count(&self) -> usize {
        self.total_bytes
    }

    /// Returns the number of segments.
    #[must_use]
    #[inline(always)]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Same as [`SegmentIovec::segment_count`].
    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.segment_count()
    }

    /// Determines whether the vector holds 0 segments.
    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the logical length of the segment at `index`.
    #[must_use]
    pub fn segment_len(&self, index: usize) -> Option<usize> {
        self.segments.get(index).map(Segment::len)
    }

    /// Returns the allocated size of the segment at `index`.
    #[must_use]
    pub fn segment_capacity(&self, index: usize) -> Option<usize> {
        self.segments.get(index).map(Segment::capacity)
    }

    /// Iterates over the logical contents of each segment, in order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.segments.iter().map(Segment::as_slice)
    }

    #[inline(always)]
    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[inline(always)]
    pub(crate) fn segments_mut(&mut self) -> &mut [Segment] {
        &mut self.segments
    }

    /// Recomputes the byte count from scratch.
    #[cfg(test)]
    fn check_invariants(&self) {
        let sum: usize = self.iter().map(<[u8]>::len).sum();
        assert_eq!(sum, self.byte_count());
        assert!(self.segment_count() <= self.options.max_segments);
        for segment in &self.segments {
            assert!(segment.len() <= segment.capacity());
        }
    }
}

#[cfg(test)]
fn abc_iovec() -> SegmentIovec {
    let mut iovec = SegmentIovec::new();
    assert_eq!(iovec.add(b"ab").unwrap(), 0);
    assert_eq!(iovec.add(b"cde").unwrap(), 1);
    assert_eq!(iovec.add(b"f").unwrap(), 2);
    iovec
}

#[test]
fn test_add_miri() {
    let iovec = abc_iovec();

    assert_eq!(iovec.byte_count(), 6);
    assert_eq!(iovec.segment_count(), 3);
    assert_eq!(iovec.len(), 3);
    assert_eq!(iovec.concat(), b"abcdef");
    assert_eq!(iovec.segment_capacity(1), Some(3));
    assert_eq!(iovec.segment_len(1), Some(3));
    assert_eq!(iovec.segment_len(3), None);
    iovec.check_invariants();
}

#[test]
fn test_add_empty_segment_miri() {
    let mut iovec = SegmentIovec::new();

    assert_eq!(iovec.add(b"").unwrap(), 0);
    assert_eq!(iovec.segment_count(), 1);
    assert_eq!(iovec.byte_count(), 0);
    assert_eq!(iovec.get(0).unwrap(), &b""[..]);
    assert_eq!(iovec.concat(), b"");
}

#[test]
fn test_add_owned_miri() {
    let mut iovec = SegmentIovec::new();
    let mut buf = Vec::with_capacity(16);
    buf.extend_from_slice(b"hello");

    assert_eq!(iovec.add_owned(buf).unwrap(), 0);
    assert_eq!(iovec.byte_count(), 5);
    assert_eq!(iovec.segment_capacity(0), Some(5));
    assert!(matches!(iovec.get(0), Some(Cow::Borrowed(b"hello"))));
}

#[test]
fn test_add_n_miri() {
    let mut iovec = SegmentIovec::new();

    assert_eq!(iovec.add_n(3).unwrap(), 0);
    assert_eq!(iovec.concat(), b"   ");
    assert_eq!(iovec.segment_capacity(0), Some(3));

    assert_eq!(iovec.add_n(0), Err(Error::InvalidArgument("add_n expects at least 1 byte")));
    assert_eq!(iovec.segment_count(), 1);
    assert_eq!(iovec.byte_count(), 3);
}

#[test]
fn test_fill_byte_option_miri() {
    let mut iovec = SegmentIovec::new_with_options(SegmentIovecOptions {
        fill_byte: 0,
        ..Default::default()
    })
    .unwrap();

    iovec.add_n(2).unwrap();
    assert_eq!(iovec.concat(), b"\0\0");
}

#[test]
fn test_invalid_options_miri() {
    let zero = SegmentIovecOptions {
        max_segments: 0,
        ..Default::default()
    };
    assert!(matches!(
        SegmentIovec::new_with_options(zero),
        Err(Error::InvalidArgument(_))
    ));

    let too_many = SegmentIovecOptions {
        max_descriptors: iov_max() + 1,
        ..Default::default()
    };
    assert!(matches!(
        SegmentIovec::new_with_options(too_many),
        Err(Error::InvalidArgument(_))
    ));
}

// Hitting the segment limit must leave the vector byte-for-byte unchanged.
#[test]
fn test_capacity_exceeded_miri() {
    let mut iovec = SegmentIovec::new_with_options(SegmentIovecOptions {
        max_segments: 2,
        ..Default::default()
    })
    .unwrap();

    iovec.add(b"12").unwrap();
    iovec.add_n(1).unwrap();

    assert_eq!(iovec.add(b"3"), Err(Error::CapacityExceeded { limit: 2 }));
    assert_eq!(iovec.add_n(4), Err(Error::CapacityExceeded { limit: 2 }));
    assert_eq!(
        iovec.add_owned(b"5".to_vec()),
        Err(Error::CapacityExceeded { limit: 2 })
    );

    assert_eq!(iovec.segment_count(), 2);
    assert_eq!(iovec.byte_count(), 3);
    assert_eq!(iovec.concat(), b"12 ");
    iovec.check_invariants();

    // Room again after a delete.
    iovec.del(0).unwrap();
    assert_eq!(iovec.add(b"3").unwrap(), 1);
}

#[test]
fn test_default_limit_miri() {
    let mut iovec = SegmentIovec::new();
    let limit = iovec.options().max_segments;
    assert_eq!(limit, iov_max());

    for i in 0..limit {
        assert_eq!(iovec.add(b"x").unwrap(), i);
    }

    assert_eq!(iovec.add(b"y"), Err(Error::CapacityExceeded { limit }));
    assert_eq!(iovec.segment_count(), limit);
    assert_eq!(iovec.byte_count(), limit);
}

#[test]
fn test_with_capacity_miri() {
    let iovec = SegmentIovec::with_capacity(8).unwrap();
    assert!(iovec.is_empty());

    assert!(SegmentIovec::with_capacity(iov_max()).is_ok());
    assert_eq!(
        SegmentIovec::with_capacity(iov_max() + 1).unwrap_err(),
        Error::CapacityExceeded { limit: iov_max() }
    );
}

#[test]
fn test_set_get_miri() {
    let mut iovec = abc_iovec();

    assert_eq!(iovec.set(1, b"XYZW"), Ok(true));
    assert_eq!(iovec.get(1).unwrap(), &b"XYZW"[..]);
    assert_eq!(iovec.byte_count(), 7);
    assert_eq!(iovec.concat(), b"abXYZWf");

    assert_eq!(iovec.set(0, b""), Ok(true));
    assert_eq!(iovec.byte_count(), 5);
    assert_eq!(iovec.get(0).unwrap(), &b""[..]);

    // Out of range: no growth, no error.
    assert_eq!(iovec.set(3, b"nope"), Ok(false));
    assert_eq!(iovec.segment_count(), 3);
    assert_eq!(iovec.byte_count(), 5);
    assert!(iovec.get(3).is_none());
    iovec.check_invariants();
}

// `get` borrows exact-size segments and copies partially consumed ones.
#[test]
fn test_get_zero_copy_policy_miri() {
    let mut iovec = abc_iovec();

    assert!(matches!(iovec.get(0), Some(Cow::Borrowed(b"ab"))));
    assert!(matches!(iovec.get(1), Some(Cow::Borrowed(b"cde"))));

    iovec.consume(3);
    // "cde" became "de", with 3 bytes of storage.
    assert_eq!(iovec.segment_len(0), Some(2));
    assert_eq!(iovec.segment_capacity(0), Some(3));

    let got = iovec.get(0).unwrap();
    assert!(matches!(got, Cow::Owned(_)));
    assert_eq!(got, &b"de"[..]);

    // `set` restores an exact-size segment.
    iovec.set(0, b"de").unwrap();
    assert!(matches!(iovec.get(0), Some(Cow::Borrowed(b"de"))));
}

// `del` swaps the last segment into the hole.
#[test]
fn test_del_swaps_last_miri() {
    let mut iovec = SegmentIovec::new();
    for chunk in [&b"0"[..], b"11", b"222", b"3333"] {
        iovec.add(chunk).unwrap();
    }

    assert_eq!(iovec.del(1).unwrap(), b"11");
    assert_eq!(iovec.segment_count(), 3);
    assert_eq!(iovec.byte_count(), 8);
    // Slot 1 holds the former last segment, not the former slot 2.
    assert_eq!(iovec.get(1).unwrap(), &b"3333"[..]);
    assert_eq!(iovec.concat(), b"03333222");

    // Deleting the last segment doesn't move anything.
    assert_eq!(iovec.del(2).unwrap(), b"222");
    assert_eq!(iovec.concat(), b"03333");

    assert!(iovec.del(2).is_none());
    assert_eq!(iovec.segment_count(), 2);

    assert_eq!(iovec.del(0).unwrap(), b"0");
    assert_eq!(iovec.del(0).unwrap(), b"3333");
    assert!(iovec.is_empty());
    assert_eq!(iovec.byte_count(), 0);
}

#[test]
fn test_remove_keeps_order_miri() {
    let mut iovec = SegmentIovec::new();
    for chunk in [&b"0"[..], b"11", b"222", b"3333"] {
        iovec.add(chunk).unwrap();
    }

    assert_eq!(iovec.remove(1).unwrap(), b"11");
    assert_eq!(iovec.concat(), b"02223333");
    assert_eq!(iovec.get(1).unwrap(), &b"222"[..]);
    assert!(iovec.remove(3).is_none());
    iovec.check_invariants();
}

// `del` returns only the logical bytes of a shrunk segment.
#[test]
fn test_del_after_consume_miri() {
    let mut iovec = abc_iovec();

    iovec.consume(1);
    assert_eq!(iovec.del(0).unwrap(), b"b");
    assert_eq!(iovec.byte_count(), 4);
}

#[test]
fn test_consume_worked_example_miri() {
    let mut iovec = abc_iovec();

    assert_eq!(iovec.consume(4), 2);
    assert_eq!(iovec.byte_count(), 2);
    assert_eq!(iovec.segment_count(), 2);
    assert_eq!(iovec.concat(), b"ef");
    iovec.check_invariants();
}

#[test]
fn test_consume_zero_miri() {
    let mut iovec = abc_iovec();

    assert_eq!(iovec.consume(0), 6);
    assert_eq!(iovec.segment_count(), 3);
    assert_eq!(iovec.concat(), b"abcdef");
    assert!(matches!(iovec.get(0), Some(Cow::Borrowed(_))));
}

#[test]
fn test_consume_everything_miri() {
    let mut iovec = abc_iovec();
    assert_eq!(iovec.consume(6), 0);
    assert!(iovec.is_empty());
    assert_eq!(iovec.byte_count(), 0);

    let mut iovec = abc_iovec();
    assert_eq!(iovec.consume(100), 0);
    assert_eq!(iovec.segment_count(), 0);
    assert_eq!(iovec.concat(), b"");

    // Consuming an empty vector is fine.
    assert_eq!(iovec.consume(1), 0);
}

// Consuming exactly up to a segment boundary releases whole segments.
#[test]
fn test_consume_boundary_miri() {
    let mut iovec = abc_iovec();

    assert_eq!(iovec.consume(5), 1);
    assert_eq!(iovec.segment_count(), 1);
    assert!(matches!(iovec.get(0), Some(Cow::Borrowed(b"f"))));
}

// Every prefix consume leaves the matching suffix.
#[test]
fn test_consume_every_prefix_miri() {
    let chunks: [&[u8]; 5] = [b"a", b"", b"bcd", b"efgh", b"ij"];
    let mut reference = Vec::new();
    for chunk in chunks {
        reference.extend_from_slice(chunk);
    }

    for k in 0..=reference.len() {
        let mut iovec = SegmentIovec::new();
        for chunk in chunks {
            iovec.add(chunk).unwrap();
        }

        assert_eq!(iovec.consume(k), reference.len() - k);
        assert_eq!(iovec.concat(), &reference[k..]);
        iovec.check_invariants();
    }
}

#[test]
fn test_consume_repeatedly_miri() {
    let mut iovec = abc_iovec();

    assert_eq!(iovec.consume(1), 5);
    assert_eq!(iovec.consume(2), 3);
    assert_eq!(iovec.concat(), b"def");
    assert_eq!(iovec.segment_count(), 2);
    assert_eq!(iovec.consume(1), 2);
    assert_eq!(iovec.concat(), b"ef");
    iovec.check_invariants();
}

#[test]
fn test_concat_range_miri() {
    let iovec = abc_iovec();

    assert_eq!(iovec.concat_range(0, 6), b"abcdef");
    assert_eq!(iovec.concat_range(1, 3), b"bcd");
    assert_eq!(iovec.concat_range(2, 3), b"cde");
    assert_eq!(iovec.concat_range(4, 100), b"ef");
    assert_eq!(iovec.concat_range(5, 1), b"f");
    assert_eq!(iovec.concat_range(6, 1), b"");
    assert_eq!(iovec.concat_range(100, 1), b"");
    assert_eq!(iovec.concat_range(3, 0), b"");

    // Doesn't mutate.
    assert_eq!(iovec.byte_count(), 6);
    assert_eq!(iovec.concat(), b"abcdef");
}

#[test]
fn test_concat_mixed_paths_miri() {
    let mut iovec = SegmentIovec::new();
    iovec.add(b"xxhello").unwrap();
    iovec.add(b" ").unwrap();
    iovec.add(b"world").unwrap();
    iovec.consume(2);

    // The first segment takes the copy path, the others don't.
    assert!(matches!(iovec.get(0), Some(Cow::Owned(_))));
    assert!(matches!(iovec.get(2), Some(Cow::Borrowed(_))));

    let pieces: Vec<u8> = (0..iovec.segment_count())
        .flat_map(|i| iovec.get(i).unwrap().into_owned())
        .collect();
    assert_eq!(iovec.concat(), pieces);
    assert_eq!(iovec.concat(), b"hello world");
    assert_eq!(iovec.iter().collect::<Vec<_>>(), [&b"hello"[..], b" ", b"world"]);
}

// A mixed sequence of operations keeps the byte count exact.
#[test]
fn test_mixed_operations_miri() {
    let mut iovec = SegmentIovec::new();
    let mut reference: Vec<Vec<u8>> = Vec::new();

    for i in 0..40usize {
        let bytes = vec![b'a' + (i % 26) as u8; i % 7];
        match i % 5 {
            0 | 1 => {
                iovec.add(&bytes).unwrap();
                reference.push(bytes);
            }
            2 => {
                iovec.add_n(i % 3 + 1).unwrap();
                reference.push(vec![b' '; i % 3 + 1]);
            }
            3 => {
                let index = i % (reference.len() + 1);
                let replaced = iovec.set(index, &bytes).unwrap();
                assert_eq!(replaced, index < reference.len());
                if replaced {
                    reference[index] = bytes;
                }
            }
            _ => {
                let index = i % (reference.len() + 1);
                let removed = iovec.del(index);
                if index < reference.len() {
                    assert_eq!(removed.unwrap(), reference.swap_remove(index));
                } else {
                    assert!(removed.is_none());
                }
            }
        }

        iovec.check_invariants();
        assert_eq!(iovec.concat(), reference.concat());
    }

    let total = iovec.byte_count();
    let expected = reference.concat();
    assert_eq!(iovec.consume(total / 2), total - total / 2);
    assert_eq!(iovec.concat(), &expected[total / 2..]);
    iovec.check_invariants();
}

#[cfg(test)]
rusty_fork_test! {
    // Segments are released exactly once, on `del`, on full consume,
    // on `clear`, and on drop; never on a partial consume.
    #[test]
    fn test_release_accounting() {
        let mut iovec = abc_iovec();
        iovec.add_n(4).unwrap();
        assert_eq!(Segment::num_live(), 4);
        assert_eq!(Segment::num_live_bytes(), 10);

        assert_eq!(iovec.del(3).unwrap(), b"    ");
        assert_eq!(Segment::num_live(), 3);

        iovec.set(2, b"fg").unwrap();
        assert_eq!(Segment::num_live(), 3);
        assert_eq!(Segment::num_live_bytes(), 7);

        // "ab" goes away, "cde" shrinks in place.
        iovec.consume(3);
        assert_eq!(Segment::num_live(), 2);
        assert_eq!(Segment::num_live_bytes(), 5);

        iovec.clear();
        assert_eq!(Segment::num_live(), 0);
        assert_eq!(Segment::num_live_bytes(), 0);

        iovec.add(b"xyz").unwrap();
        let failed = SegmentIovec::with_capacity(iov_max() + 1);
        assert!(failed.is_err());
        std::mem::drop(iovec);
        assert_eq!(Segment::num_live(), 0);
        assert_eq!(Segment::num_live_bytes(), 0);
    }
}
