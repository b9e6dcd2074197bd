//! The `vectored_io` module maps a logical byte range of a
//! [`SegmentIovec`] onto a bounded descriptor list, and performs
//! *one* `writev`/`readv` attempt over that list.
//!
//! Neither direction loops: partial transfers, [`WriteOutcome::Retry`]
//! and [`WriteOutcome::Closed`] are handed back to the caller, who
//! decides whether to poll, consume or stop.
use std::io::IoSlice;
use std::io::IoSliceMut;
use std::ops::Range;
use std::os::fd::AsFd;

use nix::errno::Errno;
use smallvec::SmallVec;

use crate::Error;
use crate::Result;
use crate::SegmentIovec;

/// Descriptor lists this short stay on the stack.
const INLINE_DESCRIPTORS: usize = 16;

/// The segment index and in-segment byte range for each descriptor.
type Plan = SmallVec<[(usize, Range<usize>); INLINE_DESCRIPTORS]>;

/// A [`Descriptors`] is the (pointer, length) list for one vectored
/// syscall, borrowed from a [`SegmentIovec`].
#[derive(Debug, Default)]
pub struct Descriptors<'a> {
    slices: SmallVec<[IoSlice<'a>; INLINE_DESCRIPTORS]>,
    covered: usize,
}

impl<'a> Descriptors<'a> {
    /// Returns the descriptors, in I/O order.
    #[must_use]
    #[inline(always)]
    pub fn as_slices(&self) -> &[IoSlice<'a>] {
        &self.slices
    }

    /// Returns the number of descriptors.
    #[must_use]
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    #[must_use]
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Returns the number of bytes the descriptors actually cover.
    ///
    /// This may be less than requested, when the vector is shorter or
    /// when we hit the descriptor limit.
    #[must_use]
    #[inline(always)]
    pub fn covered(&self) -> usize {
        self.covered
    }
}

/// Result of a single [`write_vectored`] attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub enum WriteOutcome {
    /// The syscall accepted `written` bytes.  `incomplete` is true iff
    /// that's fewer than the descriptors covered.
    Written { written: usize, incomplete: bool },
    /// Would-block or interrupted: nothing was written, try again later.
    Retry,
    /// The peer shut down (broken pipe or connection reset).
    Closed,
}

/// Result of a single [`read_vectored`] attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub enum ReadOutcome {
    /// The syscall read that many bytes, at the front of the range.
    Read(usize),
    /// Would-block or interrupted: nothing was read, try again later.
    Retry,
    /// The peer ended the stream (zero-byte read).
    Closed,
}

#[inline(always)]
fn is_transient(errno: Errno) -> bool {
    errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK || errno == Errno::EINTR
}

/// Walks `segment_lens`, skips `offset` bytes, and finds the in-segment
/// ranges that cover up to `len` bytes with at most `max_descriptors`
/// ranges.  Empty ranges never make it in the plan.
///
/// Returns the plan and the number of bytes it covers.
fn plan_descriptors(
    segment_lens: impl IntoIterator<Item = usize>,
    offset: usize,
    len: usize,
    max_descriptors: usize,
) -> (Plan, usize) {
    let mut plan = Plan::new();
    let mut skip = offset;
    let mut covered = 0;

    for (index, segment_len) in segment_lens.into_iter().enumerate() {
        if covered == len || plan.len() == max_descriptors {
            break;
        }

        if skip >= segment_len {
            skip -= segment_len;
            continue;
        }

        let begin = skip;
        skip = 0;
        let end = begin + (segment_len - begin).min(len - covered);
        covered += end - begin;
        plan.push((index, begin..end));
    }

    (plan, covered)
}

/// Builds the descriptors for the logical range `[offset, offset + len)`
/// of `iovec`, with at most `max_descriptors` (see
/// [`crate::SegmentIovecOptions`]) entries.
///
/// Callers must check [`Descriptors::covered`]: when the vector is
/// shorter than the range, or the descriptor limit is hit, the
/// descriptors cover less than `len` bytes.
#[must_use]
pub fn build_descriptors(iovec: &SegmentIovec, offset: usize, len: usize) -> Descriptors<'_> {
    let segments = iovec.segments();
    let (plan, covered) = plan_descriptors(
        segments.iter().map(|segment| segment.len()),
        offset,
        len,
        iovec.options().max_descriptors,
    );

    let slices = plan
        .into_iter()
        .map(|(index, range)| IoSlice::new(&segments[index].as_slice()[range]))
        .collect();
    Descriptors { slices, covered }
}

/// Same as [`build_descriptors`], but the descriptors point into the
/// segments' storage for writing.
fn build_descriptors_mut(
    iovec: &mut SegmentIovec,
    offset: usize,
    len: usize,
) -> (SmallVec<[IoSliceMut<'_>; INLINE_DESCRIPTORS]>, usize) {
    let (plan, covered) = plan_descriptors(
        iovec.segments().iter().map(|segment| segment.len()),
        offset,
        len,
        iovec.options().max_descriptors,
    );

    let mut slices = SmallVec::new();
    // The plan's indices are strictly increasing, so a single pass over
    // the segments hands out disjoint mutable borrows.
    let mut segments = iovec.segments_mut().iter_mut().enumerate();
    for (index, range) in plan {
        let Some((_, segment)) = segments.by_ref().find(|(i, _)| *i == index) else {
            break;
        };

        slices.push(IoSliceMut::new(&mut segment.as_mut_slice()[range]));
    }

    (slices, covered)
}

/// Attempts to write the logical range `[offset, offset + len)` of
/// `iovec` to `fd`, with a single `writev` call.
///
/// When the range is empty (e.g., `offset` is past the end), we still
/// issue the syscall, with one zero-length descriptor.
///
/// The vector is never mutated: once bytes are confirmed sent, the
/// caller must [`SegmentIovec::consume`] them.  Would-block and EINTR
/// are [`WriteOutcome::Retry`], EPIPE and ECONNRESET are
/// [`WriteOutcome::Closed`], and any other failure is an
/// [`Error::System`].
pub fn write_vectored(
    fd: impl AsFd,
    iovec: &SegmentIovec,
    offset: usize,
    len: usize,
) -> Result<WriteOutcome> {
    let descriptors = build_descriptors(iovec, offset, len);
    let covered = descriptors.covered();

    let result = if descriptors.is_empty() {
        nix::sys::uio::writev(fd, &[IoSlice::new(&[])])
    } else {
        nix::sys::uio::writev(fd, descriptors.as_slices())
    };

    match result {
        Ok(written) => {
            let incomplete = written < covered;
            log::trace!(
                "writev: {} of {} bytes over {} descriptors (offset {})",
                written,
                covered,
                descriptors.len(),
                offset
            );
            Ok(WriteOutcome::Written {
                written,
                incomplete,
            })
        }
        Err(errno) => classify_write_failure(errno),
    }
}

/// Maps a failed `writev` to its outcome: would-block and EINTR are
/// retried, a peer that went away (EPIPE, ECONNRESET) is closed.
fn classify_write_failure(errno: Errno) -> Result<WriteOutcome> {
    match errno {
        errno if is_transient(errno) => {
            log::trace!("writev: transient failure {}", errno);
            Ok(WriteOutcome::Retry)
        }
        Errno::EPIPE | Errno::ECONNRESET => {
            log::trace!("writev: peer closed ({})", errno);
            Ok(WriteOutcome::Closed)
        }
        errno => {
            log::debug!("writev failed: {}", errno);
            Err(Error::System(errno))
        }
    }
}

/// Attempts to fill the logical range `[offset, offset + len)` of
/// `iovec` from `fd`, with a single `readv` call.
///
/// The engine only reads into existing segments (see
/// [`SegmentIovec::add_n`]), and never adjusts their lengths: after a
/// short read, the caller knows which tail bytes weren't filled and
/// must trim them itself.
///
/// Fails with [`Error::InvalidArgument`], without any syscall, when the
/// range covers no byte: a zero-byte read would look like end of stream.
pub fn read_vectored(
    fd: impl AsFd,
    iovec: &mut SegmentIovec,
    offset: usize,
    len: usize,
) -> Result<ReadOutcome> {
    let (mut descriptors, covered) = build_descriptors_mut(iovec, offset, len);

    if covered == 0 {
        log::debug!("readv: no destination bytes at offset {}", offset);
        return Err(Error::InvalidArgument("read range covers no segment bytes"));
    }

    match nix::sys::uio::readv(fd, &mut descriptors) {
        Ok(0) => {
            log::trace!("readv: end of stream");
            Ok(ReadOutcome::Closed)
        }
        Ok(read) => {
            log::trace!(
                "readv: {} of {} bytes over {} descriptors (offset {})",
                read,
                covered,
                descriptors.len(),
                offset
            );
            Ok(ReadOutcome::Read(read))
        }
        Err(errno) if is_transient(errno) => {
            log::trace!("readv: transient failure {}", errno);
            Ok(ReadOutcome::Retry)
        }
        Err(errno) => {
            log::debug!("readv failed: {}", errno);
            Err(Error::System(errno))
        }
    }
}

#[cfg(test)]
use crate::SegmentIovecOptions;

#[cfg(test)]
fn iovec_from(chunks: &[&[u8]], max_descriptors: usize) -> SegmentIovec {
    let mut iovec = SegmentIovec::new_with_options(SegmentIovecOptions {
        max_descriptors,
        ..Default::default()
    })
    .expect("valid options");

    for chunk in chunks {
        iovec.add(chunk).expect("should fit");
    }

    iovec
}

#[cfg(test)]
fn flatten(descriptors: &Descriptors<'_>) -> Vec<u8> {
    let mut ret = Vec::new();
    for slice in descriptors.as_slices() {
        ret.extend_from_slice(slice);
    }

    ret
}

#[test]
fn test_plan_miri() {
    let (plan, covered) = plan_descriptors([2, 3, 1], 0, 6, 10);
    assert_eq!(plan.as_slice(), &[(0, 0..2), (1, 0..3), (2, 0..1)]);
    assert_eq!(covered, 6);

    // Skip into the middle, stop in the middle.
    let (plan, covered) = plan_descriptors([2, 3, 1], 1, 3, 10);
    assert_eq!(plan.as_slice(), &[(0, 1..2), (1, 0..2)]);
    assert_eq!(covered, 3);

    // Skip exactly one segment.
    let (plan, covered) = plan_descriptors([2, 3, 1], 2, 100, 10);
    assert_eq!(plan.as_slice(), &[(1, 0..3), (2, 0..1)]);
    assert_eq!(covered, 4);

    // Empty segments never get a descriptor.
    let (plan, covered) = plan_descriptors([0, 2, 0, 1, 0], 0, 100, 10);
    assert_eq!(plan.as_slice(), &[(1, 0..2), (3, 0..1)]);
    assert_eq!(covered, 3);

    let (plan, covered) = plan_descriptors([2, 3, 1], 6, 100, 10);
    assert!(plan.is_empty());
    assert_eq!(covered, 0);

    let (plan, covered) = plan_descriptors([2, 3, 1], 0, 0, 10);
    assert!(plan.is_empty());
    assert_eq!(covered, 0);

    // `usize::MAX` means "to the end", even from inside a segment.
    let (plan, covered) = plan_descriptors([2, 3, 1], 1, usize::MAX, 10);
    assert_eq!(plan.as_slice(), &[(0, 1..2), (1, 0..3), (2, 0..1)]);
    assert_eq!(covered, 5);

    let (plan, covered) = plan_descriptors([2, 3, 1], 3, usize::MAX - 1, 1);
    assert_eq!(plan.as_slice(), &[(1, 1..3)]);
    assert_eq!(covered, 2);
}

#[test]
fn test_build_descriptors_miri() {
    let iovec = iovec_from(&[b"ab", b"cde", b"f"], 16);

    let descriptors = build_descriptors(&iovec, 0, iovec.byte_count());
    assert_eq!(descriptors.len(), 3);
    assert_eq!(descriptors.covered(), 6);
    assert_eq!(flatten(&descriptors), b"abcdef");

    let descriptors = build_descriptors(&iovec, 1, 3);
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors.covered(), 3);
    assert_eq!(flatten(&descriptors), b"bcd");

    // Asking for more than we have reports what we actually have.
    let descriptors = build_descriptors(&iovec, 4, 100);
    assert_eq!(descriptors.covered(), 2);
    assert_eq!(flatten(&descriptors), b"ef");

    let descriptors = build_descriptors(&iovec, 6, 1);
    assert!(descriptors.is_empty());
    assert_eq!(descriptors.covered(), 0);
}

#[test]
fn test_build_descriptors_to_end_miri() {
    let iovec = iovec_from(&[b"ab", b"cde", b"f"], 16);

    for offset in 0..=6 {
        let descriptors = build_descriptors(&iovec, offset, usize::MAX);
        assert_eq!(descriptors.covered(), 6 - offset);
        assert_eq!(flatten(&descriptors), &iovec.concat()[offset..]);
    }

    let descriptors = build_descriptors(&iovec, 1, usize::MAX);
    assert_eq!(descriptors.len(), 3);
    assert_eq!(descriptors.covered(), 5);
    assert_eq!(flatten(&descriptors), b"bcdef");
}

// The descriptor limit caps the list, and `covered` only counts what's
// described; re-issuing at `offset + covered` picks up the rest.
#[test]
fn test_descriptor_limit_miri() {
    let chunks: Vec<Vec<u8>> = (0..10u8).map(|i| vec![b'0' + i; 1 + i as usize]).collect();
    let refs: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
    let iovec = iovec_from(&refs, 4);
    let total = iovec.byte_count();
    assert_eq!(iovec.segment_count(), 10);

    let mut offset = 0;
    let mut rebuilt = Vec::new();
    while offset < total {
        let descriptors = build_descriptors(&iovec, offset, total - offset);
        assert!(descriptors.len() <= 4);
        assert!(descriptors.covered() > 0);
        assert_eq!(
            descriptors.covered(),
            descriptors.as_slices().iter().map(|s| s.len()).sum::<usize>()
        );

        rebuilt.extend(flatten(&descriptors));
        offset += descriptors.covered();
    }

    assert_eq!(rebuilt, iovec.concat());

    // The first pass covers exactly the first 4 segments.
    let descriptors = build_descriptors(&iovec, 0, total);
    assert_eq!(descriptors.len(), 4);
    assert_eq!(descriptors.covered(), 1 + 2 + 3 + 4);
}

#[test]
fn test_descriptors_after_consume_miri() {
    let mut iovec = iovec_from(&[b"ab", b"cde", b"f"], 16);
    iovec.consume(3);

    // Descriptors only describe logical bytes, never stale storage.
    let descriptors = build_descriptors(&iovec, 0, iovec.byte_count());
    assert_eq!(flatten(&descriptors), b"def");
    assert_eq!(descriptors.covered(), 3);
}

#[test]
fn test_write_file() {
    use std::io::Read;
    use std::io::Seek;

    let iovec = iovec_from(&[b"ab", b"cde", b"f"], 16);
    let file = tempfile::tempfile().expect("should create tempfile");

    assert_eq!(
        write_vectored(&file, &iovec, 0, iovec.byte_count()),
        Ok(WriteOutcome::Written {
            written: 6,
            incomplete: false
        })
    );
    assert_eq!(
        write_vectored(&file, &iovec, 2, 3),
        Ok(WriteOutcome::Written {
            written: 3,
            incomplete: false
        })
    );

    // The vector is untouched.
    assert_eq!(iovec.byte_count(), 6);
    assert_eq!(iovec.concat(), b"abcdef");

    let mut contents = Vec::new();
    let mut file = file;
    file.rewind().expect("should seek");
    file.read_to_end(&mut contents).expect("should read");
    assert_eq!(contents, b"abcdefcde");
}

#[test]
fn test_write_to_end() {
    use std::io::Read;
    use std::io::Seek;

    let iovec = iovec_from(&[b"ab", b"cde", b"f"], 16);
    let mut file = tempfile::tempfile().expect("should create tempfile");

    assert_eq!(
        write_vectored(&file, &iovec, 1, usize::MAX),
        Ok(WriteOutcome::Written {
            written: 5,
            incomplete: false
        })
    );

    let mut contents = Vec::new();
    file.rewind().expect("should seek");
    file.read_to_end(&mut contents).expect("should read");
    assert_eq!(contents, b"bcdef");
}

// Past the end, we still issue a (zero-byte) write.
#[test]
fn test_write_empty_range() {
    let iovec = iovec_from(&[b"ab"], 16);
    let file = tempfile::tempfile().expect("should create tempfile");

    for (offset, len) in [(2, 10), (100, 1), (0, 0)] {
        assert_eq!(
            write_vectored(&file, &iovec, offset, len),
            Ok(WriteOutcome::Written {
                written: 0,
                incomplete: false
            })
        );
    }

    let empty = SegmentIovec::new();
    assert_eq!(
        write_vectored(&file, &empty, 0, 0),
        Ok(WriteOutcome::Written {
            written: 0,
            incomplete: false
        })
    );

    assert_eq!(file.metadata().expect("should stat").len(), 0);
}

#[test]
fn test_write_bad_fd() {
    let iovec = iovec_from(&[b"ab"], 16);
    let path = tempfile::NamedTempFile::new().expect("should create tempfile");
    let read_only = std::fs::File::open(path.path()).expect("should open");

    let err = write_vectored(&read_only, &iovec, 0, 2).expect_err("must fail");
    assert_eq!(err, Error::System(Errno::EBADF));
    assert_eq!(err.errno(), Some(Errno::EBADF));
    assert_eq!(iovec.concat(), b"ab");
}

// A non-blocking socket accepts part of a large write, then blocks.
#[test]
fn test_write_partial_then_retry() {
    use std::os::unix::net::UnixStream;

    let (tx, _rx) = UnixStream::pair().expect("should create socket pair");
    tx.set_nonblocking(true).expect("should set non-blocking");

    let mut iovec = SegmentIovec::new();
    for i in 0..64u8 {
        iovec.add(&vec![i; 64 * 1024]).expect("should fit");
    }
    let total = iovec.byte_count();
    let before = iovec.concat();

    let WriteOutcome::Written {
        written,
        incomplete,
    } = write_vectored(&tx, &iovec, 0, total).expect("should write")
    else {
        panic!("expected a partial write");
    };

    assert!(written > 0);
    assert!(written < total);
    assert!(incomplete);
    // Nothing is consumed implicitly.
    assert_eq!(iovec.byte_count(), total);
    assert_eq!(iovec.concat(), before);

    iovec.consume(written);
    assert_eq!(iovec.byte_count(), total - written);

    // Keep writing until the socket buffer is full.
    let mut attempts = 0;
    loop {
        attempts += 1;
        assert!(attempts < 1000, "socket never blocked");

        match write_vectored(&tx, &iovec, 0, iovec.byte_count()).expect("should not fail") {
            WriteOutcome::Written { written, .. } => {
                iovec.consume(written);
            }
            WriteOutcome::Retry => break,
            WriteOutcome::Closed => panic!("peer is still open"),
        }
    }

    // Retry leaves the vector alone.
    let remaining = iovec.concat();
    assert_eq!(
        write_vectored(&tx, &iovec, 0, iovec.byte_count()),
        Ok(WriteOutcome::Retry)
    );
    assert_eq!(iovec.concat(), remaining);
    assert_eq!(&before[total - remaining.len()..], &remaining[..]);
}

#[test]
fn test_write_closed_peer() {
    use std::os::unix::net::UnixStream;

    let (tx, rx) = UnixStream::pair().expect("should create socket pair");
    std::mem::drop(rx);

    let iovec = iovec_from(&[b"ab", b"cde"], 16);
    assert_eq!(
        write_vectored(&tx, &iovec, 0, 5),
        Ok(WriteOutcome::Closed)
    );
    assert_eq!(iovec.byte_count(), 5);
}

// Closing a TCP socket with unread input resets the connection, and the
// next write on the other end fails with ECONNRESET.
#[test]
fn test_write_reset_peer() {
    use std::io::Write;
    use std::net::TcpListener;
    use std::net::TcpStream;

    let listener = TcpListener::bind("127.0.0.1:0").expect("should bind");
    let addr = listener.local_addr().expect("should have addr");
    let mut client = TcpStream::connect(addr).expect("should connect");
    let (server, _) = listener.accept().expect("should accept");

    client.write_all(b"unread").expect("should write");
    let mut buf = [0u8; 1];
    assert_eq!(server.peek(&mut buf).expect("should peek"), 1);
    std::mem::drop(server);
    std::thread::sleep(std::time::Duration::from_millis(50));

    let iovec = iovec_from(&[b"ab", b"cde"], 16);
    assert_eq!(
        write_vectored(&client, &iovec, 0, 5),
        Ok(WriteOutcome::Closed)
    );
    assert_eq!(iovec.byte_count(), 5);
    assert_eq!(iovec.concat(), b"abcde");
}

#[test]
fn test_classify_write_failure_miri() {
    for errno in [Errno::EAGAIN, Errno::EWOULDBLOCK, Errno::EINTR] {
        assert_eq!(classify_write_failure(errno), Ok(WriteOutcome::Retry));
    }

    for errno in [Errno::EPIPE, Errno::ECONNRESET] {
        assert_eq!(classify_write_failure(errno), Ok(WriteOutcome::Closed));
    }

    assert_eq!(
        classify_write_failure(Errno::EBADF),
        Err(Error::System(Errno::EBADF))
    );
}

// Three pre-sized 2-byte segments, and the peer only sends 2 bytes.
#[test]
fn test_read_short() {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    let (mut tx, rx) = UnixStream::pair().expect("should create socket pair");
    tx.write_all(b"hi").expect("should write");

    let mut iovec = SegmentIovec::new();
    for _ in 0..3 {
        iovec.add_n(2).expect("should fit");
    }

    let len = iovec.byte_count();
    assert_eq!(
        read_vectored(&rx, &mut iovec, 0, len),
        Ok(ReadOutcome::Read(2))
    );

    // Lengths and capacities stay as pre-sized.
    assert_eq!(iovec.byte_count(), 6);
    assert_eq!(iovec.segment_count(), 3);
    for i in 0..3 {
        assert_eq!(iovec.segment_len(i), Some(2));
        assert_eq!(iovec.segment_capacity(i), Some(2));
    }
    assert_eq!(iovec.concat(), b"hi    ");
}

#[test]
fn test_read_across_segments_at_offset() {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    let (mut tx, rx) = UnixStream::pair().expect("should create socket pair");
    tx.write_all(b"12345").expect("should write");

    let mut iovec = SegmentIovec::new();
    iovec.add(b"head").expect("should fit");
    iovec.add_n(3).expect("should fit");
    iovec.add_n(3).expect("should fit");

    // Fill from offset 5: one byte of the first pre-sized segment
    // stays untouched.
    assert_eq!(
        read_vectored(&rx, &mut iovec, 5, 4),
        Ok(ReadOutcome::Read(4))
    );
    assert_eq!(iovec.concat(), b"head 1234 ");

    assert_eq!(
        read_vectored(&rx, &mut iovec, 9, 100),
        Ok(ReadOutcome::Read(1))
    );
    assert_eq!(iovec.concat(), b"head 12345");

    // Reading "to the end" from inside a segment.
    tx.write_all(b"xy").expect("should write");
    assert_eq!(
        read_vectored(&rx, &mut iovec, 3, usize::MAX),
        Ok(ReadOutcome::Read(2))
    );
    assert_eq!(iovec.concat(), b"heaxy12345");
}

#[test]
fn test_read_closed_and_retry() {
    use std::os::unix::net::UnixStream;

    let (tx, rx) = UnixStream::pair().expect("should create socket pair");
    rx.set_nonblocking(true).expect("should set non-blocking");

    let mut iovec = SegmentIovec::new();
    iovec.add_n(4).expect("should fit");

    assert_eq!(
        read_vectored(&rx, &mut iovec, 0, 4),
        Ok(ReadOutcome::Retry)
    );

    std::mem::drop(tx);
    assert_eq!(
        read_vectored(&rx, &mut iovec, 0, 4),
        Ok(ReadOutcome::Closed)
    );
    assert_eq!(iovec.concat(), b"    ");
}

#[test]
fn test_read_nothing_to_fill() {
    use std::os::unix::net::UnixStream;

    let (_tx, rx) = UnixStream::pair().expect("should create socket pair");
    let mut iovec = SegmentIovec::new();

    assert!(matches!(
        read_vectored(&rx, &mut iovec, 0, 10),
        Err(Error::InvalidArgument(_))
    ));

    iovec.add_n(2).expect("should fit");
    assert!(matches!(
        read_vectored(&rx, &mut iovec, 2, 10),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        read_vectored(&rx, &mut iovec, 0, 0),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_read_bad_fd() {
    let file = tempfile::NamedTempFile::new().expect("should create tempfile");
    let write_only = std::fs::OpenOptions::new()
        .write(true)
        .open(file.path())
        .expect("should open");

    let mut iovec = SegmentIovec::new();
    iovec.add_n(2).expect("should fit");

    assert_eq!(
        read_vectored(&write_only, &mut iovec, 0, 2),
        Err(Error::System(Errno::EBADF))
    );
}

// The caller loop: write what's covered, consume what was written, repeat.
#[test]
fn test_write_loop_with_descriptor_limit() {
    use std::io::Read;
    use std::io::Seek;

    let chunks: Vec<Vec<u8>> = (0..20u8).map(|i| vec![b'a' + i; 3]).collect();
    let refs: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
    let mut iovec = iovec_from(&refs, 3);
    let expected = iovec.concat();
    let mut file = tempfile::tempfile().expect("should create tempfile");

    let mut calls = 0;
    while iovec.byte_count() > 0 {
        calls += 1;
        match write_vectored(&file, &iovec, 0, iovec.byte_count()).expect("should write") {
            WriteOutcome::Written { written, .. } => {
                assert!(written > 0);
                iovec.consume(written);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    // At most 3 segments (9 bytes) per call.
    assert!(calls >= 7);
    assert!(iovec.is_empty());

    let mut contents = Vec::new();
    file.rewind().expect("should seek");
    file.read_to_end(&mut contents).expect("should read");
    assert_eq!(contents, expected);
}
