//! The `segment_iovec` crate exposes a [`SegmentIovec`] object: an
//! ordered list of owned byte segments that can be built, patched and
//! drained incrementally, and handed as a whole to scatter-gather
//! syscalls.  Writers avoid copying many small chunks into one
//! contiguous buffer, and readers can pre-size several destinations
//! instead of over-reading into one large buffer.
//!
//! The vector keeps an exact running count of its bytes, and never
//! holds more segments than a single `writev`/`readv` call accepts
//! ([`iov_max()`]).  Segments are released exactly once: when deleted,
//! when fully consumed, or when the vector is cleared or dropped.
//!
//! The [`write_vectored`] and [`read_vectored`] functions perform *one*
//! syscall attempt over a logical byte range of the vector, and classify
//! the result: transfers, [`WriteOutcome::Retry`] (would-block or
//! interrupted), [`WriteOutcome::Closed`] (peer shutdown, or end of
//! stream for reads), or an [`Error::System`].  Retrying, polling and
//! consuming written bytes are up to the caller.
#[cfg(test)]
#[macro_use]
extern crate rusty_fork;

mod error;
mod implementation;
mod segment;
mod vectored_io;

use std::sync::OnceLock;

pub use error::Error;
pub use error::Result;
pub use implementation::SegmentIovec;
pub use implementation::SegmentIovecOptions;
pub use segment::Segment;
pub use vectored_io::build_descriptors;
pub use vectored_io::read_vectored;
pub use vectored_io::write_vectored;
pub use vectored_io::Descriptors;
pub use vectored_io::ReadOutcome;
pub use vectored_io::WriteOutcome;

/// The descriptor limit we assume when the platform doesn't report one.
pub const DEFAULT_IOV_MAX: usize = 1024;

/// Returns the maximum number of descriptors per vectored syscall: the
/// platform's `IOV_MAX` if it has one, and [`DEFAULT_IOV_MAX`] otherwise.
#[must_use]
pub fn iov_max() -> usize {
    static IOV_MAX: OnceLock<usize> = OnceLock::new();

    *IOV_MAX.get_or_init(|| {
        #[cfg(unix)]
        {
            let ret = unsafe { libc::sysconf(libc::_SC_IOV_MAX) };
            if ret > 0 {
                return usize::try_from(ret).unwrap_or(DEFAULT_IOV_MAX);
            }
        }

        DEFAULT_IOV_MAX
    })
}

/// Reading from a [`SegmentIovec`] copies bytes from the front of the
/// vector and consumes them.
impl std::io::Read for SegmentIovec {
    fn read(&mut self, mut dst: &mut [u8]) -> std::io::Result<usize> {
        let mut written = 0;
        for slice in self.iter() {
            if dst.is_empty() {
                break;
            }

            let to_write = slice.len().min(dst.len());
            dst[..to_write].copy_from_slice(&slice[..to_write]);
            written += to_write;
            dst = &mut dst[to_write..];
        }

        self.consume(written);
        Ok(written)
    }
}

/// Writing to a [`SegmentIovec`] appends a copy of each non-empty
/// buffer as a new segment.
impl std::io::Write for SegmentIovec {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        self.add(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_iov_max() {
    let max = iov_max();
    assert!(max >= 16);
    assert_eq!(max, iov_max());
    assert_eq!(SegmentIovec::new().options().max_segments, max);
}

#[test]
fn test_read_miri() {
    use std::io::Read;

    let mut iovec = SegmentIovec::new();
    iovec.add(b"123").unwrap();
    iovec.add(b"456").unwrap();

    let mut dst = Vec::new();
    iovec.read_to_end(&mut dst).expect("should succeed");
    assert_eq!(dst, b"123456");
    assert!(iovec.is_empty());
}

#[test]
fn test_read_short_miri() {
    use std::io::Read;

    let mut iovec = SegmentIovec::new();
    iovec.add(b"123").unwrap();
    iovec.add(b"456").unwrap();

    let mut dst = [0u8; 4];
    assert_eq!(iovec.read(&mut dst).expect("should succeed"), 4);
    assert_eq!(&dst, b"1234");
    assert_eq!(iovec.byte_count(), 2);
    assert_eq!(iovec.concat(), b"56");
}

#[test]
fn test_write_miri() {
    use std::io::Write;

    let mut iovec = SegmentIovec::new();
    write!(iovec, "{}-{}", 12, "ab").expect("should succeed");
    iovec.write_all(b"").expect("should succeed");
    iovec.flush().expect("should succeed");

    assert_eq!(iovec.concat(), b"12-ab");
    assert!(!iovec.iter().any(<[u8]>::is_empty));
}

#[test]
fn test_write_capacity_miri() {
    use std::io::Write;

    let mut iovec = SegmentIovec::new_with_options(SegmentIovecOptions {
        max_segments: 1,
        ..Default::default()
    })
    .unwrap();

    iovec.write_all(b"a").expect("should succeed");
    assert!(iovec.write_all(b"b").is_err());
    assert_eq!(iovec.concat(), b"a");
}
