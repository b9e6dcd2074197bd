//! Failure taxonomy for [`crate::SegmentIovec`] mutations and vectored I/O.
//!
//! Transient conditions (would-block, interrupted) and peer shutdown are
//! *not* errors: they're reported as [`crate::WriteOutcome`] and
//! [`crate::ReadOutcome`] variants.
use nix::errno::Errno;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error, Clone, Copy, Eq, PartialEq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    /// A count, index or option value is out of its domain.
    InvalidArgument(&'static str),

    #[error("segment count would exceed the limit of {limit}")]
    /// The mutation would push the segment count past the vector's limit.
    CapacityExceeded { limit: usize },

    #[error("out of memory")]
    /// Storage for a segment (or the segment list) could not be allocated.
    OutOfMemory,

    #[error("{}", .0.desc())]
    /// Any syscall failure that is neither transient nor a peer shutdown.
    System(Errno),
}

impl Error {
    /// Returns the OS error code for [`Error::System`], [`None`] otherwise.
    #[must_use]
    pub fn errno(&self) -> Option<Errno> {
        match self {
            Error::System(errno) => Some(*errno),
            _ => None,
        }
    }
}

impl From<Errno> for Error {
    fn from(value: Errno) -> Self {
        Self::System(value)
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::System(errno) => errno.into(),
            Error::InvalidArgument(_) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, value)
            }
            Error::OutOfMemory => std::io::Error::new(std::io::ErrorKind::OutOfMemory, value),
            Error::CapacityExceeded { .. } => std::io::Error::other(value),
        }
    }
}

#[test]
fn test_display_miri() {
    assert_eq!(
        Error::CapacityExceeded { limit: 4 }.to_string(),
        "segment count would exceed the limit of 4"
    );
    assert_eq!(Error::OutOfMemory.to_string(), "out of memory");
    assert_eq!(
        Error::InvalidArgument("bad count").to_string(),
        "invalid argument: bad count"
    );
}

#[test]
fn test_errno_roundtrip() {
    let err: Error = Errno::EBADF.into();
    assert_eq!(err.errno(), Some(Errno::EBADF));
    assert_eq!(err.to_string(), Errno::EBADF.desc());
    assert_eq!(Error::OutOfMemory.errno(), None);

    let io: std::io::Error = err.into();
    assert_eq!(io.raw_os_error(), Some(Errno::EBADF as i32));
}

#[test]
fn test_io_error_kinds_miri() {
    let io: std::io::Error = Error::InvalidArgument("x").into();
    assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);

    let io: std::io::Error = Error::OutOfMemory.into();
    assert_eq!(io.kind(), std::io::ErrorKind::OutOfMemory);

    let io: std::io::Error = Error::CapacityExceeded { limit: 1 }.into();
    assert_eq!(io.kind(), std::io::ErrorKind::Other);
}
