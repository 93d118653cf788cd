//! Error taxonomy for every fallible runtime operation.
//!
//! The runtime never panics on user error (malformed input, a null required
//! argument) and never uses exceptions: every operation that can fail
//! returns a `Result<T, Error>` by value. See the top-level crate docs for
//! the propagation policy.

use core::fmt;

/// The kind of failure a runtime operation reports.
///
/// This is a closed set by design: generated (per-schema) code is the only
/// supported client of this runtime, and it is expected to match on these
/// four kinds exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A read would exceed the reader's buffer, a length prefix's payload is
    /// out of bounds, or a reserved length-fill offset is past the end of
    /// the writer's used range.
    Malformed,
    /// Arena allocation failed: the host allocator returned null, or the
    /// request exceeded `max_block_size`.
    OutOfMemory,
    /// A required input pointer or reference was null/missing.
    NullArgument,
    /// Reserved. Not produced by the current surface.
    InvalidContext,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Malformed => "malformed input",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::NullArgument => "null argument",
            ErrorKind::InvalidContext => "invalid context",
        };
        f.write_str(s)
    }
}

/// An error produced by a runtime operation.
///
/// Carries a static context string naming the operation that failed (e.g.
/// `"Reader::read_u32"`), which is cheap enough to attach unconditionally
/// since it is always a `&'static str`, never an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} in {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: &'static str,
}

impl Error {
    #[inline]
    #[must_use]
    pub const fn new(kind: ErrorKind, context: &'static str) -> Self {
        Self { kind, context }
    }

    #[inline]
    #[must_use]
    pub const fn malformed(context: &'static str) -> Self {
        Self::new(ErrorKind::Malformed, context)
    }

    #[inline]
    #[must_use]
    pub const fn out_of_memory(context: &'static str) -> Self {
        Self::new(ErrorKind::OutOfMemory, context)
    }

    #[inline]
    #[must_use]
    pub const fn null_argument(context: &'static str) -> Self {
        Self::new(ErrorKind::NullArgument, context)
    }

    /// Returns `true` if this error's kind is [`ErrorKind::Malformed`].
    #[inline]
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.kind == ErrorKind::Malformed
    }

    /// Returns `true` if this error's kind is [`ErrorKind::OutOfMemory`].
    #[inline]
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        self.kind == ErrorKind::OutOfMemory
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
