//! Error Types for Recording Contract Violations
//!
//! ## Design Philosophy
//!
//! Simtrace's error system follows a few hard rules:
//!
//! 1. **Small Size**: Each variant carries only the bounds it reports
//!    (typically 16-24 bytes), since errors can surface in the per-tick
//!    hot path and may be stored or forwarded by the simulation loop.
//!
//! 2. **No Heap Allocation**: All error data is inline - no String, no
//!    boxed payloads. Memory usage stays deterministic even when a
//!    misbehaving consumer hammers the store with invalid cursors.
//!
//! 3. **Copy Semantics**: Errors implement Copy so they can be returned
//!    and re-reported without move-semantics complications.
//!
//! 4. **Fail Fast**: Every error here is a contract violation, not an
//!    expected runtime condition. The store never retries or silently
//!    recovers; the offending operation is aborted and the caller (the
//!    stepping loop or a consumer) decides whether to halt, skip the
//!    tick, or restart the session. Recovering silently would risk a
//!    reader observing an inconsistent window.
//!
//! ## Error Categories
//!
//! ### Addressing Violations
//! - `IndexOutOfRange`: a cursor or crop point outside `[0, size)`
//!
//! ### Capacity Violations
//! - `InsufficientCapacity`: resize target smaller than the active window
//!
//! ### Protocol Violations
//! - `UnlinkedVariableAccess`: push/pull before a variable was linked, or
//!   a pull that resolves to a tick older than the variable's slot
//! - `ConcurrentResizeViolation`: resize attempted while a tick is being
//!   recorded (or a second writer colliding with the first)

use thiserror_no_std::Error;

/// Result type for recording operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Recording errors - kept small and inline for hot-path returns
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// Index outside the valid range of the circular store
    #[error("index {index} outside range [0, {size})")]
    IndexOutOfRange {
        /// The offending index or crop point
        index: usize,
        /// Current capacity of the store
        size: usize,
    },

    /// Resize target cannot hold the currently active window
    #[error("capacity {requested} cannot hold active window of {required}")]
    InsufficientCapacity {
        /// Requested new capacity
        requested: usize,
        /// Minimum capacity that preserves the active window
        required: usize,
    },

    /// Push or pull against a variable that has no slot yet, or against
    /// a tick recorded before the variable was linked
    #[error("variable accessed before it was linked")]
    UnlinkedVariableAccess,

    /// Resize attempted while a tick was in flight
    #[error("resize attempted while a tick is being recorded")]
    ConcurrentResizeViolation,
}

#[cfg(feature = "defmt")]
impl defmt::Format for RecordError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::IndexOutOfRange { index, size } =>
                defmt::write!(fmt, "index {} outside [0, {})", index, size),
            Self::InsufficientCapacity { requested, required } =>
                defmt::write!(fmt, "capacity {} < active window {}", requested, required),
            Self::UnlinkedVariableAccess =>
                defmt::write!(fmt, "unlinked variable access"),
            Self::ConcurrentResizeViolation =>
                defmt::write!(fmt, "concurrent resize violation"),
        }
    }
}
