//! Structured error type for region allocators
//!
//! Every failure raised by an allocator is an [`AllocError`] carrying the
//! failed condition, the source location of the check, a message and an
//! [`ErrorKind`]. Resource exhaustion is *not* an error: raw allocation
//! reports it as `Ok(None)`.

use core::panic::Location;

use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

// ============================================================================
// Error Kinds
// ============================================================================

/// Category of an allocator failure
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A zero-byte allocation was requested
    ZeroSize,
    /// A zero-length array was requested
    ZeroLength,
    /// A null address was passed to a deallocation
    NullPointer,
    /// The strategy does not support the operation
    Unsupported,
    /// Memory was still live when the allocator was closed
    LeakDetected,
    /// Alignment is not a power of two or is out of range for the strategy
    InvalidAlignment,
    /// Request does not fit the strategy's fixed layout
    InvalidLayout,
    /// Allocator construction parameters are unusable
    InvalidConfig,
    /// Address does not belong to the allocator's slot area
    InvalidPointer,
    /// Stack deallocation did not target the most recent live block
    OutOfOrder,
    /// Operation is inconsistent with the allocator's current state
    InvalidState,
    /// Size arithmetic overflowed
    SizeOverflow,
}

impl ErrorKind {
    /// Stable code for categorization
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::ZeroSize => "MEM:ALLOC:ZERO_SIZE",
            Self::ZeroLength => "MEM:ALLOC:ZERO_LENGTH",
            Self::NullPointer => "MEM:DEALLOC:NULL",
            Self::Unsupported => "MEM:DEALLOC:UNSUPPORTED",
            Self::LeakDetected => "MEM:LIFECYCLE:LEAK",
            Self::InvalidAlignment => "MEM:ALLOC:ALIGN",
            Self::InvalidLayout => "MEM:ALLOC:LAYOUT",
            Self::InvalidConfig => "MEM:CONFIG:INVALID",
            Self::InvalidPointer => "MEM:DEALLOC:POINTER",
            Self::OutOfOrder => "MEM:DEALLOC:ORDER",
            Self::InvalidState => "MEM:SYSTEM:STATE",
            Self::SizeOverflow => "MEM:ALLOC:OVERFLOW",
        }
    }

    /// Whether this kind marks a programmer error at the call site
    #[must_use]
    pub fn is_precondition(self) -> bool {
        matches!(
            self,
            Self::ZeroSize
                | Self::ZeroLength
                | Self::NullPointer
                | Self::InvalidAlignment
                | Self::InvalidLayout
                | Self::InvalidPointer
                | Self::OutOfOrder
        )
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// Allocator failure with the condition that failed and where it was checked
#[must_use = "errors should be handled"]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}: assertion '{condition}' failed at {location}")]
pub struct AllocError {
    kind: ErrorKind,
    condition: &'static str,
    location: &'static Location<'static>,
    message: String,
}

impl AllocError {
    /// Creates an error located at the caller
    #[track_caller]
    pub fn new(kind: ErrorKind, condition: &'static str, message: impl Into<String>) -> Self {
        let err = Self {
            kind,
            condition,
            location: Location::caller(),
            message: message.into(),
        };

        #[cfg(feature = "logging")]
        {
            if kind == ErrorKind::LeakDetected {
                error!(code = kind.code(), location = %err.location, "{}", err.message);
            } else {
                warn!(code = kind.code(), location = %err.location, "{}", err.message);
            }
        }

        err
    }

    // ------------------------------------------------------------------------
    // Convenience Constructors
    // ------------------------------------------------------------------------

    /// Zero-byte allocation request
    #[track_caller]
    pub fn zero_size() -> Self {
        Self::new(
            ErrorKind::ZeroSize,
            "size > 0",
            "allocated size must be larger than 0",
        )
    }

    /// Zero-length array request
    #[track_caller]
    pub fn zero_length() -> Self {
        Self::new(
            ErrorKind::ZeroLength,
            "length > 0",
            "allocated array length must be larger than 0",
        )
    }

    /// Null address passed to a deallocation
    #[track_caller]
    pub fn null_pointer() -> Self {
        Self::new(
            ErrorKind::NullPointer,
            "!ptr.is_null()",
            "deallocated pointer must not be null",
        )
    }

    /// Operation the strategy cannot perform
    #[track_caller]
    pub fn unsupported(operation: &str, strategy: &str) -> Self {
        Self::new(
            ErrorKind::Unsupported,
            "supports_deallocation",
            format!("{operation}() is not usable in a {strategy} allocator"),
        )
    }

    /// Live memory found when the allocator was closed
    #[track_caller]
    pub fn leak_detected(used: usize, allocations: usize) -> Self {
        Self::new(
            ErrorKind::LeakDetected,
            "used_memory == 0 && num_allocations == 0",
            format!("undeallocated memory: {used} bytes in {allocations} allocations"),
        )
    }

    /// Alignment is not a power of two or exceeds what the strategy supports
    #[track_caller]
    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::new(
            ErrorKind::InvalidAlignment,
            "alignment.is_power_of_two()",
            format!("invalid alignment: {alignment}"),
        )
    }

    /// Request does not fit a fixed layout
    #[track_caller]
    pub fn invalid_layout(condition: &'static str, reason: &str) -> Self {
        Self::new(
            ErrorKind::InvalidLayout,
            condition,
            format!("invalid memory layout: {reason}"),
        )
    }

    /// Unusable construction parameters
    #[track_caller]
    pub fn invalid_config(condition: &'static str, reason: &str) -> Self {
        Self::new(
            ErrorKind::InvalidConfig,
            condition,
            format!("invalid configuration: {reason}"),
        )
    }

    /// Address is not one of the allocator's blocks
    #[track_caller]
    pub fn invalid_pointer(address: usize) -> Self {
        Self::new(
            ErrorKind::InvalidPointer,
            "owns(ptr)",
            format!("address {address:#x} was not handed out by this allocator"),
        )
    }

    /// Stack deallocation out of LIFO order
    #[track_caller]
    pub fn out_of_order(address: usize, expected: usize) -> Self {
        Self::new(
            ErrorKind::OutOfOrder,
            "ptr == most_recent",
            format!("stack deallocation out of order: got {address:#x}, expected {expected:#x}"),
        )
    }

    /// Operation inconsistent with current state
    #[track_caller]
    pub fn invalid_state(condition: &'static str, reason: &str) -> Self {
        Self::new(ErrorKind::InvalidState, condition, format!("invalid state: {reason}"))
    }

    /// Size arithmetic overflowed
    #[track_caller]
    pub fn size_overflow(operation: &str) -> Self {
        Self::new(
            ErrorKind::SizeOverflow,
            "checked arithmetic",
            format!("size overflow during {operation}"),
        )
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable code of the error category
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Stringified condition that failed
    pub fn condition(&self) -> &'static str {
        self.condition
    }

    /// Source location where the condition was checked
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Source file of the failed check
    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    /// Source line of the failed check
    pub fn line(&self) -> u32 {
        self.location.line()
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is an unsupported-operation error
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        self.kind == ErrorKind::Unsupported
    }

    /// Check if this is a leak report
    #[must_use]
    pub fn is_leak(&self) -> bool {
        self.kind == ErrorKind::LeakDetected
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for allocator operations
pub type AllocResult<T> = core::result::Result<T, AllocError>;

// ============================================================================
// Tests
// ============================================================================
