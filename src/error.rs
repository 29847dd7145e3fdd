//! Error types for numw

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using numw's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in numw operations
///
/// There is no local recovery anywhere in the crate: every error is a hard
/// stop for the current operation and propagates to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Lookup of a tensor handle that is not registered (disposed or never
    /// created). Always a programming error upstream.
    #[error("Unknown tensor handle {handle}")]
    UnknownHandle {
        /// Raw value of the handle that failed lookup
        handle: u64,
    },

    /// Arena allocation failure. Not retried; a higher layer may free
    /// tensors and try again.
    #[error("Out of memory: failed to allocate {requested} bytes (capacity limit {limit})")]
    OutOfMemory {
        /// Number of bytes requested
        requested: usize,
        /// Arena capacity limit in bytes
        limit: usize,
    },

    /// Shapes are incompatible for broadcasting, concatenation, or reshape
    #[error("Shape mismatch: {lhs:?} vs {rhs:?}")]
    ShapeMismatch {
        /// Left-hand side (or expected) shape
        lhs: Vec<usize>,
        /// Right-hand side (or actual) shape
        rhs: Vec<usize>,
    },

    /// Axis index out of range for a tensor rank
    #[error("Invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis {
        /// The offending axis (as given, possibly negative)
        axis: isize,
        /// Number of dimensions
        ndim: usize,
    },

    /// Operation does not support the given dtype
    #[error("Unsupported dtype {dtype} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// A configuration the kernel cannot handle (layout, broadcast pattern,
    /// attribute combination). Detected before any native call or allocation.
    #[error("Unsupported configuration for '{op}': {reason}")]
    Unsupported {
        /// The operation name
        op: &'static str,
        /// Why the configuration is rejected
        reason: String,
    },

    /// A dtype tag from the native boundary that maps to no known dtype
    #[error("Unknown dtype tag {tag}")]
    UnknownDType {
        /// The unrecognized numeric tag
        tag: i32,
    },

    /// Bind failure: the native module exports no such symbol
    #[error("Native module has no symbol '{symbol}'")]
    UnknownSymbol {
        /// The symbol that failed to resolve
        symbol: String,
    },

    /// The native callable signaled an error through its status record
    #[error("Native kernel '{symbol}' failed with code {code}: {message}")]
    NativeKernelFailure {
        /// Symbol of the failing kernel
        symbol: String,
        /// Native error code
        code: i32,
        /// Decoded error message from the native payload
        message: String,
    },

    /// No kernel registered under the requested operation name
    #[error("No kernel registered for operation '{name}'")]
    KernelNotFound {
        /// The requested operation name
        name: String,
    },

    /// Invalid argument to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: &'static str,
        /// Why the argument is invalid
        reason: String,
    },
}
