use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::encoding::Encoding;

macro_rules! invalid_position {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvalidPosition {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvalidPosition {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! os_error {
    ($operation:expr, $source:expr) => {
        crate::Error::Os {
            operation: $operation,
            source: $source,
        }
    };
}

/// One tier of the handle hierarchy owned by a [`crate::MappedRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The backing file
    Store,
    /// The mapping object created over the store (or over anonymous memory)
    Mapping,
    /// The currently mapped window
    View,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Store => write!(f, "backing store"),
            Resource::Mapping => write!(f, "mapping object"),
            Resource::View => write!(f, "view"),
        }
    }
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Running out of capacity is deliberately *not* an error: operations that would exceed the
/// maximum size of a region without permission to grow report that through their return value
/// (`0`, an empty result or `None`) and leave the region untouched, so callers can retry with
/// growth enabled.
///
/// # Error Categories
///
/// ## Caller errors
/// - [`Error::InvalidPosition`] - Cursor or offset outside the view or the region
/// - [`Error::OutOfBounds`] - A block operation addressed bytes outside the view
///
/// ## Platform errors
/// - [`Error::Os`] - The operating system refused a file or mapping call
/// - [`Error::Staging`] - Growing an anonymous region failed after its content was staged to disk
///
/// ## Protocol misuse
/// - [`Error::AlreadyOpen`], [`Error::NotOpen`] - Handle opened twice or used before opening
/// - [`Error::ReadOnlyView`] - Mutation through a view mapped without write access
/// - [`Error::UnsupportedEncoding`] - Text operation with an encoding that cannot be encoded
/// - [`Error::EmptyStore`] - Mapping a zero-length file without a maximum size
/// - [`Error::NoBackingStore`] - File operation on an anonymous region
///
/// # Examples
///
/// ```rust,no_run
/// use mapregion::{Config, Error, MappedRegion};
///
/// let mut region = MappedRegion::new(Config {
///     path: Some("data.bin".into()),
///     ..Config::default()
/// })?;
///
/// match region.open() {
///     Ok(()) => println!("mapped {} bytes", region.max_size()),
///     Err(Error::EmptyStore) => eprintln!("nothing to map"),
///     Err(Error::Os { operation, source }) => eprintln!("{operation} failed: {source}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # Ok::<(), mapregion::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A cursor or offset argument lies outside the permitted range.
    ///
    /// Raised for positions outside `[0, Size]` of the current view or `[0, MaxSize]` of the
    /// region. This always indicates a programming error in the caller.
    ///
    /// # Fields
    ///
    /// * `message` - What was out of range
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Invalid position - {file}:{line}: {message}")]
    InvalidPosition {
        /// The message to be printed for the InvalidPosition error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted on the mapped view.
    #[error("Out of Bound access would have occurred!")]
    OutOfBounds,

    /// A platform call failed.
    ///
    /// Carries the name of the failing operation and the underlying I/O error, whose
    /// [`std::io::Error::raw_os_error`] holds the system error code.
    #[error("{operation} failed: {source}")]
    Os {
        /// The platform operation that failed
        operation: &'static str,
        /// The error reported by the operating system
        #[source]
        source: io::Error,
    },

    /// Growing an anonymous region failed after its content was staged to a temporary file.
    ///
    /// The staged file is left in place since it may hold the only copy of the region's content.
    /// The region keeps track of it until the exit guard closes the region, which removes it;
    /// a region dropped before that leaves the file to the caller.
    #[error("Resizing failed, staged content remains at {}: {source}", path.display())]
    Staging {
        /// Location of the staging file
        path: PathBuf,
        /// The error that interrupted the resize
        #[source]
        source: Box<Error>,
    },

    /// Attempted to open a resource that is already open.
    #[error("The {0} is already open")]
    AlreadyOpen(Resource),

    /// Attempted to use a resource that has not been opened.
    #[error("The {0} is not open")]
    NotOpen(Resource),

    /// Attempted to mutate content through a view that was mapped read-only.
    #[error("The current view is not writable")]
    ReadOnlyView,

    /// The configured encoding is recognized but cannot be encoded or decoded.
    #[error("Encoding {0} is not supported for text operations")]
    UnsupportedEncoding(Encoding),

    /// The backing file is empty and no maximum size was configured.
    ///
    /// A mapping object cannot have zero capacity.
    #[error("Cannot map an empty file without a maximum size")]
    EmptyStore,

    /// The operation needs a backing file but the region is anonymous.
    #[error("The region has no backing file")]
    NoBackingStore,

    /// The pattern used for a bounded cut failed to compile.
    #[error("{0}")]
    Pattern(#[from] regex::Error),

    /// Failed to lock target.
    ///
    /// The handle set of a region is guarded so the exit hook can reach it; a poisoned guard
    /// surfaces as this error.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns the operating system error code behind this error, if any.
    ///
    /// Staging errors report the code of the error that interrupted the resize.
    #[must_use]
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Error::Os { source, .. } => source.raw_os_error(),
            Error::Staging { source, .. } => source.os_code(),
            _ => None,
        }
    }

    /// Returns `true` for errors caused by calling an operation in the wrong state.
    #[must_use]
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            Error::AlreadyOpen(_)
                | Error::NotOpen(_)
                | Error::ReadOnlyView
                | Error::UnsupportedEncoding(_)
                | Error::EmptyStore
                | Error::NoBackingStore
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_position_carries_location() {
        let error = invalid_position!("cursor {} outside view of {} bytes", 10, 4);
        match error {
            Error::InvalidPosition {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "cursor 10 outside view of 4 bytes");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            _ => panic!("Expected InvalidPosition"),
        }
    }

    #[test]
    fn os_code_passthrough() {
        let error = os_error!("MapView", io::Error::from_raw_os_error(5));
        assert_eq!(error.os_code(), Some(5));
        assert!(error.to_string().starts_with("MapView failed"));

        let staged = Error::Staging {
            path: PathBuf::from("/tmp/stage.bin"),
            source: Box::new(error),
        };
        assert_eq!(staged.os_code(), Some(5));
        assert!(staged.to_string().contains("/tmp/stage.bin"));
    }

    #[test]
    fn protocol_misuse_classification() {
        assert!(Error::AlreadyOpen(Resource::View).is_protocol_misuse());
        assert!(Error::NotOpen(Resource::Mapping).is_protocol_misuse());
        assert!(!Error::OutOfBounds.is_protocol_misuse());
        assert!(!invalid_position!("x").is_protocol_misuse());
    }
}
