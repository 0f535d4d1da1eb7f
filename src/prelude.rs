//! # mapregion Prelude
//!
//! The types needed for everyday region work, for glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all mapregion operations
pub use crate::Error;

/// The result type used throughout mapregion
pub use crate::Result;

/// Handle tier named in open and close errors
pub use crate::Resource;

// ================================================================================================
// Regions
// ================================================================================================

/// The region, its configuration and mapping names
pub use crate::{Config, MappedRegion, MappingName};

/// Page streaming
pub use crate::{PageWindow, ViewEnumerator, ViewSnapshot};

/// Exit guard registry
pub use crate::InstanceRegistry;

// ================================================================================================
// Platform
// ================================================================================================

/// Open parameters and the host mapping services
pub use crate::platform::{Access, CreationDisposition, Native, Platform, Protection, ShareMode};

// ================================================================================================
// Encodings, Timestamps and Binary I/O
// ================================================================================================

/// Text encodings and byte-order mark detection
pub use crate::{detect_bom, Encoding};

/// File timestamps
pub use crate::time::{FileTime, FileTimes, SystemTimeParts};

/// Primitive values readable and writable at the cursor
pub use crate::utils::RegionIO;
