// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'platform/native.rs' uses mmap to map views and sysconf for the page size
// - 'registry.rs' registers the exit hook through atexit

//! # mapregion
//!
//! A paged, growable, in-place-editable view over memory-mapped storage. `mapregion` treats a
//! file, or anonymous shared memory, as one continuous buffer with a cursor, while only ever
//! mapping a single page-aligned window of it. Content can be read, written, inserted, cut and
//! replaced at the cursor, as raw bytes or as text in the configured encoding, without loading
//! the whole object into memory.
//!
//! ## Features
//!
//! - **Transparent paging** - Operations re-map the view whenever they need bytes outside it
//! - **Growth on demand** - Capacity doubles to fit writes when the caller allows it; anonymous
//!   content survives the resize through a staging file
//! - **Text editing** - Insert, cut (by length, terminator or pattern) and replace in UTF-8,
//!   UTF-16LE or Latin-1, with byte-order mark detection
//! - **Streaming** - Walk a region window by window with [`ViewEnumerator`]
//! - **Exit guard** - Regions that are never dropped are still flushed and closed at exit
//!
//! ## Quick Start
//!
//! ```rust
//! use mapregion::prelude::*;
//!
//! let mut region = MappedRegion::new(Config {
//!     max_size: 64,
//!     ..Config::default()
//! })?;
//! region.open()?;
//!
//! region.write("Hello, World", true, true)?;
//! region.seek(14)?; // UTF-16: after "Hello, "
//! region.replace("Rust", 5, true, None, true)?;
//!
//! region.rewind()?;
//! assert_eq!(region.read(None)?.0, "Hello, Rust");
//! # Ok::<(), mapregion::Error>(())
//! ```
//!
//! ### File-backed Regions
//!
//! ```rust,no_run
//! use mapregion::{Config, Encoding, MappedRegion};
//!
//! let mut region = MappedRegion::new(Config {
//!     path: Some("notes.txt".into()),
//!     encoding: Encoding::Utf8,
//!     ..Config::default()
//! })?;
//! region.open()?;
//!
//! // Growing extends the file
//! region.seek(region.max_size())?;
//! region.write("appended line\n", true, false)?;
//! region.flush_all()?;
//! # Ok::<(), mapregion::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`region`] - [`MappedRegion`], its configuration, and the page enumerator
//! - [`platform`] - The [`platform::Platform`] trait for host mapping services and its
//!   [`platform::Native`] implementation
//! - [`registry`] - [`InstanceRegistry`], the exit guard's table of live regions
//! - [`encoding`] - Encodings and byte-order marks
//! - [`time`] - File timestamp representations
//! - [`utils`] - Endian-aware value encoding and alignment arithmetic
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Running out of capacity is not an
//! error: writes and edits that do not fit without growth return `0`, an empty result or `None`
//! and leave the region untouched.
//!
//! ```rust
//! use mapregion::{Config, Encoding, MappedRegion};
//!
//! let mut region = MappedRegion::new(Config {
//!     encoding: Encoding::Utf8,
//!     max_size: 4,
//!     ..Config::default()
//! })?;
//! region.open()?;
//!
//! assert_eq!(region.write("too long", false, false)?, 0);
//! assert_eq!(region.write("too long", true, false)?, 8);
//! assert_eq!(region.max_size(), 8);
//! # Ok::<(), mapregion::Error>(())
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use mapregion::prelude::*;
///
/// let config = Config { encoding: Encoding::Utf8, ..Config::default() };
/// let region = MappedRegion::new(config)?;
/// assert!(!region.is_mapping_open());
/// # Ok::<(), mapregion::Error>(())
/// ```
pub mod prelude;

pub mod encoding;
pub mod platform;
pub mod region;
pub mod registry;
pub mod time;
pub mod utils;

/// `mapregion` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
///
/// ```rust
/// use mapregion::{MappedRegion, Result};
///
/// fn first_byte(region: &mut MappedRegion) -> Result<Option<u8>> {
///     region.seek(0)?;
///     Ok(region.read_raw(1)?.first().copied())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `mapregion` Error type
///
/// The error type for all operations in this crate. [`Resource`] names the handle tier in
/// open and close errors.
pub use error::{Error, Resource};

pub use encoding::{detect_bom, Encoding};
pub use region::{Config, MappedRegion, MappingName, PageWindow, ViewEnumerator, ViewSnapshot};
pub use registry::InstanceRegistry;
