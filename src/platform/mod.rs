//! Operating system file and memory-mapping services.
//!
//! A [`crate::MappedRegion`] never talks to the operating system directly. Every file, mapping
//! and view operation goes through the [`Platform`] trait, which keeps the paging and editing
//! logic independent of how the host maps memory.
//!
//! # Architecture
//!
//! The platform hands out three kinds of RAII handles, matching the three tiers a region owns:
//!
//! - **Backing store** - a [`std::fs::File`], opened per [`StoreOptions`]
//! - **Mapping object** - a [`MappingObject`] of fixed maximum size, created over a store or over
//!   anonymous memory
//! - **View** - a [`View`], one mapped window of a mapping object
//!
//! Closing a handle is dropping it. A view borrows nothing from its mapping object, so either can
//! be released first, although a region always releases views before mappings.
//!
//! # Key Components
//!
//! - [`Platform`] - Trait for host mapping services
//! - [`Native`] - Default implementation built on `memmap2` and `std::fs`
//! - [`Access`], [`ShareMode`], [`Protection`], [`CreationDisposition`] - Open parameters
//!
//! # Examples
//!
//! ```rust,no_run
//! use mapregion::platform::{Access, Native, Platform, Protection};
//!
//! let native = Native::new();
//! let mapping = native.create_mapping(None, Protection::ReadWrite, 1 << 20, None)?;
//! let granularity = native.allocation_granularity();
//!
//! let mut view = native.map_view(&mapping, Access::READ | Access::WRITE, granularity, 16)?;
//! view.as_mut_slice()?[0] = 0x42;
//! native.flush_view(&view, None)?;
//! # Ok::<(), mapregion::Error>(())
//! ```

mod native;

pub use native::Native;

use std::{fmt, fs, ops::Range, path::Path, path::PathBuf, time::SystemTime};

use bitflags::bitflags;
use memmap2::{Mmap, MmapMut};

use crate::{time::FileTimes, Error::ReadOnlyView, Result};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Access rights requested for the backing file and for mapped views
    pub struct Access: u32 {
        /// Read access
        const READ = 0x0001;
        /// Write access
        const WRITE = 0x0002;
        /// Execute access, views only
        const EXECUTE = 0x0004;
        /// Copy-on-write views; changes never reach the mapping object
        const COPY = 0x0008;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Sharing permitted to other openers of the backing file (honoured on Windows)
    pub struct ShareMode: u32 {
        /// Others may open for reading
        const READ = 0x0001;
        /// Others may open for writing
        const WRITE = 0x0002;
        /// Others may delete or rename
        const DELETE = 0x0004;
    }
}

/// Page protection of a mapping object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protection {
    /// Views may only be read
    ReadOnly,
    /// Views may be read and written
    #[default]
    ReadWrite,
    /// Views are private copies; writes never reach the store
    WriteCopy,
    /// Views may be read and executed
    ExecuteRead,
    /// Views may be read, written and executed
    ExecuteReadWrite,
}

impl Protection {
    /// Returns `true` if views of a mapping with this protection may be written.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Protection::ReadWrite | Protection::WriteCopy | Protection::ExecuteReadWrite
        )
    }

    /// Returns `true` if writes through views would reach the store.
    #[must_use]
    pub fn writes_through(self) -> bool {
        matches!(self, Protection::ReadWrite | Protection::ExecuteReadWrite)
    }
}

/// What to do when the backing file does or does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CreationDisposition {
    /// Create a new file, fail if it exists
    CreateNew,
    /// Create a new file, truncating any existing one
    CreateAlways,
    /// Open an existing file, fail if it does not exist
    OpenExisting,
    /// Open the file, creating it if it does not exist
    #[default]
    OpenAlways,
    /// Open an existing file and truncate it to zero length
    TruncateExisting,
}

/// Parameters for opening a backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Requested access rights
    pub access: Access,
    /// Sharing permitted to other openers
    pub share_mode: ShareMode,
    /// Creation behaviour
    pub creation: CreationDisposition,
}

/// Host file and memory-mapping services consumed by [`crate::MappedRegion`].
///
/// All implementations must be thread-safe, so one platform instance can serve any number of
/// regions.
pub trait Platform: Send + Sync + fmt::Debug {
    /// The alignment every view offset must be a multiple of.
    fn allocation_granularity(&self) -> u64;

    /// Opens or creates the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the file cannot be opened.
    fn open_store(&self, path: &Path, options: &StoreOptions) -> Result<fs::File>;

    /// Current size of a store in bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the size cannot be queried.
    fn store_size(&self, store: &fs::File) -> Result<u64>;

    /// Forces buffered writes of a store to disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the flush fails.
    fn flush_store(&self, store: &fs::File) -> Result<()>;

    /// Creates a mapping object of `max_size` bytes.
    ///
    /// Without a store the mapping is backed by anonymous memory. A `name` makes an anonymous
    /// mapping reachable from other processes that create a mapping with the same name. When
    /// `max_size` exceeds the store size and the protection is writable, the store is extended.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the mapping cannot be created.
    fn create_mapping(
        &self,
        store: Option<&fs::File>,
        protection: Protection,
        max_size: u64,
        name: Option<&str>,
    ) -> Result<MappingObject>;

    /// Maps `len` bytes of `mapping` starting at `offset`.
    ///
    /// `offset` must be a multiple of [`Platform::allocation_granularity`] and the range must lie
    /// within the mapping.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] for misaligned or out-of-range requests and
    /// [`crate::Error::Os`] if the view cannot be mapped.
    fn map_view(
        &self,
        mapping: &MappingObject,
        access: Access,
        offset: u64,
        len: usize,
    ) -> Result<View>;

    /// Flushes modified pages of a view, optionally limited to `range` (relative to the view).
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the flush fails.
    fn flush_view(&self, view: &View, range: Option<Range<usize>>) -> Result<()>;

    /// Reads the timestamps of a store. Timestamps the host does not track are `None`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the metadata cannot be read.
    fn file_times(&self, store: &fs::File) -> Result<FileTimes>;

    /// Sets the timestamps of a store; `None` fields are left unchanged.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the timestamps cannot be set.
    fn set_file_times(&self, store: &fs::File, times: &FileTimes) -> Result<()>;

    /// The current system time.
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A fixed-size, sharable address range created by [`Platform::create_mapping`].
#[derive(Debug)]
pub struct MappingObject {
    /// File the views are mapped from: the store itself or anonymous shared memory
    file: fs::File,
    /// Capacity in bytes
    max_size: u64,
    /// Page protection
    protection: Protection,
    /// Name other processes can use to reach the mapping
    name: Option<String>,
    /// Shared-memory file to remove once this mapping object is closed
    owned_path: Option<PathBuf>,
}

impl MappingObject {
    /// Wraps `file` as a mapping object. `owned_path` is removed when the object is dropped.
    #[must_use]
    pub fn new(
        file: fs::File,
        max_size: u64,
        protection: Protection,
        name: Option<String>,
        owned_path: Option<PathBuf>,
    ) -> Self {
        MappingObject {
            file,
            max_size,
            protection,
            name,
            owned_path,
        }
    }

    /// Capacity of the mapping in bytes.
    #[must_use]
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Page protection of the mapping.
    #[must_use]
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Name of the mapping, if it is shared by name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The file views are mapped from.
    #[must_use]
    pub fn file(&self) -> &fs::File {
        &self.file
    }
}

impl Drop for MappingObject {
    fn drop(&mut self) {
        if let Some(path) = self.owned_path.take() {
            if let Err(error) = fs::remove_file(&path) {
                log::debug!("shared mapping file {} not removed: {error}", path.display());
            }
        }
    }
}

#[derive(Debug)]
enum ViewData {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

/// One mapped window of a [`MappingObject`].
#[derive(Debug)]
pub struct View {
    /// Offset of the window within the mapping
    offset: u64,
    data: ViewData,
}

impl View {
    pub(crate) fn read_only(offset: u64, map: Mmap) -> Self {
        View {
            offset,
            data: ViewData::ReadOnly(map),
        }
    }

    pub(crate) fn writable(offset: u64, map: MmapMut) -> Self {
        View {
            offset,
            data: ViewData::Writable(map),
        }
    }

    /// Offset of the window within its mapping object.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the window in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns `true` if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the window may be written.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        matches!(self.data, ViewData::Writable(_))
    }

    /// The mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match &self.data {
            ViewData::ReadOnly(map) => map.as_ref(),
            ViewData::Writable(map) => map.as_ref(),
        }
    }

    /// The mapped bytes, for writing.
    ///
    /// # Errors
    /// Returns [`crate::Error::ReadOnlyView`] if the view was mapped without write access.
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        match &mut self.data {
            ViewData::ReadOnly(_) => Err(ReadOnlyView),
            ViewData::Writable(map) => Ok(map.as_mut()),
        }
    }

    pub(crate) fn flush(&self, range: Option<Range<usize>>) -> std::io::Result<()> {
        match (&self.data, range) {
            (ViewData::ReadOnly(_), _) => Ok(()),
            (ViewData::Writable(map), None) => map.flush(),
            (ViewData::Writable(map), Some(range)) => {
                map.flush_range(range.start, range.end.saturating_sub(range.start))
            }
        }
    }
}
