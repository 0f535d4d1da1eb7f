//! Native platform backend built on `memmap2` and `std::fs`.
//!
//! Views are memory maps of a file. For file-backed regions that file is the store itself. For
//! anonymous regions it is a file in shared memory (`/dev/shm` where available, the temp directory
//! otherwise):
//!
//! - **Unnamed** - an unlinked temporary file, private to the mapping object and its views
//! - **Named** - a file named after the sanitized mapping name, so that another process creating
//!   a mapping with the same name maps the same pages. The process that created the file removes
//!   it when its mapping object is dropped.

use std::{
    fs,
    io::{self, ErrorKind},
    ops::Range,
    path::{Path, PathBuf},
};

use memmap2::MmapOptions;

use super::{
    Access, CreationDisposition, MappingObject, Platform, Protection, StoreOptions, View,
};
use crate::{
    time::{FileTime, FileTimes},
    Result,
};

#[cfg(windows)]
const WINDOWS_GRANULARITY: u64 = 65_536;

/// The default [`Platform`] of this crate.
///
/// # Examples
///
/// ```rust
/// use mapregion::platform::{Native, Platform};
///
/// let native = Native::new();
/// assert!(native.allocation_granularity().is_power_of_two());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Native {
    granularity: u64,
}

impl Native {
    /// Creates a backend using the operating system's allocation granularity.
    #[must_use]
    pub fn new() -> Self {
        Native {
            granularity: os_granularity(),
        }
    }

    /// Creates a backend with a coarser allocation granularity.
    ///
    /// # Arguments
    /// * `granularity` - View alignment in bytes, a non-zero multiple of the operating system's
    ///   allocation granularity
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if `granularity` is not such a multiple.
    pub fn with_granularity(granularity: u64) -> Result<Self> {
        let os = os_granularity();
        if granularity == 0 || granularity % os != 0 {
            return Err(invalid_position!(
                "granularity {granularity} is not a multiple of the system granularity {os}"
            ));
        }

        Ok(Native { granularity })
    }
}

impl Default for Native {
    fn default() -> Self {
        Native::new()
    }
}

impl Platform for Native {
    fn allocation_granularity(&self) -> u64 {
        self.granularity
    }

    fn open_store(&self, path: &Path, options: &StoreOptions) -> Result<fs::File> {
        let mut open = fs::OpenOptions::new();
        open.read(options.access.contains(Access::READ) || !options.access.contains(Access::WRITE))
            .write(options.access.contains(Access::WRITE));

        match options.creation {
            CreationDisposition::CreateNew => open.create_new(true),
            CreationDisposition::CreateAlways => open.create(true).truncate(true),
            CreationDisposition::OpenExisting => &mut open,
            CreationDisposition::OpenAlways => open.create(true),
            CreationDisposition::TruncateExisting => open.truncate(true),
        };

        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            open.share_mode(options.share_mode.bits());
        }

        let file = open
            .open(path)
            .map_err(|source| os_error!("CreateFile", source))?;

        log::debug!("opened store {} ({:?})", path.display(), options.creation);
        Ok(file)
    }

    fn store_size(&self, store: &fs::File) -> Result<u64> {
        store
            .metadata()
            .map(|metadata| metadata.len())
            .map_err(|source| os_error!("GetFileSize", source))
    }

    fn flush_store(&self, store: &fs::File) -> Result<()> {
        store
            .sync_all()
            .map_err(|source| os_error!("FlushFileBuffers", source))
    }

    fn create_mapping(
        &self,
        store: Option<&fs::File>,
        protection: Protection,
        max_size: u64,
        name: Option<&str>,
    ) -> Result<MappingObject> {
        if max_size == 0 {
            return Err(invalid_position!("a mapping object cannot be empty"));
        }

        let (file, owned_path) = match store {
            Some(store) => {
                let file = store
                    .try_clone()
                    .map_err(|source| os_error!("DuplicateHandle", source))?;
                let len = self.store_size(&file)?;
                if len < max_size {
                    if !protection.writes_through() {
                        return Err(os_error!(
                            "CreateFileMapping",
                            io::Error::new(
                                ErrorKind::InvalidInput,
                                format!("cannot extend a read-only file of {len} bytes to {max_size}")
                            )
                        ));
                    }
                    file.set_len(max_size)
                        .map_err(|source| os_error!("SetEndOfFile", source))?;
                }
                (file, None)
            }
            None => match name {
                Some(name) => shared_file(name, max_size)?,
                None => {
                    let file = tempfile::tempfile_in(shared_dir())
                        .map_err(|source| os_error!("CreateFileMapping", source))?;
                    file.set_len(max_size)
                        .map_err(|source| os_error!("CreateFileMapping", source))?;
                    (file, None)
                }
            },
        };

        log::debug!(
            "created mapping object of {max_size} bytes ({protection:?}, {})",
            name.unwrap_or(if store.is_some() { "file" } else { "anonymous" })
        );
        Ok(MappingObject::new(
            file,
            max_size,
            protection,
            name.map(str::to_owned),
            owned_path,
        ))
    }

    fn map_view(
        &self,
        mapping: &MappingObject,
        access: Access,
        offset: u64,
        len: usize,
    ) -> Result<View> {
        if offset % self.granularity != 0 {
            return Err(invalid_position!(
                "view offset {offset} is not aligned to {}",
                self.granularity
            ));
        }
        let end = offset.checked_add(len as u64);
        if len == 0 || end.map_or(true, |end| end > mapping.max_size()) {
            return Err(invalid_position!(
                "view {offset}+{len} outside mapping of {} bytes",
                mapping.max_size()
            ));
        }

        let mut options = MmapOptions::new();
        options.offset(offset).len(len);
        let file = mapping.file();
        let protection = mapping.protection();

        // SAFETY: the mapped file is owned by the mapping object and only resized through
        // `create_mapping`, which the region never calls while a view is alive.
        let view = if access.contains(Access::COPY) || protection == Protection::WriteCopy {
            View::writable(offset, unsafe { options.map_copy(file) }
                .map_err(|source| os_error!("MapViewOfFile", source))?)
        } else if access.contains(Access::WRITE) {
            if !protection.is_writable() {
                return Err(os_error!(
                    "MapViewOfFile",
                    io::Error::new(ErrorKind::PermissionDenied, "mapping object is read-only")
                ));
            }
            View::writable(offset, unsafe { options.map_mut(file) }
                .map_err(|source| os_error!("MapViewOfFile", source))?)
        } else if access.contains(Access::EXECUTE) {
            View::read_only(offset, unsafe { options.map_exec(file) }
                .map_err(|source| os_error!("MapViewOfFile", source))?)
        } else {
            View::read_only(offset, unsafe { options.map(file) }
                .map_err(|source| os_error!("MapViewOfFile", source))?)
        };

        log::trace!("mapped view {offset}+{len}");
        Ok(view)
    }

    fn flush_view(&self, view: &View, range: Option<Range<usize>>) -> Result<()> {
        if let Some(range) = &range {
            if range.start > range.end || range.end > view.len() {
                return Err(invalid_position!(
                    "flush range {range:?} outside view of {} bytes",
                    view.len()
                ));
            }
        }

        view.flush(range)
            .map_err(|source| os_error!("FlushViewOfFile", source))
    }

    fn file_times(&self, store: &fs::File) -> Result<FileTimes> {
        let metadata = store
            .metadata()
            .map_err(|source| os_error!("GetFileTime", source))?;

        Ok(FileTimes {
            created: metadata.created().ok().map(FileTime::from),
            accessed: metadata.accessed().ok().map(FileTime::from),
            written: metadata.modified().ok().map(FileTime::from),
        })
    }

    fn set_file_times(&self, store: &fs::File, times: &FileTimes) -> Result<()> {
        let mut update = fs::FileTimes::new();
        if let Some(accessed) = times.accessed {
            update = update.set_accessed(accessed.to_system_time());
        }
        if let Some(written) = times.written {
            update = update.set_modified(written.to_system_time());
        }
        if let Some(created) = times.created {
            #[cfg(windows)]
            {
                use std::os::windows::fs::FileTimesExt;
                update = update.set_created(created.to_system_time());
            }
            #[cfg(not(windows))]
            log::debug!("creation time {} not settable here, ignored", created.ticks());
        }

        store
            .set_times(update)
            .map_err(|source| os_error!("SetFileTime", source))
    }
}

#[cfg(unix)]
fn os_granularity() -> u64 {
    // SAFETY: sysconf has no preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size).ok().filter(|&size| size > 0).unwrap_or(4096)
}

#[cfg(windows)]
fn os_granularity() -> u64 {
    WINDOWS_GRANULARITY
}

#[cfg(not(any(unix, windows)))]
fn os_granularity() -> u64 {
    4096
}

fn shared_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if cfg!(target_os = "linux") && shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// File name for a mapping name; path separators and other unusual characters become `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn shared_file(name: &str, max_size: u64) -> Result<(fs::File, Option<PathBuf>)> {
    let path = shared_dir().join(format!("mapregion-{}", sanitize(name)));

    match fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => {
            if let Err(source) = file.set_len(max_size) {
                let _ = fs::remove_file(&path);
                return Err(os_error!("CreateFileMapping", source));
            }
            Ok((file, Some(path)))
        }
        Err(error) if error.kind() == ErrorKind::AlreadyExists => {
            let file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|source| os_error!("OpenFileMapping", source))?;
            let len = file
                .metadata()
                .map_err(|source| os_error!("OpenFileMapping", source))?
                .len();
            if len < max_size {
                file.set_len(max_size)
                    .map_err(|source| os_error!("CreateFileMapping", source))?;
            }
            log::debug!("joined existing shared mapping {}", path.display());
            Ok((file, None))
        }
        Err(source) => Err(os_error!("CreateFileMapping", source)),
    }
}
