//! Paged, growable views over memory-mapped storage.
//!
//! A [`MappedRegion`] presents a mapping object of `max_size` bytes as one continuous buffer with
//! a cursor, although only one page-aligned window (the *view*) of it is mapped at any time.
//! Every operation states the byte range it needs relative to the cursor; the region re-pages the
//! view when that range lies outside it, and grows the mapping object by doubling its capacity
//! when the range lies beyond `max_size` and the caller allows growth.
//!
//! # Architecture
//!
//! A region owns three tiers of handles, each acquired and released independently:
//!
//! 1. **Store** - the backing file, absent for anonymous regions
//! 2. **Mapping** - the fixed-capacity mapping object created over the store
//! 3. **View** - the currently mapped window
//!
//! Opening follows that order and closing the reverse; closing the store closes the mapping, and
//! closing the mapping closes the view. The handles sit behind a shared lock so an
//! [`crate::InstanceRegistry`] can close them when the process exits.
//!
//! # Cursor Model
//!
//! The cursor is kept relative to the view as `pos`, so the absolute offset is
//! `page * granularity + pos` ([`MappedRegion::tell`]). The first time page 0 is mapped, the
//! byte-order mark of the configured encoding is detected and the cursor placed after it,
//! unless the caller positioned it explicitly.
//!
//! # Capacity
//!
//! Running out of capacity without permission to grow is never an error. Such operations return
//! `0`, an empty result or `None` and leave the region untouched.
//!
//! # Examples
//!
//! ```rust
//! use mapregion::{Config, Encoding, MappedRegion};
//!
//! let mut region = MappedRegion::new(Config {
//!     encoding: Encoding::Utf8,
//!     max_size: 64,
//!     ..Config::default()
//! })?;
//! region.open()?;
//!
//! region.write("hello world", false, true)?;
//! region.rewind()?;
//! region.seek(6)?;
//! region.insert("big ", false)?;
//!
//! region.rewind()?;
//! let (text, _) = region.read(None)?;
//! assert_eq!(text, "hello big world");
//!
//! // 64 bytes are not enough, and growth was not requested
//! assert_eq!(region.write(&"x".repeat(100), false, false)?, 0);
//! # Ok::<(), mapregion::Error>(())
//! ```

mod block;
mod config;
mod enumerator;
mod paging;
mod raw;
mod text;

pub(crate) use block::Block;
pub use config::{Config, MappingName, DEFAULT_RANDOM_SUFFIX};
pub use enumerator::{PageWindow, ViewEnumerator, ViewSnapshot};

use std::{
    fs,
    ops::Range,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    platform::{Access, MappingObject, Native, Platform, View},
    registry::InstanceRegistry,
    time::{FileTime, FileTimes},
    Error::{AlreadyOpen, EmptyStore, NoBackingStore, NotOpen},
    Resource, Result,
};

/// The handle set of one region.
///
/// Shared with the instance registry, which holds it weakly so it can force-close it at exit.
#[derive(Debug, Default)]
pub(crate) struct Handles {
    pub(crate) store: Option<fs::File>,
    pub(crate) mapping: Option<MappingObject>,
    pub(crate) view: Option<View>,
    /// Staging file left behind by a failed anonymous resize
    pub(crate) staging: Option<PathBuf>,
}

impl Handles {
    /// Flushes and releases every handle, removing a tracked staging file.
    ///
    /// Returns `true` if anything was open or left behind.
    pub(crate) fn force_close(&mut self) -> bool {
        let was_open = self.store.is_some()
            || self.mapping.is_some()
            || self.view.is_some()
            || self.staging.is_some();

        if let Some(view) = self.view.take() {
            if let Err(error) = view.flush(None) {
                log::warn!("flushing view at {} failed: {error}", view.offset());
            }
        }
        self.mapping = None;
        if let Some(store) = self.store.take() {
            if let Err(error) = store.sync_all() {
                log::warn!("flushing store failed: {error}");
            }
        }
        if let Some(path) = self.staging.take() {
            if let Err(error) = fs::remove_file(&path) {
                log::warn!("staging file {} not removed: {error}", path.display());
            }
        }

        was_open
    }
}

/// A paged, growable, editable view over a memory-mapped file or anonymous memory.
///
/// See the [module documentation](self) for the paging and cursor model.
#[derive(Debug)]
pub struct MappedRegion {
    config: Config,
    platform: Arc<dyn Platform>,
    registry: Arc<InstanceRegistry>,
    /// Registry id while registered
    id: Option<u32>,
    handles: Arc<Mutex<Handles>>,
    granularity: u64,
    /// Resolved mapping name, fixed once the first mapping is created
    mapping_name: Option<String>,
    /// Page index of the view start
    page: u64,
    /// Cursor relative to the view start
    pos: usize,
    /// Length of the view in bytes, 0 while no view is open
    size: usize,
    /// Length of the byte-order mark found at offset 0
    start_byte: usize,
    max_size: u64,
    /// Cursor was placed by the caller, so the byte-order mark is not skipped
    positioned: bool,
    /// Configuration changed since the last mapping was created
    reconfigured: bool,
}

impl MappedRegion {
    /// Creates a closed region using the [`Native`] platform and the process-wide registry.
    ///
    /// Nothing is opened yet; call [`MappedRegion::open`] or the individual open methods.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if the platform reports a zero granularity.
    pub fn new(config: Config) -> Result<Self> {
        MappedRegion::with_platform(config, Arc::new(Native::new()), InstanceRegistry::global())
    }

    /// Creates a closed region on a specific platform and registry.
    ///
    /// # Arguments
    /// * `config` - Open parameters
    /// * `platform` - File and mapping services
    /// * `registry` - Registry to join when `config.auto_exit_guard` is set
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if the platform reports a zero granularity.
    pub fn with_platform(
        config: Config,
        platform: Arc<dyn Platform>,
        registry: Arc<InstanceRegistry>,
    ) -> Result<Self> {
        let granularity = platform.allocation_granularity();
        if granularity == 0 {
            return Err(invalid_position!("allocation granularity must not be zero"));
        }

        Ok(MappedRegion {
            max_size: config.max_size,
            config,
            platform,
            registry,
            id: None,
            handles: Arc::new(Mutex::new(Handles::default())),
            granularity,
            mapping_name: None,
            page: 0,
            pos: 0,
            size: 0,
            start_byte: 0,
            positioned: false,
            reconfigured: false,
        })
    }

    /// Opens whatever is not open yet: store, mapping, and a view of the whole region at
    /// offset 0.
    ///
    /// # Errors
    /// Returns the errors of [`MappedRegion::open_store`], [`MappedRegion::open_mapping`] and
    /// [`MappedRegion::open_view`].
    pub fn open(&mut self) -> Result<()> {
        if self.config.path.is_some() && !self.is_store_open() {
            self.open_store()?;
        }
        if !self.is_mapping_open() {
            self.open_mapping()?;
        }
        if !self.is_view_open() {
            self.open_view(0, None, false)?;
        }
        Ok(())
    }

    /// Opens the backing file. Does nothing for anonymous regions.
    ///
    /// # Errors
    /// Returns [`crate::Error::AlreadyOpen`] if the store is open and [`crate::Error::Os`] if
    /// the file cannot be opened.
    pub fn open_store(&mut self) -> Result<()> {
        let Some(path) = self.config.path.as_deref() else {
            return Ok(());
        };

        {
            let mut handles = lock!(self.handles);
            if handles.store.is_some() {
                return Err(AlreadyOpen(Resource::Store));
            }
            handles.store = Some(self.platform.open_store(path, &self.config.store_options())?);
        }

        self.register();
        Ok(())
    }

    /// Creates the mapping object.
    ///
    /// A configured `max_size` of 0 maps the whole file, or one page for anonymous regions. A
    /// `max_size` larger than the file extends it.
    ///
    /// # Errors
    /// Returns [`crate::Error::AlreadyOpen`] if a mapping is open, [`crate::Error::NotOpen`] if
    /// the region has a path but its store is closed, [`crate::Error::EmptyStore`] for an empty
    /// file without `max_size`, and [`crate::Error::Os`] if the mapping cannot be created.
    pub fn open_mapping(&mut self) -> Result<()> {
        if self.reconfigured {
            self.max_size = self.config.max_size;
            self.mapping_name = None;
            self.start_byte = 0;
            self.reconfigured = false;
        }

        {
            let mut handles = lock!(self.handles);
            if handles.mapping.is_some() {
                return Err(AlreadyOpen(Resource::Mapping));
            }
            if self.config.path.is_some() && handles.store.is_none() {
                return Err(NotOpen(Resource::Store));
            }

            let max_size = match (&handles.store, self.max_size) {
                (None, 0) => self.granularity,
                (Some(store), 0) => match self.platform.store_size(store)? {
                    0 => return Err(EmptyStore),
                    len => len,
                },
                (_, max_size) => max_size,
            };
            if self.mapping_name.is_none() {
                self.mapping_name = self.config.name.as_ref().map(MappingName::resolve);
            }

            handles.mapping = Some(self.platform.create_mapping(
                handles.store.as_ref(),
                self.config.protection,
                max_size,
                self.mapping_name.as_deref(),
            )?);
            self.max_size = max_size;
        }

        self.positioned = false;
        log::debug!("opened mapping of {} bytes", self.max_size);
        self.register();
        Ok(())
    }

    /// Releases the current view. Does nothing if no view is open.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the handle set is poisoned.
    pub fn close_view(&mut self) -> Result<()> {
        lock!(self.handles).view = None;
        self.size = 0;
        Ok(())
    }

    /// Releases the mapping object, closing the view first. Does nothing if it is not open.
    ///
    /// Anonymous content is lost once the last mapping object referring to it is closed.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the handle set is poisoned.
    pub fn close_mapping(&mut self) -> Result<()> {
        self.close_view()?;
        if lock!(self.handles).mapping.take().is_some() {
            log::debug!("closed mapping of {} bytes", self.max_size);
        }
        self.positioned = false;
        self.deregister_if_idle()
    }

    /// Closes the backing file, closing the mapping first. Does nothing if it is not open.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the handle set is poisoned.
    pub fn close_store(&mut self) -> Result<()> {
        self.close_mapping()?;
        lock!(self.handles).store = None;
        self.deregister_if_idle()
    }

    /// Closes every handle.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the handle set is poisoned.
    pub fn close(&mut self) -> Result<()> {
        self.close_store()
    }

    /// Returns `true` if the backing file is open.
    #[must_use]
    pub fn is_store_open(&self) -> bool {
        with_lock!(self.handles, |h: &mut Handles| h.store.is_some()).unwrap_or(false)
    }

    /// Returns `true` if the mapping object is open.
    #[must_use]
    pub fn is_mapping_open(&self) -> bool {
        with_lock!(self.handles, |h: &mut Handles| h.mapping.is_some()).unwrap_or(false)
    }

    /// Returns `true` if a view is mapped.
    #[must_use]
    pub fn is_view_open(&self) -> bool {
        with_lock!(self.handles, |h: &mut Handles| h.view.is_some()).unwrap_or(false)
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the configuration, for reuse of a closed region.
    ///
    /// Changes take effect when the store and mapping are opened next.
    ///
    /// # Errors
    /// Returns [`crate::Error::AlreadyOpen`] while the store or mapping is open.
    pub fn config_mut(&mut self) -> Result<&mut Config> {
        {
            let handles = lock!(self.handles);
            if handles.mapping.is_some() {
                return Err(AlreadyOpen(Resource::Mapping));
            }
            if handles.store.is_some() {
                return Err(AlreadyOpen(Resource::Store));
            }
        }

        self.reconfigured = true;
        Ok(&mut self.config)
    }

    /// Name of the mapping as resolved when it was first created.
    #[must_use]
    pub fn mapping_name(&self) -> Option<&str> {
        self.mapping_name.as_deref()
    }

    /// The allocation granularity views are aligned to.
    #[must_use]
    pub fn granularity(&self) -> u64 {
        self.granularity
    }

    /// Capacity of the mapping object in bytes.
    #[must_use]
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Width of one character in bytes, for the configured encoding.
    #[must_use]
    pub fn bytes_per_char(&self) -> usize {
        self.config.encoding.bytes_per_char()
    }

    /// Length of the byte-order mark found at the start of the region, 0 if none.
    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.start_byte
    }

    /// Page index of the view start.
    #[must_use]
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Absolute offset of the view start.
    #[must_use]
    pub fn view_start(&self) -> u64 {
        self.page * self.granularity
    }

    /// Length of the current view, 0 if none is open.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cursor relative to the view start.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Absolute cursor offset.
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.view_start() + self.pos as u64
    }

    /// Moves the cursor to an absolute offset, re-paging if it lies outside the view.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if `offset` exceeds `max_size` and
    /// [`crate::Error::NotOpen`] if the mapping is closed.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if !self.is_mapping_open() {
            return Err(NotOpen(Resource::Mapping));
        }
        if offset > self.max_size {
            return Err(invalid_position!(
                "offset {offset} beyond region of {} bytes",
                self.max_size
            ));
        }

        self.positioned = true;
        let start = self.view_start();
        if self.is_view_open() && offset >= start && offset <= start + self.size as u64 {
            self.pos = (offset - start) as usize;
            return Ok(());
        }

        let end = (crate::utils::aligned_start(offset, self.granularity) + self.granularity)
            .min(self.max_size)
            .max(offset);
        self.map_range(offset, end)
    }

    /// Moves the cursor within the current view.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotOpen`] without a view and
    /// [`crate::Error::InvalidPosition`] if `pos` exceeds the view size.
    pub fn set_pos(&mut self, pos: usize) -> Result<()> {
        if !self.is_view_open() {
            return Err(NotOpen(Resource::View));
        }
        if pos > self.size {
            return Err(invalid_position!(
                "position {pos} outside view of {} bytes",
                self.size
            ));
        }

        self.positioned = true;
        self.pos = pos;
        Ok(())
    }

    /// Moves the cursor to the start of the content, after the byte-order mark.
    ///
    /// # Errors
    /// Returns the errors of [`MappedRegion::seek`].
    pub fn rewind(&mut self) -> Result<()> {
        self.seek(self.start_byte as u64)
    }

    /// Runs `f` against the bytes of the current view and the cursor within it.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotOpen`] if no view is open.
    pub fn with_view<R>(&self, f: impl FnOnce(&[u8], usize) -> R) -> Result<R> {
        let handles = lock!(self.handles);
        let view = handles.view.as_ref().ok_or(NotOpen(Resource::View))?;
        Ok(f(view.as_slice(), self.pos))
    }

    pub(crate) fn with_block<R>(
        &self,
        f: impl FnOnce(&mut Block<'_>, usize) -> Result<R>,
    ) -> Result<R> {
        let mut handles = lock!(self.handles);
        let view = handles.view.as_mut().ok_or(NotOpen(Resource::View))?;
        let mut block = Block::new(view.as_mut_slice()?);
        f(&mut block, self.pos)
    }

    /// Flushes modified pages of the view, optionally only `range` (relative to the view start).
    ///
    /// # Errors
    /// Returns [`crate::Error::NotOpen`] without a view and [`crate::Error::Os`] if the flush
    /// fails.
    pub fn flush(&self, range: Option<Range<usize>>) -> Result<()> {
        let handles = lock!(self.handles);
        let view = handles.view.as_ref().ok_or(NotOpen(Resource::View))?;
        self.platform.flush_view(view, range)
    }

    /// Flushes the view, if any, and the buffers of the backing file, if any.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if a flush fails.
    pub fn flush_all(&self) -> Result<()> {
        let handles = lock!(self.handles);
        if let Some(view) = &handles.view {
            self.platform.flush_view(view, None)?;
        }
        if let Some(store) = &handles.store {
            self.platform.flush_store(store)?;
        }
        Ok(())
    }

    /// Timestamps of the backing file.
    ///
    /// # Errors
    /// Returns [`crate::Error::NoBackingStore`] for anonymous regions,
    /// [`crate::Error::NotOpen`] if the store is closed and [`crate::Error::Os`] on failure.
    pub fn file_times(&self) -> Result<FileTimes> {
        let handles = lock!(self.handles);
        let store = self.store_of(&handles)?;
        self.platform.file_times(store)
    }

    /// Sets timestamps of the backing file; `None` fields stay unchanged.
    ///
    /// # Errors
    /// Same as [`MappedRegion::file_times`].
    pub fn set_file_times(&self, times: &FileTimes) -> Result<()> {
        let handles = lock!(self.handles);
        let store = self.store_of(&handles)?;
        self.platform.set_file_times(store, times)
    }

    /// Sets the access and write times of the backing file to now.
    ///
    /// # Errors
    /// Same as [`MappedRegion::file_times`].
    pub fn touch(&self) -> Result<()> {
        let now = FileTime::from(self.platform.now());
        self.set_file_times(&FileTimes {
            created: None,
            accessed: Some(now),
            written: Some(now),
        })
    }

    fn store_of<'h>(&self, handles: &'h Handles) -> Result<&'h fs::File> {
        match (&handles.store, &self.config.path) {
            (Some(store), _) => Ok(store),
            (None, Some(_)) => Err(NotOpen(Resource::Store)),
            (None, None) => Err(NoBackingStore),
        }
    }

    /// Access rights for views, without write access when the protection forbids it.
    fn view_access(&self) -> Access {
        if self.config.protection.is_writable() {
            self.config.access
        } else {
            self.config.access - Access::WRITE
        }
    }

    fn register(&mut self) {
        if !self.config.auto_exit_guard {
            return;
        }
        // The registry forgets every region once it shuts down
        if self.id.is_some_and(|id| self.registry.contains(id)) {
            return;
        }

        let id = self.registry.register(Arc::downgrade(&self.handles));
        log::debug!("region registered as {id:#010x}");
        self.id = Some(id);
    }

    fn deregister_if_idle(&mut self) -> Result<()> {
        let idle = {
            let handles = lock!(self.handles);
            handles.store.is_none() && handles.mapping.is_none() && handles.staging.is_none()
        };

        if idle {
            if let Some(id) = self.id.take() {
                self.registry.deregister(id);
            }
        }
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            log::warn!("closing region failed: {error}");
            self.handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .force_close();
        }
        if let Some(id) = self.id.take() {
            self.registry.deregister(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Encoding, Error};

    fn anonymous(max_size: u64) -> MappedRegion {
        MappedRegion::with_platform(
            Config {
                max_size,
                encoding: Encoding::Utf8,
                auto_exit_guard: false,
                ..Config::default()
            },
            Arc::new(Native::new()),
            Arc::new(InstanceRegistry::new()),
        )
        .unwrap()
    }

    #[test]
    fn open_order() {
        let mut region = anonymous(0);
        assert!(matches!(region.open_view(0, None, false), Err(Error::NotOpen(Resource::Mapping))));

        region.open_store().unwrap();
        region.open_mapping().unwrap();
        assert_eq!(region.max_size(), region.granularity());
        assert!(matches!(region.open_mapping(), Err(Error::AlreadyOpen(Resource::Mapping))));

        region.open().unwrap();
        assert!(region.is_view_open());
        assert_eq!(region.size() as u64, region.max_size());
    }

    #[test]
    fn close_is_idempotent() {
        let mut region = anonymous(4096);
        region.open().unwrap();
        region.close_view().unwrap();
        region.close_view().unwrap();
        assert!(region.is_mapping_open());
        region.close().unwrap();
        region.close().unwrap();
        assert!(!region.is_mapping_open());
        assert_eq!(region.size(), 0);
    }

    #[test]
    fn config_mut_refused_while_open() {
        let mut region = anonymous(4096);
        region.open().unwrap();
        assert!(matches!(region.config_mut(), Err(Error::AlreadyOpen(Resource::Mapping))));

        region.close().unwrap();
        region.config_mut().unwrap().max_size = 8192;
        region.open().unwrap();
        assert_eq!(region.max_size(), 8192);
    }

    #[test]
    fn seek_bounds() {
        let mut region = anonymous(300);
        assert!(matches!(region.seek(0), Err(Error::NotOpen(Resource::Mapping))));
        region.open().unwrap();

        region.seek(300).unwrap();
        assert_eq!(region.tell(), 300);
        assert!(region.seek(301).is_err());
        assert!(region.set_pos(301).is_err());

        region.set_pos(10).unwrap();
        assert_eq!(region.tell(), 10);
    }

    #[test]
    fn anonymous_has_no_backing_store() {
        let mut region = anonymous(4096);
        region.open().unwrap();
        assert!(matches!(region.file_times(), Err(Error::NoBackingStore)));
        assert!(matches!(region.touch(), Err(Error::NoBackingStore)));
        region.flush_all().unwrap();
    }

    #[test]
    fn registers_with_exit_guard() {
        let registry = Arc::new(InstanceRegistry::new());
        let mut region = MappedRegion::with_platform(
            Config {
                max_size: 4096,
                ..Config::default()
            },
            Arc::new(Native::new()),
            Arc::clone(&registry),
        )
        .unwrap();

        assert!(registry.is_empty());
        region.open().unwrap();
        assert_eq!(registry.len(), 1);
        region.close().unwrap();
        assert!(registry.is_empty());

        region.open().unwrap();
        drop(region);
        assert!(registry.is_empty());
    }

    #[test]
    fn forced_close_releases_handles() {
        let registry = Arc::new(InstanceRegistry::new());
        let mut region = MappedRegion::with_platform(
            Config {
                max_size: 4096,
                ..Config::default()
            },
            Arc::new(Native::new()),
            Arc::clone(&registry),
        )
        .unwrap();
        region.open().unwrap();

        assert_eq!(registry.shutdown(), 1);
        assert!(!region.is_view_open());
        assert!(!region.is_mapping_open());
    }

    #[test]
    fn drop_releases_poisoned_handles() {
        let mut region = anonymous(4096);
        region.open().unwrap();

        let handles = Arc::clone(&region.handles);
        let poisoner = Arc::clone(&handles);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the handle set");
        })
        .join();
        assert!(handles.is_poisoned());

        drop(region);
        let handles = handles.lock().unwrap_or_else(PoisonError::into_inner);
        assert!(handles.view.is_none());
        assert!(handles.mapping.is_none());
    }
}
