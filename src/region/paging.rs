//! View placement, capacity checks and the resize protocol.

use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use super::{Handles, MappedRegion};
use crate::{
    platform::Access,
    utils::{aligned_start, double_until, page_of, to_usize},
    Error::{NotOpen, Staging},
    Resource, Result,
};

impl MappedRegion {
    /// Maps a view covering `byte_count` bytes from `offset`, releasing any open view first.
    ///
    /// The view starts at the page containing `offset`, so it also covers the bytes between the
    /// page start and `offset`. Without `byte_count` it extends to the end of the region. A range
    /// ending past `max_size` is truncated, unless `grow` is set, in which case the region's
    /// capacity is doubled until it fits. On page 0, the cursor skips the byte-order mark unless
    /// it was positioned explicitly.
    ///
    /// # Arguments
    /// * `offset` - Absolute offset the cursor will point at
    /// * `byte_count` - Bytes needed from `offset`, `None` for the rest of the region
    /// * `grow` - Permit growing the region to fit the range
    ///
    /// # Errors
    /// Returns [`crate::Error::NotOpen`] without a mapping, [`crate::Error::InvalidPosition`] if
    /// `offset` lies beyond `max_size` and growth is not permitted, and [`crate::Error::Os`] if the
    /// view cannot be mapped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mapregion::{Config, MappedRegion};
    ///
    /// let mut region = MappedRegion::new(Config { max_size: 1 << 20, ..Config::default() })?;
    /// region.open_mapping()?;
    ///
    /// let granularity = region.granularity();
    /// region.open_view(granularity + 10, Some(100), false)?;
    /// assert_eq!(region.view_start(), granularity);
    /// assert_eq!(region.pos(), 10);
    /// assert_eq!(region.size(), 110);
    /// # Ok::<(), mapregion::Error>(())
    /// ```
    pub fn open_view(&mut self, offset: u64, byte_count: Option<usize>, grow: bool) -> Result<()> {
        if !self.is_mapping_open() {
            return Err(NotOpen(Resource::Mapping));
        }

        let aligned = aligned_start(offset, self.granularity);
        let end = match byte_count {
            Some(count) => offset
                .checked_add(count as u64)
                .ok_or_else(|| invalid_position!("view {offset}+{count} overflows"))?,
            None => self.max_size.max(offset),
        };

        if end > self.max_size || offset > self.max_size {
            if grow {
                self.grow_to(end)?;
            } else if offset > self.max_size {
                return Err(invalid_position!(
                    "offset {offset} beyond region of {} bytes",
                    self.max_size
                ));
            }
        }

        log::trace!("open view at {offset} (page start {aligned}, end {end})");
        self.map_range(offset, end.min(self.max_size))?;
        if self.page == 0 && self.pos == 0 && !self.positioned {
            self.pos = self.start_byte.min(self.size);
        }
        Ok(())
    }

    /// Re-creates the mapping object with a capacity of `new_max_size` bytes.
    ///
    /// File-backed regions flush and remap the file, extending it as needed. Anonymous regions
    /// stage their content to a temporary file and copy it into the new mapping. The view is
    /// reopened at its previous page where it still exists, keeping the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotOpen`] without a mapping, [`crate::Error::Os`] if a platform
    /// call fails and [`crate::Error::Staging`] if an anonymous resize fails after staging.
    pub fn resize(&mut self, new_max_size: u64) -> Result<()> {
        if new_max_size == 0 {
            return Err(invalid_position!("a region cannot shrink to zero bytes"));
        }
        if !self.is_mapping_open() {
            return Err(NotOpen(Resource::Mapping));
        }

        let (page, pos, size) = (self.page, self.pos, self.size);
        let had_view = self.is_view_open();
        self.reload(new_max_size)?;

        if had_view {
            let start = page * self.granularity;
            if start < self.max_size {
                let end = (start + size as u64).min(self.max_size).max(start + 1);
                self.map_window(page, end)?;
                self.pos = pos.min(self.size);
            } else {
                self.map_window(0, self.max_size.min(self.granularity))?;
                self.pos = self.start_byte.min(self.size);
            }
        }
        Ok(())
    }

    /// Makes sure the view covers `len` bytes from the cursor.
    ///
    /// Returns `false`, changing nothing, if the range exceeds `max_size` and `grow` is not set.
    pub(crate) fn ensure(&mut self, len: u64, grow: bool) -> Result<bool> {
        if !self.is_mapping_open() {
            return Err(NotOpen(Resource::Mapping));
        }

        let cursor = self.tell();
        let end = cursor
            .checked_add(len)
            .ok_or_else(|| invalid_position!("range {cursor}+{len} overflows"))?;

        let start = self.view_start();
        if self.is_view_open() && cursor >= start && end <= start + self.size as u64 {
            return Ok(true);
        }

        if end > self.max_size {
            if !grow {
                log::trace!("range {cursor}..{end} exceeds {} bytes", self.max_size);
                return Ok(false);
            }
            self.grow_to(end)?;
        }

        log::trace!("re-paging for range {cursor}..{end}");
        self.map_range(cursor, end)?;
        Ok(true)
    }

    /// Doubles `max_size` until it reaches `required` and resizes.
    pub(crate) fn grow_to(&mut self, required: u64) -> Result<()> {
        if required <= self.max_size {
            return Ok(());
        }

        let new_max_size = double_until(self.max_size, required).ok_or_else(|| {
            invalid_position!("cannot grow {} bytes to hold {required}", self.max_size)
        })?;
        self.reload(new_max_size)
    }

    /// Maps `[aligned(offset), end)` and points the cursor at `offset`.
    pub(crate) fn map_range(&mut self, offset: u64, end: u64) -> Result<()> {
        let mut page = page_of(offset, self.granularity);
        let mut end = end.max(offset).min(self.max_size);
        let aligned = page * self.granularity;

        // A view cannot be empty
        if end == aligned {
            if aligned < self.max_size {
                end = (aligned + self.granularity).min(self.max_size);
            } else {
                page -= 1;
            }
        }

        self.map_window(page, end)?;
        self.pos = to_usize(offset - self.view_start())?;
        Ok(())
    }

    /// Maps `[page * granularity, end)` as the current view.
    ///
    /// The cursor is left to the caller. Mapping page 0 records the byte-order mark.
    pub(crate) fn map_window(&mut self, page: u64, end: u64) -> Result<()> {
        let start = page * self.granularity;
        let len = to_usize(end.saturating_sub(start))?;
        let access = self.view_access();

        let mut handles = lock!(self.handles);
        handles.view = None;
        self.size = 0;

        let mapping = handles.mapping.as_ref().ok_or(NotOpen(Resource::Mapping))?;
        let view = self.platform.map_view(mapping, access, start, len)?;
        if page == 0 {
            self.start_byte = self.config.encoding.bom_len(view.as_slice());
        }

        handles.view = Some(view);
        self.page = page;
        self.size = len;
        Ok(())
    }

    /// Replaces the mapping object with one of `new_max_size` bytes and leaves no view open.
    fn reload(&mut self, new_max_size: u64) -> Result<()> {
        let old_max_size = self.max_size;
        let mut handles = lock!(self.handles);

        if handles.store.is_some() {
            if let Some(view) = &handles.view {
                self.platform.flush_view(view, None)?;
            }
            if let Some(store) = &handles.store {
                self.platform.flush_store(store)?;
            }

            handles.view = None;
            handles.mapping = None;
            self.size = 0;
            handles.mapping = Some(self.platform.create_mapping(
                handles.store.as_ref(),
                self.config.protection,
                new_max_size,
                self.mapping_name.as_deref(),
            )?);
            log::debug!("resized file mapping from {old_max_size} to {new_max_size} bytes");
        } else {
            handles.view = None;
            self.size = 0;

            let path = self.stage(&handles, old_max_size)?;
            if let Some(stale) = handles.staging.replace(path.clone()) {
                log::warn!("staging file {} no longer tracked", stale.display());
            }
            handles.mapping = None;

            let restored =
                self.restore_staged(&mut handles, &path, old_max_size.min(new_max_size), new_max_size);
            match restored {
                Ok(()) => {
                    handles.staging = None;
                    if let Err(error) = fs::remove_file(&path) {
                        log::warn!("staging file {} not removed: {error}", path.display());
                    }
                }
                Err(error) => {
                    // Stays tracked so the exit guard removes it if the caller does not
                    log::warn!("resize failed, content kept in {}", path.display());
                    return Err(Staging {
                        path,
                        source: Box::new(error),
                    });
                }
            }
            log::debug!(
                "resized anonymous mapping from {old_max_size} to {new_max_size} bytes via {}",
                path.display()
            );
        }

        self.max_size = new_max_size;
        Ok(())
    }

    /// Writes the first `len` bytes of the mapping to a new temporary file.
    fn stage(&self, handles: &Handles, len: u64) -> Result<PathBuf> {
        let mapping = handles.mapping.as_ref().ok_or(NotOpen(Resource::Mapping))?;
        let view = self
            .platform
            .map_view(mapping, Access::READ, 0, to_usize(len)?)?;

        let mut staged = tempfile::Builder::new()
            .prefix("mapregion-")
            .suffix(".stage")
            .tempfile()
            .map_err(|source| os_error!("CreateFile", source))?;
        staged
            .write_all(view.as_slice())
            .and_then(|()| staged.flush())
            .map_err(|source| os_error!("WriteFile", source))?;

        let (_, path) = staged
            .keep()
            .map_err(|error| os_error!("CreateFile", error.error))?;
        Ok(path)
    }

    /// Creates the resized anonymous mapping and copies `len` staged bytes back into it.
    fn restore_staged(
        &self,
        handles: &mut Handles,
        path: &Path,
        len: u64,
        new_max_size: u64,
    ) -> Result<()> {
        let mapping = self.platform.create_mapping(
            None,
            self.config.protection,
            new_max_size,
            self.mapping_name.as_deref(),
        )?;

        {
            let mut view =
                self.platform
                    .map_view(&mapping, Access::READ | Access::WRITE, 0, to_usize(len)?)?;
            let mut staged = fs::File::open(path).map_err(|source| os_error!("OpenFile", source))?;
            staged
                .read_exact(view.as_mut_slice()?)
                .map_err(|source| os_error!("ReadFile", source))?;
            self.platform.flush_view(&view, None)?;
        }

        handles.mapping = Some(mapping);
        Ok(())
    }
}
