//! Page-by-page streaming over a region.
//!
//! [`ViewEnumerator`] walks a region from offset 0 to `max_size` in windows of a fixed number of
//! pages, mapping one window at a time. Between steps the window is the region's current view,
//! so the usual read operations apply through [`ViewEnumerator::region`].
//!
//! # Examples
//!
//! ```rust
//! use mapregion::{Config, Encoding, MappedRegion};
//!
//! let mut region = MappedRegion::new(Config {
//!     encoding: Encoding::Utf8,
//!     max_size: 3 * 65_536,
//!     ..Config::default()
//! })?;
//! region.open()?;
//!
//! let mut total = 0;
//! let mut pages = region.pages(1)?;
//! while let Some(window) = pages.next() {
//!     let window = window?;
//!     total += pages.region().read_raw(window.len)?.len();
//! }
//! pages.restore()?;
//! assert_eq!(total, 3 * 65_536);
//! # Ok::<(), mapregion::Error>(())
//! ```

use super::MappedRegion;
use crate::{Error::NotOpen, Resource, Result};

/// Position of the view that was open before an enumeration started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSnapshot {
    /// Page index of the view start
    pub page: u64,
    /// View length in bytes
    pub size: usize,
    /// Cursor relative to the view start
    pub pos: usize,
}

/// One window produced by a [`ViewEnumerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Page index of the window start
    pub page: u64,
    /// Absolute offset of the window start
    pub offset: u64,
    /// Window length in bytes
    pub len: usize,
    /// The window ends at `max_size`
    pub last: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Streaming,
    Done,
}

/// Forward-only iterator mapping consecutive windows of a region.
///
/// Created by [`MappedRegion::pages`]. Each step replaces the region's view with the next window
/// and leaves the cursor at its start. The view that was open before is only brought back by
/// [`ViewEnumerator::restore`].
#[derive(Debug)]
pub struct ViewEnumerator<'a> {
    region: &'a mut MappedRegion,
    pages_per_step: u64,
    next_page: u64,
    state: State,
    snapshot: Option<ViewSnapshot>,
}

impl MappedRegion {
    /// Starts streaming the region in windows of `pages_per_step` pages.
    ///
    /// Closes the current view, remembering it for [`ViewEnumerator::restore`].
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if `pages_per_step` is 0 and
    /// [`crate::Error::NotOpen`] without a mapping.
    pub fn pages(&mut self, pages_per_step: u64) -> Result<ViewEnumerator<'_>> {
        if pages_per_step == 0 {
            return Err(invalid_position!("an enumeration step needs at least one page"));
        }
        if !self.is_mapping_open() {
            return Err(NotOpen(Resource::Mapping));
        }

        let snapshot = self.is_view_open().then_some(ViewSnapshot {
            page: self.page,
            size: self.size,
            pos: self.pos,
        });
        self.close_view()?;

        Ok(ViewEnumerator {
            region: self,
            pages_per_step,
            next_page: 0,
            state: State::NotStarted,
            snapshot,
        })
    }
}

impl ViewEnumerator<'_> {
    /// The region, with the current window as its view.
    pub fn region(&mut self) -> &mut MappedRegion {
        &mut *self.region
    }

    /// The view that was open when the enumeration started, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<ViewSnapshot> {
        self.snapshot
    }

    /// Ends the enumeration and reopens the view that was open before it started.
    ///
    /// Without such a view, the current window is closed.
    ///
    /// # Errors
    /// Returns [`crate::Error::Os`] if the view cannot be mapped again.
    pub fn restore(self) -> Result<()> {
        let region = self.region;
        region.close_view()?;

        let Some(snapshot) = self.snapshot else {
            return Ok(());
        };
        let start = snapshot.page * region.granularity;
        if start >= region.max_size {
            return Ok(());
        }

        let end = (start + snapshot.size as u64).min(region.max_size);
        region.map_window(snapshot.page, end.max(start + 1))?;
        region.pos = snapshot.pos.min(region.size);
        Ok(())
    }

    fn step(&mut self) -> Result<PageWindow> {
        let region = &mut *self.region;
        let page = self.next_page;
        let offset = page * region.granularity;
        let end = offset
            .saturating_add(self.pages_per_step.saturating_mul(region.granularity))
            .min(region.max_size);

        region.map_window(page, end)?;
        region.pos = 0;
        self.next_page = page + self.pages_per_step;

        Ok(PageWindow {
            page,
            offset,
            len: region.size,
            last: end == region.max_size,
        })
    }
}

impl Iterator for ViewEnumerator<'_> {
    type Item = Result<PageWindow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Done
            || self.next_page.saturating_mul(self.region.granularity) >= self.region.max_size
        {
            self.state = State::Done;
            return None;
        }

        self.state = State::Streaming;
        match self.step() {
            Ok(window) => {
                if window.last {
                    self.state = State::Done;
                }
                Some(Ok(window))
            }
            Err(error) => {
                self.state = State::Done;
                Some(Err(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{platform::Native, Config, Encoding, Error, InstanceRegistry, MappedRegion};

    fn region(max_size: u64) -> MappedRegion {
        let mut region = MappedRegion::with_platform(
            Config {
                max_size,
                encoding: Encoding::Latin1,
                auto_exit_guard: false,
                ..Config::default()
            },
            Arc::new(Native::new()),
            Arc::new(InstanceRegistry::new()),
        )
        .unwrap();
        region.open().unwrap();
        region
    }

    #[test]
    fn windows_cover_region() {
        let mut region = region(0);
        let g = region.granularity();
        region.resize(3 * g + 100).unwrap();

        let windows: Vec<_> = region.pages(2).unwrap().map(Result::unwrap).collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].offset, 0);
        assert_eq!(windows[0].len as u64, 2 * g);
        assert!(!windows[0].last);
        assert_eq!(windows[1].page, 2);
        assert_eq!(windows[1].len as u64, g + 100);
        assert!(windows[1].last);
    }

    #[test]
    fn single_window_is_last() {
        let mut region = region(500);
        let mut pages = region.pages(4).unwrap();
        let window = pages.next().unwrap().unwrap();
        assert_eq!(window.len, 500);
        assert!(window.last);
        assert!(pages.next().is_none());
        assert!(pages.next().is_none());
    }

    #[test]
    fn restore_reopens_snapshot() {
        let mut region = region(0);
        let g = region.granularity();
        region.resize(4 * g).unwrap();
        region.open_view(g + 5, Some(10), false).unwrap();

        let mut pages = region.pages(1).unwrap();
        assert_eq!(
            pages.snapshot().map(|s| (s.page, s.size, s.pos)),
            Some((1, 15, 5))
        );
        pages.next().unwrap().unwrap();
        assert_eq!(pages.region().page(), 0);
        pages.restore().unwrap();

        assert_eq!(region.page(), 1);
        assert_eq!(region.pos(), 5);
        assert_eq!(region.tell(), g + 5);
    }

    #[test]
    fn zero_step_rejected() {
        let mut region = region(500);
        assert!(matches!(region.pages(0), Err(Error::InvalidPosition { .. })));
    }
}
