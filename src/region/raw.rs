//! Byte-exact reads, writes and edits at the cursor.

use std::cmp::Ordering;

use super::MappedRegion;
use crate::{
    utils::{io, to_usize, RegionIO},
    Error::OutOfBounds,
    Result,
};

impl MappedRegion {
    /// Reads up to `len` bytes at the cursor and advances past them.
    ///
    /// The read stops at `max_size`; the view is re-paged to cover the whole range first.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotOpen`] without a mapping and [`crate::Error::Os`] if
    /// re-paging fails.
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let available = self.max_size.saturating_sub(self.tell());
        let len = to_usize((len as u64).min(available))?;
        if len == 0 {
            return Ok(Vec::new());
        }

        self.ensure(len as u64, false)?;
        let bytes = self
            .with_view(|view, pos| view.get(pos..pos + len).map(<[u8]>::to_vec))?
            .ok_or(OutOfBounds)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Writes `bytes` at the cursor and advances past them.
    ///
    /// Returns the number of bytes written, 0 if they do not fit and `grow` is not set.
    ///
    /// # Errors
    /// Returns [`crate::Error::ReadOnlyView`] for read-only views and [`crate::Error::Os`] if
    /// re-paging or growing fails.
    pub fn write_raw(&mut self, bytes: &[u8], grow: bool) -> Result<usize> {
        if bytes.is_empty() || !self.ensure(bytes.len() as u64, grow)? {
            return Ok(0);
        }

        self.with_block(|block, pos| block.copy_in(pos, bytes))?;
        self.pos += bytes.len();
        Ok(bytes.len())
    }

    /// Inserts `bytes` at the cursor, shifting the rest of the region right, and advances past
    /// them. Bytes shifted beyond `max_size` are lost.
    ///
    /// Returns the number of bytes inserted, 0 if they do not fit and `grow` is not set.
    ///
    /// # Errors
    /// Same as [`MappedRegion::write_raw`].
    pub fn insert_raw(&mut self, bytes: &[u8], grow: bool) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }

        Ok(self
            .replace_bytes(bytes, 0, grow, None, false)?
            .map_or(0, |_| bytes.len()))
    }

    /// Removes up to `len` bytes at the cursor and returns them.
    ///
    /// The bytes up to `end` (absolute, `max_size` by default) shift left to close the gap;
    /// the vacated bytes before `end` keep their old values. The cursor does not move.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if `end` lies before the cursor or beyond
    /// `max_size`.
    pub fn cut_raw(&mut self, len: usize, end: Option<u64>) -> Result<Vec<u8>> {
        let end = self.bounded_end(end)?;
        let span = end - self.tell();
        let run = to_usize((len as u64).min(span))?;
        if run == 0 {
            return Ok(Vec::new());
        }

        self.remove_bytes(run, span, false)
    }

    /// Replaces `span` bytes at the cursor with `bytes` and advances past them.
    ///
    /// Longer content shifts the rest of the region right, like an insert. Shorter content
    /// shifts the bytes up to `end` left. Returns the size change in bytes, `None` if the
    /// content does not fit and `grow` is not set.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if the span or `end` lies outside the region.
    pub fn replace_raw(
        &mut self,
        bytes: &[u8],
        span: usize,
        grow: bool,
        end: Option<u64>,
    ) -> Result<Option<isize>> {
        self.replace_bytes(bytes, span, grow, end, false)
    }

    /// Reads a little-endian value at the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value would extend past `max_size`.
    pub fn read_le<T: RegionIO>(&mut self) -> Result<T> {
        let bytes = self.read_value_bytes::<T>()?;
        io::read_le(&bytes)
    }

    /// Reads a big-endian value at the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the value would extend past `max_size`.
    pub fn read_be<T: RegionIO>(&mut self) -> Result<T> {
        let bytes = self.read_value_bytes::<T>()?;
        io::read_be(&bytes)
    }

    /// Writes a little-endian value at the cursor; returns the bytes written (0 without room).
    ///
    /// # Errors
    /// Same as [`MappedRegion::write_raw`].
    pub fn write_le<T: RegionIO>(&mut self, value: T, grow: bool) -> Result<usize> {
        self.write_raw(value.to_le_bytes().as_ref(), grow)
    }

    /// Writes a big-endian value at the cursor; returns the bytes written (0 without room).
    ///
    /// # Errors
    /// Same as [`MappedRegion::write_raw`].
    pub fn write_be<T: RegionIO>(&mut self, value: T, grow: bool) -> Result<usize> {
        self.write_raw(value.to_be_bytes().as_ref(), grow)
    }

    fn read_value_bytes<T: RegionIO>(&mut self) -> Result<Vec<u8>> {
        let len = std::mem::size_of::<T>();
        if self.max_size.saturating_sub(self.tell()) < len as u64 {
            return Err(OutOfBounds);
        }
        self.read_raw(len)
    }

    /// Resolves an optional absolute end offset, which must lie between cursor and `max_size`.
    pub(crate) fn bounded_end(&self, end: Option<u64>) -> Result<u64> {
        let cursor = self.tell();
        let end = end.unwrap_or(self.max_size);
        if end < cursor || end > self.max_size {
            return Err(invalid_position!(
                "end {end} outside {cursor}..={}",
                self.max_size
            ));
        }
        Ok(end)
    }

    /// Copies out `run` bytes at the cursor and shifts `[cursor + run, cursor + span)` onto the
    /// cursor, zeroing the vacated bytes when `terminate` is set.
    pub(crate) fn remove_bytes(&mut self, run: usize, span: u64, terminate: bool) -> Result<Vec<u8>> {
        self.ensure(span, false)?;
        let span = to_usize(span)?;

        self.with_block(|block, pos| {
            let removed = block.copy_out(pos, run)?;
            block.move_within(pos + run..pos + span, pos)?;
            if terminate {
                block.fill(pos + span - run, run, 0)?;
            }
            Ok(removed)
        })
    }

    /// Overwrites `span` bytes at the cursor with `bytes`, shifting whatever follows by the
    /// difference, and advances past `bytes`.
    pub(crate) fn replace_bytes(
        &mut self,
        bytes: &[u8],
        span: usize,
        grow: bool,
        end: Option<u64>,
        terminate: bool,
    ) -> Result<Option<isize>> {
        let cursor = self.tell();
        let len = bytes.len();
        if cursor.saturating_add(span as u64) > self.max_size {
            return Err(invalid_position!(
                "span {cursor}+{span} beyond region of {} bytes",
                self.max_size
            ));
        }
        let delta = isize::try_from(len)
            .ok()
            .zip(isize::try_from(span).ok())
            .map(|(len, span)| len - span)
            .ok_or_else(|| invalid_position!("span {span} or content {len} too large"))?;

        match len.cmp(&span) {
            Ordering::Greater => {
                let required = cursor + len as u64;
                if required > self.max_size {
                    if !grow {
                        return Ok(None);
                    }
                    self.grow_to(required)?;
                }

                // The view must reach max_size so the whole tail moves
                self.ensure(self.max_size - cursor, false)?;
                let shift = len - span;
                self.with_block(|block, pos| {
                    let tail_end = block.len() - shift;
                    block.move_within(pos + span..tail_end, pos + len)?;
                    block.copy_in(pos, bytes)
                })?;
            }
            Ordering::Less => {
                let end = self.bounded_end(end)?;
                let limit = end - cursor;
                if limit < span as u64 {
                    return Err(invalid_position!("end {end} inside the replaced span"));
                }

                self.ensure(limit, false)?;
                let limit = to_usize(limit)?;
                let shrink = span - len;
                self.with_block(|block, pos| {
                    block.copy_in(pos, bytes)?;
                    block.move_within(pos + span..pos + limit, pos + len)?;
                    if terminate {
                        block.fill(pos + limit - shrink, shrink, 0)?;
                    }
                    Ok(())
                })?;
            }
            Ordering::Equal => {
                if len > 0 {
                    self.ensure(len as u64, false)?;
                    self.with_block(|block, pos| block.copy_in(pos, bytes))?;
                }
            }
        }

        self.pos += len;
        Ok(Some(delta))
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

    fn content(region: &mut MappedRegion, len: usize) -> Vec<u8> {
        region.seek(0).unwrap();
        region.read_raw(len).unwrap()
    }

    #[test]
    fn write_read() {
        let mut region = region(64);
        assert_eq!(region.write_raw(b"0123456789", false).unwrap(), 10);
        assert_eq!(region.tell(), 10);
        assert_eq!(content(&mut region, 10), b"0123456789");

        region.seek(60).unwrap();
        assert_eq!(region.read_raw(100).unwrap().len(), 4);
        assert_eq!(region.write_raw(b"12345", false).unwrap(), 0);
        assert_eq!(region.max_size(), 64);
    }

    #[test]
    fn insert_shifts_tail() {
        let mut region = region(16);
        region.write_raw(b"abcdefghijklmnop", false).unwrap();
        region.seek(4).unwrap();
        assert_eq!(region.insert_raw(b"XY", false).unwrap(), 2);
        assert_eq!(region.tell(), 6);
        // the last two bytes fall off the end
        assert_eq!(content(&mut region, 16), b"abcdXYefghijklmn");
    }

    #[test]
    fn insert_grows() {
        let mut region = region(16);
        region.write_raw(b"abcdefghijklmnop", false).unwrap();
        region.seek(16).unwrap();
        assert_eq!(region.insert_raw(b"q", false).unwrap(), 0);
        assert_eq!(region.insert_raw(b"q", true).unwrap(), 1);
        assert_eq!(region.max_size(), 32);
        assert_eq!(content(&mut region, 17), b"abcdefghijklmnopq");
    }

    #[test]
    fn cut_closes_gap() {
        let mut region = region(16);
        region.write_raw(b"abcdefghij", false).unwrap();
        region.seek(2).unwrap();
        assert_eq!(region.cut_raw(3, Some(10)).unwrap(), b"cde");
        assert_eq!(region.tell(), 2);
        // bytes vacated before the end keep their old value
        assert_eq!(content(&mut region, 10), b"abfghijhij");

        region.seek(4).unwrap();
        assert!(region.cut_raw(1, Some(3)).is_err());
        assert!(region.cut_raw(1, Some(17)).is_err());
        assert!(region.cut_raw(0, None).unwrap().is_empty());
    }

    #[test]
    fn replace_deltas() {
        let mut region = region(32);
        region.write_raw(b"key=value;rest", false).unwrap();

        region.seek(4).unwrap();
        assert_eq!(region.replace_raw(b"longer-value", 5, false, None).unwrap(), Some(7));
        assert_eq!(region.tell(), 16);
        assert_eq!(content(&mut region, 21), b"key=longer-value;rest");

        region.seek(4).unwrap();
        assert_eq!(region.replace_raw(b"v", 12, false, Some(21)).unwrap(), Some(-11));
        assert_eq!(content(&mut region, 10), b"key=v;rest");

        region.seek(0).unwrap();
        assert_eq!(region.replace_raw(b"KEY", 3, false, None).unwrap(), Some(0));
        assert_eq!(content(&mut region, 3), b"KEY");

        region.seek(30).unwrap();
        assert_eq!(region.replace_raw(b"abcd", 1, false, None).unwrap(), None);
        assert!(region.replace_raw(b"a", 3, false, None).is_err());
    }

    #[test]
    fn numbers() {
        let mut region = region(16);
        region.write_le(0x1122_3344_u32, false).unwrap();
        region.write_be(-2_i16, false).unwrap();
        region.write_le(1.5_f64, false).unwrap();

        region.seek(0).unwrap();
        assert_eq!(region.read_le::<u32>().unwrap(), 0x1122_3344);
        assert_eq!(region.read_be::<i16>().unwrap(), -2);
        assert_eq!(region.read_le::<f64>().unwrap(), 1.5);
        assert_eq!(region.tell(), 14);
        assert!(matches!(region.read_le::<u32>(), Err(Error::OutOfBounds)));
        assert_eq!(region.tell(), 14);
    }
}
