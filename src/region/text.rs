//! Encoding-aware reads, writes and edits at the cursor.
//!
//! Lengths are counted in code units of the configured encoding: bytes for UTF-8 and Latin-1,
//! 16-bit units for UTF-16. A zero code unit terminates text.

use std::ops::Range;

use regex::Regex;

use super::MappedRegion;
use crate::{
    utils::to_usize,
    Encoding,
    Error::{OutOfBounds, UnsupportedEncoding},
    Result,
};

impl MappedRegion {
    /// Reads text at the cursor, up to a terminator, `max_chars` code units or `max_size`.
    ///
    /// Returns the text and the number of code units consumed; the cursor advances by that
    /// many, stopping in front of the terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedEncoding`] for UTF-16BE and [`crate::Error::NotOpen`]
    /// without a mapping.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mapregion::{Config, MappedRegion};
    ///
    /// let mut region = MappedRegion::new(Config { max_size: 256, ..Config::default() })?;
    /// region.open()?;
    /// region.write("first", false, true)?;
    ///
    /// region.rewind()?;
    /// assert_eq!(region.read(Some(3))?, ("fir".to_string(), 3));
    /// assert_eq!(region.read(None)?, ("st".to_string(), 2));
    /// # Ok::<(), mapregion::Error>(())
    /// ```
    pub fn read(&mut self, max_chars: Option<usize>) -> Result<(String, usize)> {
        let encoding = self.text_encoding()?;
        let width = encoding.bytes_per_char() as u64;

        let available = self.max_size.saturating_sub(self.tell());
        let limit = max_chars.map_or(available, |chars| {
            (chars as u64).saturating_mul(width).min(available)
        });
        let limit = limit - limit % width;
        if limit == 0 {
            return Ok((String::new(), 0));
        }

        let len = match self.find_terminator(limit)? {
            Some(len) => len,
            None => to_usize(limit)?,
        };
        let bytes = self.view_bytes(len)?;
        let text = encoding.decode(&bytes)?;

        self.pos += len;
        Ok((text, len / width as usize))
    }

    /// Writes `text` at the cursor and advances past it.
    ///
    /// With `terminate`, a zero code unit follows the text; the cursor stays in front of it.
    /// Returns the code units written, 0 if the text does not fit and `grow` is not set. Empty
    /// text writes nothing, not even a terminator.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedEncoding`] for UTF-16BE,
    /// [`crate::Error::ReadOnlyView`] for read-only views and [`crate::Error::Os`] if re-paging
    /// or growing fails.
    pub fn write(&mut self, text: &str, grow: bool, terminate: bool) -> Result<usize> {
        let encoding = self.text_encoding()?;
        let width = encoding.bytes_per_char();
        let bytes = encoding.encode(text)?;

        if bytes.is_empty() {
            return Ok(0);
        }
        let needed = bytes.len() + if terminate { width } else { 0 };
        if !self.ensure(needed as u64, grow)? {
            return Ok(0);
        }

        self.with_block(|block, pos| {
            block.copy_in(pos, &bytes)?;
            if terminate {
                block.fill(pos + bytes.len(), width, 0)?;
            }
            Ok(())
        })?;
        self.pos += bytes.len();
        Ok(bytes.len() / width)
    }

    /// Inserts `content` at the cursor, shifting the rest of the region right, and advances
    /// past it. Text shifted beyond `max_size` is lost.
    ///
    /// Returns the code units inserted, 0 if the content does not fit and `grow` is not set.
    ///
    /// # Errors
    /// Same as [`MappedRegion::write`].
    pub fn insert(&mut self, content: &str, grow: bool) -> Result<usize> {
        let encoding = self.text_encoding()?;
        let bytes = encoding.encode(content)?;
        if bytes.is_empty() {
            return Ok(0);
        }

        Ok(self
            .replace_bytes(&bytes, 0, grow, None, false)?
            .map_or(0, |_| bytes.len() / encoding.bytes_per_char()))
    }

    /// Inserts `content` in front of the cursor's terminated text, shifting only that text.
    ///
    /// The text from the cursor up to and including its terminator moves right; anything after
    /// the terminator is untouched. Without a terminator the region end takes its place, which
    /// requires `grow`, and a terminator is written. Returns the new absolute offset of the
    /// terminator, `None` if nothing changed for lack of room.
    ///
    /// # Errors
    /// Same as [`MappedRegion::write`].
    pub fn insert_terminated(&mut self, content: &str, grow: bool) -> Result<Option<u64>> {
        let encoding = self.text_encoding()?;
        let width = encoding.bytes_per_char();
        let bytes = encoding.encode(content)?;

        let cursor = self.tell();
        let limit = self.max_size.saturating_sub(cursor);
        let tail = match self.find_terminator(limit)? {
            Some(offset) => offset as u64,
            None if grow => limit - limit % width as u64,
            None => return Ok(None),
        };

        let needed = tail + (bytes.len() + width) as u64;
        if !self.ensure(needed, grow)? {
            return Ok(None);
        }

        let tail_len = to_usize(tail)?;
        self.with_block(|block, pos| {
            block.move_within(pos..pos + tail_len, pos + bytes.len())?;
            block.copy_in(pos, &bytes)?;
            block.fill(pos + bytes.len() + tail_len, width, 0)
        })?;
        self.pos += bytes.len();
        Ok(Some(cursor + bytes.len() as u64 + tail))
    }

    /// Removes text at the cursor and returns it.
    ///
    /// The removed run ends at the nearest of `length` code units, a terminator and `end`
    /// (absolute, `max_size` by default). Text up to `end` shifts left to close the gap; with
    /// `terminate` the vacated bytes in front of `end` are zeroed. The cursor does not move.
    /// Returns an empty string if nothing was removed.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if `end` lies before the cursor or beyond
    /// `max_size`, and the errors of [`MappedRegion::write`].
    pub fn cut(&mut self, length: Option<usize>, end: Option<u64>, terminate: bool) -> Result<String> {
        let encoding = self.text_encoding()?;
        let width = encoding.bytes_per_char() as u64;

        let end = self.bounded_end(end)?;
        let span = end - self.tell();
        let limit = length.map_or(span, |chars| (chars as u64).saturating_mul(width).min(span));
        let limit = limit - limit % width;
        if limit == 0 {
            return Ok(String::new());
        }

        let run = match self.find_terminator(limit)? {
            Some(run) => run,
            None => to_usize(limit)?,
        };
        if run == 0 {
            return Ok(String::new());
        }

        let removed = self.remove_bytes(run, span, terminate)?;
        encoding.decode(&removed)
    }

    /// Removes the text from the cursor up to the first match of `pattern`.
    ///
    /// The text is searched page by page from the cursor up to `end`. With `include_match` the
    /// match itself is removed too. Shifting and `terminate` behave as in
    /// [`MappedRegion::cut`]. Returns an empty string if there is no match.
    ///
    /// # Errors
    /// Same as [`MappedRegion::cut`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mapregion::{Config, Encoding, MappedRegion};
    /// use regex::Regex;
    ///
    /// let mut region = MappedRegion::new(Config {
    ///     encoding: Encoding::Utf8,
    ///     max_size: 64,
    ///     ..Config::default()
    /// })?;
    /// region.open()?;
    /// region.write("skip this; keep", false, true)?;
    ///
    /// region.rewind()?;
    /// let removed = region.cut_pattern(&Regex::new(r";\s*")?, true, None, true)?;
    /// assert_eq!(removed, "skip this; ");
    /// assert_eq!(region.read(None)?.0, "keep");
    /// # Ok::<(), mapregion::Error>(())
    /// ```
    pub fn cut_pattern(
        &mut self,
        pattern: &Regex,
        include_match: bool,
        end: Option<u64>,
        terminate: bool,
    ) -> Result<String> {
        let encoding = self.text_encoding()?;
        let end = self.bounded_end(end)?;
        let span = end - self.tell();
        if span == 0 {
            return Ok(String::new());
        }

        // UTF-8 is matched on the raw bytes so invalid sequences keep their length
        let raw = match encoding {
            Encoding::Utf8 => Some(regex::bytes::Regex::new(pattern.as_str())?),
            _ => None,
        };

        let mut window = self.granularity.min(span);
        let run = loop {
            self.ensure(window, false)?;
            let bytes = self.view_bytes(to_usize(window)?)?;
            let found = match &raw {
                Some(raw) => raw.find(&bytes).map(|found| found.range()),
                None => find_decoded(encoding, pattern, &bytes)?,
            };

            if let Some(found) = found {
                // A match touching the window edge may continue on the next page
                if found.end < bytes.len() || window == span {
                    let boundary = if include_match { found.end } else { found.start };
                    break boundary.min(bytes.len());
                }
            }

            if window == span {
                return Ok(String::new());
            }
            window = window.saturating_add(self.granularity).min(span);
        };

        if run == 0 {
            return Ok(String::new());
        }
        let removed = self.remove_bytes(run, span, terminate)?;
        encoding.decode(&removed)
    }

    /// Replaces `span` code units at the cursor with `content` and advances past it.
    ///
    /// Longer content shifts the rest of the region right, like [`MappedRegion::insert`].
    /// Shorter content shifts the text up to `end` left, zeroing the vacated bytes with
    /// `terminate`. Returns the size change in code units, `None` if the content does not fit and
    /// `grow` is not set.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidPosition`] if the span or `end` lies outside the region,
    /// and the errors of [`MappedRegion::write`].
    pub fn replace(
        &mut self,
        content: &str,
        span: usize,
        grow: bool,
        end: Option<u64>,
        terminate: bool,
    ) -> Result<Option<isize>> {
        let encoding = self.text_encoding()?;
        let width = encoding.bytes_per_char();
        let bytes = encoding.encode(content)?;
        let span = span
            .checked_mul(width)
            .ok_or_else(|| invalid_position!("span of {span} characters overflows"))?;

        Ok(self
            .replace_bytes(&bytes, span, grow, end, terminate)?
            .map(|delta| delta / width as isize))
    }

    fn text_encoding(&self) -> Result<Encoding> {
        let encoding = self.config.encoding;
        if encoding.is_supported() {
            Ok(encoding)
        } else {
            Err(UnsupportedEncoding(encoding))
        }
    }

    /// Offset of the first terminator within `limit` bytes of the cursor.
    ///
    /// The current view is searched first; the view is only extended if it ends too early.
    fn find_terminator(&mut self, limit: u64) -> Result<Option<usize>> {
        let encoding = self.config.encoding;
        let cursor = self.tell();
        let start = self.view_start();
        let view_end = start + self.size as u64;

        if self.is_view_open() && cursor >= start && cursor <= view_end {
            let visible = to_usize((view_end - cursor).min(limit))?;
            let found = self.with_view(|view, pos| {
                view.get(pos..pos + visible)
                    .and_then(|bytes| encoding.terminator(bytes))
            })?;
            if found.is_some() || visible as u64 == limit {
                return Ok(found);
            }
        }

        self.ensure(limit, false)?;
        let limit = to_usize(limit)?;
        self.with_view(|view, pos| {
            view.get(pos..pos + limit)
                .and_then(|bytes| encoding.terminator(bytes))
        })
    }

    fn view_bytes(&self, len: usize) -> Result<Vec<u8>> {
        self.with_view(|view, pos| view.get(pos..pos + len).map(<[u8]>::to_vec))?
            .ok_or(OutOfBounds)
    }
}

/// Byte range of the first match of `pattern` in `bytes` decoded as `encoding`.
///
/// Each decoded char, a replacement char included, stands for one code unit, or two for
/// UTF-16 surrogate pairs.
fn find_decoded(encoding: Encoding, pattern: &Regex, bytes: &[u8]) -> Result<Option<Range<usize>>> {
    let text = encoding.decode(bytes)?;
    let width = encoding.bytes_per_char();
    let offset = |boundary: usize| text[..boundary].encode_utf16().count() * width;

    Ok(pattern
        .find(&text)
        .map(|found| offset(found.start())..offset(found.end())))
}
