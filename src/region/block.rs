//! Bounds-checked byte moves within a mapped view.

use std::ops::Range;

use crate::{Error::OutOfBounds, Result};

/// A mutable window of view bytes that checks every range once before touching it.
pub(crate) struct Block<'a> {
    data: &'a mut [u8],
}

impl<'a> Block<'a> {
    pub(crate) fn new(data: &'a mut [u8]) -> Self {
        Block { data }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    fn range(&self, start: usize, len: usize) -> Result<Range<usize>> {
        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(OutOfBounds),
        }
    }

    /// Moves `src` so it starts at `dest`; the ranges may overlap.
    pub(crate) fn move_within(&mut self, src: Range<usize>, dest: usize) -> Result<()> {
        if src.start > src.end {
            return Err(OutOfBounds);
        }
        let len = src.end - src.start;
        self.range(src.start, len)?;
        self.range(dest, len)?;

        self.data.copy_within(src, dest);
        Ok(())
    }

    pub(crate) fn copy_out(&self, start: usize, len: usize) -> Result<Vec<u8>> {
        let range = self.range(start, len)?;
        Ok(self.data[range].to_vec())
    }

    pub(crate) fn copy_in(&mut self, start: usize, bytes: &[u8]) -> Result<()> {
        let range = self.range(start, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn fill(&mut self, start: usize, len: usize, value: u8) -> Result<()> {
        let range = self.range(start, len)?;
        self.data[range].fill(value);
        Ok(())
    }
}
