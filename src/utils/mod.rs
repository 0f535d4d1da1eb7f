//! Shared low-level helpers: endian-aware value encoding and page-alignment arithmetic.

pub mod io;
pub mod math;

pub use io::{read_be, read_le, write_be, write_le, RegionIO};
pub use math::{aligned_start, double_until, page_of, to_usize};
