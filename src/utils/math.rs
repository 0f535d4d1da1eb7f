//! Page-alignment and growth arithmetic.

use crate::Result;

/// Converts a `u64` offset or length to `usize`, returning an error if it does not fit the
/// address space of this process.
///
/// # Errors
///
/// Returns an error if `value` exceeds `usize::MAX`.
pub fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| invalid_position!("value {value} exceeds the addressable range"))
}

/// Index of the allocation-granularity page containing `offset`.
///
/// `granularity` must be non-zero.
#[must_use]
pub fn page_of(offset: u64, granularity: u64) -> u64 {
    offset / granularity
}

/// Start of the allocation-granularity page containing `offset`.
///
/// # Examples
///
/// ```rust
/// use mapregion::utils::aligned_start;
///
/// assert_eq!(aligned_start(0, 4096), 0);
/// assert_eq!(aligned_start(4095, 4096), 0);
/// assert_eq!(aligned_start(4096, 4096), 4096);
/// assert_eq!(aligned_start(10_000, 4096), 8192);
/// ```
#[must_use]
pub fn aligned_start(offset: u64, granularity: u64) -> u64 {
    page_of(offset, granularity) * granularity
}

/// Doubles `current` until it is at least `required`.
///
/// A `current` of zero starts from one. Returns `None` if doubling overflows `u64`.
///
/// # Examples
///
/// ```rust
/// use mapregion::utils::double_until;
///
/// assert_eq!(double_until(200, 150), Some(200));
/// assert_eq!(double_until(200, 201), Some(400));
/// assert_eq!(double_until(200, 801), Some(1600));
/// ```
#[must_use]
pub fn double_until(current: u64, required: u64) -> Option<u64> {
    let mut size = current.max(1);
    while size < required {
        size = size.checked_mul(2)?;
    }
    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_of() {
        assert_eq!(page_of(0, 65536), 0);
        assert_eq!(page_of(65535, 65536), 0);
        assert_eq!(page_of(65536, 65536), 1);
        assert_eq!(page_of(200_000, 65536), 3);
    }

    #[test]
    fn test_double_until() {
        assert_eq!(double_until(0, 0), Some(1));
        assert_eq!(double_until(0, 5), Some(8));
        assert_eq!(double_until(4096, 4096), Some(4096));
        assert_eq!(double_until(4096, 4097), Some(8192));
        assert_eq!(double_until(u64::MAX / 2 + 1, u64::MAX), None);
    }

    #[test]
    fn test_to_usize() {
        assert_eq!(to_usize(0).unwrap(), 0);
        assert_eq!(to_usize(4096).unwrap(), 4096);
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn test_to_usize_overflow() {
        assert!(to_usize(u64::MAX).is_err());
    }
}
