//! Endian-aware encoding of primitive values for binary region I/O.
//!
//! This module provides the [`crate::utils::io::RegionIO`] trait and the bounds-checked helpers
//! used by [`crate::MappedRegion::read_le`], [`crate::MappedRegion::write_le`] and their
//! big-endian counterparts. The region itself only moves raw bytes; this layer turns them into
//! typed values and back.
//!
//! # Supported Types
//! - **Unsigned integers**: `u8`, `u16`, `u32`, `u64`, `usize`
//! - **Signed integers**: `i8`, `i16`, `i32`, `i64`, `isize`
//! - **Floating point**: `f32`, `f64`
//!
//! # Examples
//!
//! ```rust
//! use mapregion::utils::{read_be, read_le, write_le};
//!
//! let data = [0x01, 0x00, 0x00, 0x00];
//! assert_eq!(read_le::<u32>(&data)?, 1);
//! assert_eq!(read_be::<u32>(&data)?, 0x0100_0000);
//!
//! let mut out = [0u8; 2];
//! write_le(&mut out, 0x0201_u16)?;
//! assert_eq!(out, [0x01, 0x02]);
//! # Ok::<(), mapregion::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::OutOfBounds`] if the buffer is too short for the value.

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive values that can be read from and written to a region.
///
/// Each implementation names the fixed-size byte array (`[u8; N]`) holding its encoded form.
pub trait RegionIO: Sized + Copy {
    /// Byte array type holding the encoded value.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_region_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RegionIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_region_io!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

fn leading<T: RegionIO>(data: &[u8]) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    if type_len > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(bytes) = T::Bytes::try_from(&data[..type_len]) else {
        return Err(OutOfBounds);
    };

    Ok(bytes)
}

/// Decodes a little-endian `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: RegionIO>(data: &[u8]) -> Result<T> {
    Ok(T::from_le_bytes(leading::<T>(data)?))
}

/// Decodes a big-endian `T` from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_be<T: RegionIO>(data: &[u8]) -> Result<T> {
    Ok(T::from_be_bytes(leading::<T>(data)?))
}

/// Encodes `value` little-endian into the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn write_le<T: RegionIO>(data: &mut [u8], value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();
    let Some(target) = data.get_mut(..bytes.len()) else {
        return Err(OutOfBounds);
    };

    target.copy_from_slice(bytes);
    Ok(())
}

/// Encodes `value` big-endian into the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn write_be<T: RegionIO>(data: &mut [u8], value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let Some(target) = data.get_mut(..bytes.len()) else {
        return Err(OutOfBounds);
    };

    target.copy_from_slice(bytes);
    Ok(())
}
