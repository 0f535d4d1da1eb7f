//! Text encodings, character widths and byte-order marks.
//!
//! A region stores text in one of a small set of encodings. The encoding fixes the width of a
//! code unit (`BytesPerChar`), the byte-order mark recognized at the start of the object, and the
//! terminator used to mark the logical end of text inside a larger fixed-capacity region.
//!
//! # Key Components
//!
//! - [`Encoding`] - Supported encodings, parseable from the usual names (`"UTF-8"`, `"CP1200"`, ...)
//! - [`detect_bom`] - Identify any known byte-order mark at the start of a buffer
//!
//! # Examples
//!
//! ```rust
//! use mapregion::Encoding;
//!
//! let encoding: Encoding = "utf-16".parse().unwrap();
//! assert_eq!(encoding, Encoding::Utf16Le);
//! assert_eq!(encoding.bytes_per_char(), 2);
//!
//! let bytes = encoding.encode("Hi")?;
//! assert_eq!(bytes, [b'H', 0, b'i', 0]);
//! assert_eq!(encoding.decode(&bytes)?, "Hi");
//! # Ok::<(), mapregion::Error>(())
//! ```
//!
//! `UTF-16BE` is recognized by its byte-order mark but cannot be encoded or decoded; every text
//! operation on it fails with [`crate::Error::UnsupportedEncoding`].

use strum::{Display, EnumIter, EnumString};
use widestring::{U16Str, U16String};

use crate::{Error::UnsupportedEncoding, Result};

/// UTF-8 byte-order mark
pub const BOM_UTF8: [u8; 3] = [0xEF, 0xBB, 0xBF];
/// UTF-16 little-endian byte-order mark
pub const BOM_UTF16LE: [u8; 2] = [0xFF, 0xFE];
/// UTF-16 big-endian byte-order mark
pub const BOM_UTF16BE: [u8; 2] = [0xFE, 0xFF];

/// Text encoding of the content stored in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Encoding {
    /// UTF-8, one byte per code unit
    #[strum(to_string = "UTF-8", serialize = "UTF8", serialize = "CP65001")]
    Utf8,
    /// UTF-16 little-endian, two bytes per code unit
    #[default]
    #[strum(
        to_string = "UTF-16",
        serialize = "UTF-16LE",
        serialize = "UTF16",
        serialize = "CP1200"
    )]
    Utf16Le,
    /// UTF-16 big-endian, detected but not supported for text operations
    #[strum(to_string = "UTF-16BE", serialize = "CP1201")]
    Utf16Be,
    /// ISO-8859-1, one byte per character, no byte-order mark
    #[strum(
        to_string = "ISO-8859-1",
        serialize = "LATIN1",
        serialize = "CP28591"
    )]
    Latin1,
}

impl Encoding {
    /// Width of one code unit in bytes, either 1 or 2.
    #[must_use]
    pub fn bytes_per_char(self) -> usize {
        match self {
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
            Encoding::Utf8 | Encoding::Latin1 => 1,
        }
    }

    /// The byte-order mark for this encoding, empty if it has none.
    #[must_use]
    pub fn bom(self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => &BOM_UTF8,
            Encoding::Utf16Le => &BOM_UTF16LE,
            Encoding::Utf16Be => &BOM_UTF16BE,
            Encoding::Latin1 => &[],
        }
    }

    /// Returns `true` if text can be encoded and decoded with this encoding.
    #[must_use]
    pub fn is_supported(self) -> bool {
        !matches!(self, Encoding::Utf16Be)
    }

    /// Length of the byte-order mark of this encoding at the start of `data`, or 0 if `data`
    /// does not start with it.
    #[must_use]
    pub fn bom_len(self, data: &[u8]) -> usize {
        let bom = self.bom();
        if !bom.is_empty() && data.starts_with(bom) {
            bom.len()
        } else {
            0
        }
    }

    /// Encodes `text` into bytes, without a terminator.
    ///
    /// Characters outside the Latin-1 range are replaced by `?` when encoding Latin-1.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedEncoding`] for UTF-16BE.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Utf16Le => Ok(U16String::from_str(text)
                .into_vec()
                .into_iter()
                .flat_map(u16::to_le_bytes)
                .collect()),
            Encoding::Latin1 => Ok(text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect()),
            Encoding::Utf16Be => Err(UnsupportedEncoding(self)),
        }
    }

    /// Decodes `data` into a string, replacing invalid sequences.
    ///
    /// For UTF-16 a trailing odd byte is ignored. The data is decoded as a whole; stop at a
    /// terminator first with [`Encoding::terminator`] if needed.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedEncoding`] for UTF-16BE.
    pub fn decode(self, data: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => Ok(String::from_utf8_lossy(data).into_owned()),
            Encoding::Utf16Le => {
                let units: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(U16Str::from_slice(&units).to_string_lossy())
            }
            Encoding::Latin1 => Ok(data.iter().map(|&b| char::from(b)).collect()),
            Encoding::Utf16Be => Err(UnsupportedEncoding(self)),
        }
    }

    /// Byte offset of the first zero code unit in `data`, aligned to the code unit width.
    #[must_use]
    pub fn terminator(self, data: &[u8]) -> Option<usize> {
        let width = self.bytes_per_char();
        data.chunks_exact(width)
            .position(|unit| unit.iter().all(|&b| b == 0))
            .map(|index| index * width)
    }

    /// Number of code units `text` occupies once encoded.
    #[must_use]
    pub fn unit_len(self, text: &str) -> usize {
        match self {
            Encoding::Utf8 => text.len(),
            Encoding::Utf16Le | Encoding::Utf16Be => text.encode_utf16().count(),
            Encoding::Latin1 => text.chars().count(),
        }
    }
}

/// Identifies a known byte-order mark at the start of `data`.
///
/// Returns the encoding it announces and the length of the mark.
///
/// # Examples
///
/// ```rust
/// use mapregion::{detect_bom, Encoding};
///
/// assert_eq!(detect_bom(&[0xEF, 0xBB, 0xBF, b'a']), Some((Encoding::Utf8, 3)));
/// assert_eq!(detect_bom(b"plain"), None);
/// ```
#[must_use]
pub fn detect_bom(data: &[u8]) -> Option<(Encoding, usize)> {
    [Encoding::Utf8, Encoding::Utf16Le, Encoding::Utf16Be]
        .into_iter()
        .find_map(|encoding| match encoding.bom_len(data) {
            0 => None,
            len => Some((encoding, len)),
        })
}
