//! Open parameters of a [`crate::MappedRegion`].

use std::path::PathBuf;

use uuid::Uuid;

use crate::{
    platform::{Access, CreationDisposition, Protection, ShareMode, StoreOptions},
    Encoding,
};

/// Default length of the random suffix requested by a bare `*` marker.
pub const DEFAULT_RANDOM_SUFFIX: usize = 16;

/// Name under which an anonymous mapping is shared with other processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingName {
    /// Use the name as given
    Fixed(String),
    /// Append `len` random alphanumeric characters to `prefix` once the mapping is created
    Random {
        /// Fixed leading part of the name
        prefix: String,
        /// Number of random characters
        len: usize,
    },
}

impl MappingName {
    /// Parses a mapping name.
    ///
    /// A trailing `*`, optionally followed by a decimal length, is replaced by that many random
    /// alphanumeric characters ([`DEFAULT_RANDOM_SUFFIX`] without a length).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mapregion::MappingName;
    ///
    /// assert_eq!(
    ///     MappingName::parse("Local\\Shared*8"),
    ///     MappingName::Random { prefix: "Local\\Shared".into(), len: 8 }
    /// );
    /// assert_eq!(MappingName::parse("Plain"), MappingName::Fixed("Plain".into()));
    /// ```
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let Some(star) = name.rfind('*') else {
            return MappingName::Fixed(name.to_owned());
        };

        let digits = &name[star + 1..];
        if digits.is_empty() {
            return MappingName::Random {
                prefix: name[..star].to_owned(),
                len: DEFAULT_RANDOM_SUFFIX,
            };
        }

        match digits.parse::<usize>() {
            Ok(len) if digits.bytes().all(|b| b.is_ascii_digit()) => MappingName::Random {
                prefix: name[..star].to_owned(),
                len,
            },
            _ => MappingName::Fixed(name.to_owned()),
        }
    }

    /// Produces the concrete name. Random names differ on every call.
    #[must_use]
    pub fn resolve(&self) -> String {
        match self {
            MappingName::Fixed(name) => name.clone(),
            MappingName::Random { prefix, len } => {
                let mut name = prefix.clone();
                while name.len() < prefix.len() + len {
                    let chunk = Uuid::new_v4().simple().to_string();
                    let missing = prefix.len() + len - name.len();
                    name.extend(chunk.chars().take(missing));
                }
                name
            }
        }
    }
}

impl From<&str> for MappingName {
    fn from(name: &str) -> Self {
        MappingName::parse(name)
    }
}

/// Configuration of a [`crate::MappedRegion`].
///
/// # Examples
///
/// ```rust
/// use mapregion::{Config, Encoding};
///
/// let config = Config {
///     encoding: Encoding::Utf8,
///     max_size: 1 << 16,
///     ..Config::default()
/// };
/// assert!(config.path.is_none());
/// assert!(config.auto_exit_guard);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Access rights for the backing file and views
    pub access: Access,
    /// Sharing permitted to other openers of the backing file
    pub share_mode: ShareMode,
    /// Page protection of the mapping object
    pub protection: Protection,
    /// Creation behaviour of the backing file
    pub creation: CreationDisposition,
    /// Backing file; `None` maps anonymous memory
    pub path: Option<PathBuf>,
    /// Name to share an anonymous mapping under
    pub name: Option<MappingName>,
    /// Encoding of text content
    pub encoding: Encoding,
    /// Capacity in bytes; 0 means the file size, or one page for anonymous regions
    pub max_size: u64,
    /// Register with the instance registry so handles are closed at process exit
    pub auto_exit_guard: bool,
}

impl Config {
    pub(crate) fn store_options(&self) -> StoreOptions {
        StoreOptions {
            access: self.access,
            share_mode: self.share_mode,
            creation: self.creation,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            access: Access::READ | Access::WRITE,
            share_mode: ShareMode::READ | ShareMode::WRITE,
            protection: Protection::ReadWrite,
            creation: CreationDisposition::OpenAlways,
            path: None,
            name: None,
            encoding: Encoding::Utf16Le,
            max_size: 0,
            auto_exit_guard: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_markers() {
        assert_eq!(
            MappingName::parse("Shared*"),
            MappingName::Random {
                prefix: "Shared".into(),
                len: DEFAULT_RANDOM_SUFFIX
            }
        );
        assert_eq!(
            MappingName::parse("*4"),
            MappingName::Random {
                prefix: String::new(),
                len: 4
            }
        );
        assert_eq!(
            MappingName::parse("Shared*x"),
            MappingName::Fixed("Shared*x".into())
        );
        assert_eq!(
            MappingName::parse("Shared*+3"),
            MappingName::Fixed("Shared*+3".into())
        );
    }

    #[test]
    fn resolve_random() {
        let name = MappingName::parse("Local\\Map*40");
        let first = name.resolve();
        let second = name.resolve();

        assert_eq!(first.len(), "Local\\Map".len() + 40);
        assert!(first.starts_with("Local\\Map"));
        assert!(first["Local\\Map".len()..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn resolve_fixed() {
        assert_eq!(MappingName::from("Global").resolve(), "Global");
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.access, Access::READ | Access::WRITE);
        assert_eq!(config.encoding, Encoding::Utf16Le);
        assert_eq!(config.max_size, 0);
        assert_eq!(config.creation, CreationDisposition::OpenAlways);
    }
}
