//! Registry of live regions, used to release their handles at process exit.
//!
//! A region whose configuration enables `auto_exit_guard` joins an [`InstanceRegistry`] when it
//! opens its first store or mapping handle and leaves it once both are closed again, or when it
//! is dropped. The registry only holds weak references, so it never keeps a region's handles
//! alive.
//!
//! # Process-wide registry
//!
//! [`InstanceRegistry::global`] is the registry regions join by default. The first time it is
//! requested, an exit hook is installed that calls [`InstanceRegistry::shutdown`] on it, so the
//! views and mappings of regions that were never dropped are flushed and closed before the
//! process ends. Registries created with [`InstanceRegistry::new`] shut down when dropped.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use mapregion::{platform::Native, Config, InstanceRegistry, MappedRegion};
//!
//! let registry = Arc::new(InstanceRegistry::new());
//! let mut region = MappedRegion::with_platform(
//!     Config { max_size: 4096, ..Config::default() },
//!     Arc::new(Native::new()),
//!     Arc::clone(&registry),
//! )?;
//!
//! region.open()?;
//! assert_eq!(registry.len(), 1);
//!
//! // Closes every registered region
//! assert_eq!(registry.shutdown(), 1);
//! assert!(!region.is_mapping_open());
//! # Ok::<(), mapregion::Error>(())
//! ```

use std::sync::{Arc, Mutex, OnceLock, TryLockError, Weak};

use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use crate::region::Handles;

static GLOBAL: OnceLock<Arc<InstanceRegistry>> = OnceLock::new();

/// Table of live regions, keyed by a random non-zero id.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    entries: DashMap<u32, Weak<Mutex<Handles>>>,
}

impl InstanceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        InstanceRegistry {
            entries: DashMap::new(),
        }
    }

    /// The process-wide registry, installing its exit hook on first use.
    #[must_use]
    pub fn global() -> Arc<InstanceRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| {
            install_exit_hook();
            Arc::new(InstanceRegistry::new())
        }))
    }

    pub(crate) fn register(&self, handles: Weak<Mutex<Handles>>) -> u32 {
        loop {
            let id = Uuid::new_v4().as_u128() as u32;
            if id == 0 {
                continue;
            }
            if let Entry::Vacant(slot) = self.entries.entry(id) {
                slot.insert(handles);
                return id;
            }
        }
    }

    /// Removes an entry. Returns `true` if it was registered.
    pub fn deregister(&self, id: u32) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of registered regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no region is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flushes and closes the handles of every registered region and empties the registry.
    ///
    /// Regions in the middle of an operation on another thread are skipped. Returns the number
    /// of regions that had open handles.
    pub fn shutdown(&self) -> usize {
        let live: Vec<(u32, Weak<Mutex<Handles>>)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        self.entries.clear();

        let mut closed = 0;
        for (id, handles) in live {
            let Some(handles) = handles.upgrade() else {
                continue;
            };

            let mut guard = match handles.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    log::warn!("region {id:#010x} busy, left open");
                    continue;
                }
            };
            if guard.force_close() {
                log::warn!("region {id:#010x} still open, closed by exit guard");
                closed += 1;
            }
        }
        closed
    }
}

impl Drop for InstanceRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(unix)]
fn install_exit_hook() {
    extern "C" fn on_exit() {
        if let Some(registry) = GLOBAL.get() {
            registry.shutdown();
        }
    }

    // SAFETY: `on_exit` is a plain function that never unwinds across the FFI boundary
    if unsafe { libc::atexit(on_exit) } != 0 {
        log::warn!("exit hook could not be installed");
    }
}

#[cfg(not(unix))]
fn install_exit_hook() {
    log::debug!("no exit hook on this platform; regions close when dropped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_remove() {
        let registry = InstanceRegistry::new();
        let handles = Arc::new(Mutex::new(Handles::default()));

        let first = registry.register(Arc::downgrade(&handles));
        let second = registry.register(Arc::downgrade(&handles));
        assert_ne!(first, 0);
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(first));

        assert!(registry.deregister(first));
        assert!(!registry.deregister(first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn shutdown_skips_dropped_and_idle() {
        let registry = InstanceRegistry::new();
        let idle = Arc::new(Mutex::new(Handles::default()));
        registry.register(Arc::downgrade(&idle));
        {
            let gone = Arc::new(Mutex::new(Handles::default()));
            registry.register(Arc::downgrade(&gone));
        }

        assert_eq!(registry.shutdown(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn global_is_shared() {
        assert!(Arc::ptr_eq(&InstanceRegistry::global(), &InstanceRegistry::global()));
    }
}
