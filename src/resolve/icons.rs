//! Reference-counted icon asset leases.
//!
//! The rendering layer owns component lifetimes, so it acquires a lease per mounted
//! component and releases it on unmount (explicitly or by dropping the lease). The
//! backing asset is loaded on the first acquire and unloaded when the last lease goes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

/// Creates and frees the backing asset for an icon path.
pub trait IconLifecycle: Send + Sync {
    fn load(&self, path: &str);

    fn unload(&self, path: &str);
}

pub struct IconLeases {
    counts: Mutex<HashMap<String, usize>>,
    lifecycle: Box<dyn IconLifecycle>,
}

impl fmt::Debug for IconLeases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconLeases")
            .field("live", &self.live_count())
            .finish()
    }
}

impl IconLeases {
    pub fn new(lifecycle: impl IconLifecycle + 'static) -> Arc<Self> {
        Arc::new(Self {
            counts: Mutex::new(HashMap::new()),
            lifecycle: Box::new(lifecycle),
        })
    }

    pub fn acquire(self: &Arc<Self>, path: &str) -> IconLease {
        let first = {
            let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
            let count = counts.entry(path.to_string()).or_insert(0);
            *count += 1;
            *count == 1
        };
        if first {
            debug!("loading icon {path}");
            self.lifecycle.load(path);
        }
        IconLease {
            leases: Arc::clone(self),
            path: path.to_string(),
        }
    }

    fn release_path(&self, path: &str) {
        let last = {
            let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
            match counts.get_mut(path) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    counts.remove(path);
                    true
                }
                None => false,
            }
        };
        if last {
            debug!("unloading icon {path}");
            self.lifecycle.unload(path);
        }
    }

    pub fn ref_count(&self, path: &str) -> usize {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct icons currently loaded.
    pub fn live_count(&self) -> usize {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// One holder's claim on an icon. Released on [IconLease::release] or drop.
pub struct IconLease {
    leases: Arc<IconLeases>,
    path: String,
}

impl IconLease {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn release(self) {}
}

impl Drop for IconLease {
    fn drop(&mut self) {
        self.leases.release_path(&self.path);
    }
}

impl fmt::Debug for IconLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconLease").field("path", &self.path).finish()
    }
}
