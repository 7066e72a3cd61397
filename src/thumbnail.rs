//! Bounded, path-keyed cache for derived preview data.
//!
//! The cache maps an entry's full archive path to its computed preview.
//! Slots are validated against the tree-build epoch stamped on every
//! [`ArchiveEntry`](crate::entry::ArchiveEntry): after a repack rebuilds
//! the tree, a new entry occupies the same path with a newer epoch, and
//! the stale slot is evicted on read instead of being silently returned.
//!
//! When the cache exceeds its maximum size, the FIFO-oldest entries are
//! removed in batches; batch eviction amortizes the cost of single-item
//! churn during rapid browsing. FIFO order only affects eviction choice,
//! never correctness.
//!
//! All mutating operations go through one internal lock; lookups may race
//! from concurrent preview tasks.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::{Error, Result};

/// Default maximum number of cached previews.
const DEFAULT_MAX_ENTRIES: usize = 250;
/// Default number of FIFO-oldest entries removed per eviction.
const DEFAULT_EVICT_BATCH: usize = 15;

/// Sizing policy for a [`ThumbnailCache`].
///
/// The defaults mirror the tuning the engine shipped with (250 slots,
/// batches of 15), but both knobs are configuration.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailCacheConfig {
    max_entries: usize,
    evict_batch: usize,
}

impl ThumbnailCacheConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            evict_batch: DEFAULT_EVICT_BATCH,
        }
    }

    /// Sets the maximum number of cached previews.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if `max_entries` is zero. The
    /// relation to the eviction batch is checked when the cache is built,
    /// so setter order does not matter.
    pub fn max_entries(mut self, max_entries: usize) -> Result<Self> {
        if max_entries == 0 {
            return Err(Error::precondition("max_entries must be nonzero"));
        }
        self.max_entries = max_entries;
        Ok(self)
    }

    /// Sets the number of FIFO-oldest entries removed per eviction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if `evict_batch` is zero. The
    /// relation to the maximum size is checked when the cache is built, so
    /// setter order does not matter.
    pub fn evict_batch(mut self, evict_batch: usize) -> Result<Self> {
        if evict_batch == 0 {
            return Err(Error::precondition("evict_batch must be nonzero"));
        }
        self.evict_batch = evict_batch;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.evict_batch > self.max_entries {
            return Err(Error::precondition(format!(
                "evict_batch {} exceeds max_entries {}",
                self.evict_batch, self.max_entries
            )));
        }
        Ok(())
    }
}

impl Default for ThumbnailCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Slot<T> {
    epoch: u64,
    seq: u64,
    data: T,
}

#[derive(Debug)]
struct Inner<T> {
    slots: HashMap<String, Slot<T>>,
    /// Insertion order as `(seq, path)`, exactly one element per live
    /// slot. `seq` disambiguates re-insertions of the same path.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl<T> Inner<T> {
    /// Drops the order element matching a removed slot, keeping `order`
    /// and `slots` the same size.
    fn purge_order(&mut self, path: &str, seq: u64) {
        if let Some(pos) = self.order.iter().position(|(s, p)| *s == seq && p == path) {
            self.order.remove(pos);
        }
    }
}

/// Bounded cache of derived preview data with staleness validation.
#[derive(Debug)]
pub struct ThumbnailCache<T> {
    config: ThumbnailCacheConfig,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> ThumbnailCache<T> {
    /// Creates a cache with the given sizing policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Precondition`] if the eviction batch exceeds the
    /// maximum size.
    pub fn new(config: ThumbnailCacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
        })
    }

    /// The sizing policy this cache was created with.
    pub fn config(&self) -> ThumbnailCacheConfig {
        self.config
    }

    /// Number of live cached previews.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Returns `true` if the cache holds no previews.
    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    /// Inserts or replaces the preview for `path`.
    ///
    /// If the cache is full and `path` is not already present, the
    /// FIFO-oldest batch is evicted first. The slot's insertion order moves
    /// to the end either way.
    pub fn insert(&self, path: &str, epoch: u64, data: T) {
        let mut inner = self.lock();
        if let Some(old_seq) = inner.slots.get(path).map(|slot| slot.seq) {
            inner.purge_order(path, old_seq);
        } else if inner.slots.len() >= self.config.max_entries {
            let evicted = Self::evict_batch(&mut inner, self.config.evict_batch);
            log::debug!(
                "thumbnail cache full ({} slots), evicted {} oldest",
                self.config.max_entries,
                evicted
            );
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((seq, path.to_string()));
        inner.slots.insert(path.to_string(), Slot { epoch, seq, data });
    }

    /// Looks up the preview for `path`, validating it against the caller's
    /// tree-build epoch.
    ///
    /// A slot recorded under an older epoch belongs to an entry object that
    /// no longer exists (the tree was rebuilt); it is evicted here and the
    /// lookup reports a miss. A miss is normal control flow, not an error.
    pub fn try_get(&self, path: &str, epoch: u64) -> Option<T> {
        let mut inner = self.lock();
        match inner.slots.get(path) {
            Some(slot) if slot.epoch == epoch => Some(slot.data.clone()),
            Some(_) => {
                log::trace!("stale thumbnail slot for '{}', evicting", path);
                if let Some(slot) = inner.slots.remove(path) {
                    inner.purge_order(path, slot.seq);
                }
                None
            }
            None => None,
        }
    }

    /// Unconditionally removes the slot for `path`.
    ///
    /// Used on explicit invalidation, e.g. when a file is replaced by an
    /// import.
    pub fn remove(&self, path: &str) {
        let mut inner = self.lock();
        if let Some(slot) = inner.slots.remove(path) {
            inner.purge_order(path, slot.seq);
        }
    }

    /// Clears the cache entirely. Called when the owning session ends or
    /// the archive is reloaded.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        inner.order.clear();
    }

    /// Removes up to `batch` FIFO-oldest slots. The `seq` comparison
    /// guards against evicting a slot that was re-inserted under a newer
    /// sequence number. Returns the number actually evicted.
    fn evict_batch(inner: &mut Inner<T>, batch: usize) -> usize {
        let mut evicted = 0;
        while evicted < batch {
            let Some((seq, path)) = inner.order.pop_front() else {
                break;
            };
            let live = inner.slots.get(&path).is_some_and(|slot| slot.seq == seq);
            if live {
                inner.slots.remove(&path);
                evicted += 1;
            }
        }
        evicted
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!("thumbnail cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
