// Slot cache module
//
// This module provides the SlotCache which keeps fetched weapon details keyed by
// weapon id, guarded by Arc<RwLock<T>> so concurrent requests can share it.

use crate::models::{WeaponDetails, WeaponId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CacheEntry {
    details: Arc<WeaponDetails>,
    inserted_at: Instant,
}

/// Thread-safe, read-mostly cache of weapon details with optional expiry
///
/// Entries older than the configured TTL are treated as missing on lookup and
/// dropped by [`purge_expired()`](Self::purge_expired) or the next insert for the
/// same weapon. Cloning shares the underlying map.
///
/// # Related Types
///
/// - [`crate::services::SlotCompatibilityResolver`]: The only writer in normal operation
/// - [`crate::models::WeaponDetails`]: The cached value, handed out as `Arc`
#[derive(Debug)]
pub struct SlotCache {
    entries: Arc<RwLock<HashMap<WeaponId, CacheEntry>>>,

    /// `None` keeps entries until invalidated
    ttl: Option<Duration>,
}

impl SlotCache {
    /// Create a cache whose entries never expire
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: None,
        }
    }

    /// Create a cache whose entries expire after `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl: Some(ttl),
        }
    }

    /// Build from a TTL in seconds, 0 meaning no expiry
    pub fn from_ttl_secs(ttl_secs: u64) -> Self {
        if ttl_secs == 0 {
            Self::new()
        } else {
            Self::with_ttl(Duration::from_secs(ttl_secs))
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match self.ttl {
            Some(ttl) => entry.inserted_at.elapsed() < ttl,
            None => true,
        }
    }

    /// Look up a weapon, ignoring expired entries
    pub fn get(&self, weapon_id: &WeaponId) -> Option<Arc<WeaponDetails>> {
        let entries = self.entries.read().expect("slot cache lock poisoned");
        entries
            .get(weapon_id)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| Arc::clone(&entry.details))
    }

    /// Store details, replacing any previous entry for the same weapon
    ///
    /// # Returns
    /// The shared handle now held by the cache
    pub fn insert(&self, details: WeaponDetails) -> Arc<WeaponDetails> {
        let details = Arc::new(details);
        let mut entries = self.entries.write().expect("slot cache lock poisoned");
        entries.insert(
            details.weapon.id.clone(),
            CacheEntry {
                details: Arc::clone(&details),
                inserted_at: Instant::now(),
            },
        );
        details
    }

    /// Drop one weapon. Returns true if it was cached.
    pub fn invalidate(&self, weapon_id: &WeaponId) -> bool {
        let mut entries = self.entries.write().expect("slot cache lock poisoned");
        entries.remove(weapon_id).is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .expect("slot cache lock poisoned")
            .clear();
    }

    /// Remove expired entries and return how many were dropped
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().expect("slot cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!("Purged {} expired slot cache entries", purged);
        }
        purged
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().expect("slot cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SlotCache {
    fn default() -> Self {
        Self::new()
    }
}

// Clones share the same map
impl Clone for SlotCache {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            ttl: self.ttl,
        }
    }
}
