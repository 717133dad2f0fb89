//! Effective-permission cache keyed by `(account, tenant)`
//!
//! Entries remember the rule-set version they were computed from. Writes
//! raise an invalidation floor (per account, or global on rebuild) instead of
//! relying on removal alone, so a reader that resolved against an older
//! snapshot and inserts late can never serve a stale answer.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::rules::EffectivePermissions;
use crate::config::CacheConfig;
use crate::types::{AccountId, TenantId};

type CacheKey = (AccountId, TenantId);

/// Cached entry with TTL
#[derive(Clone)]
struct CachedEntry {
    permissions: Arc<EffectivePermissions>,
    version: u64,
    cached_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, ttl: std::time::Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Thread-safe effective-permission cache
pub struct PermissionCache {
    entries: DashMap<CacheKey, CachedEntry>,

    /// Lowest valid version per account
    account_floors: DashMap<AccountId, u64>,

    /// Lowest valid version for every entry
    global_floor: AtomicU64,

    config: CacheConfig,

    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl PermissionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            account_floors: DashMap::new(),
            global_floor: AtomicU64::new(0),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Get cached permissions if they are still valid
    pub fn get(&self, account_id: &str, tenant_id: &str) -> Option<Arc<EffectivePermissions>> {
        let key = (account_id.to_string(), tenant_id.to_string());

        if let Some(entry) = self.entries.get(&key) {
            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.entries.remove(&key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }

            if entry.version >= self.floor_for(account_id) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.permissions.clone());
            }

            drop(entry);
            self.entries.remove(&key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store permissions computed from rule-set `version`
    pub fn put(
        &self,
        account_id: &str,
        tenant_id: &str,
        version: u64,
        permissions: Arc<EffectivePermissions>,
    ) {
        if version < self.floor_for(account_id) {
            return;
        }

        if self.entries.len() >= self.config.capacity {
            self.evict();
        }

        self.entries.insert(
            (account_id.to_string(), tenant_id.to_string()),
            CachedEntry {
                permissions,
                version,
                cached_at: Instant::now(),
            },
        );
    }

    /// Invalidate the given accounts as of rule-set `version`
    pub fn invalidate_accounts<'a, I>(&self, accounts: I, version: u64)
    where
        I: IntoIterator<Item = &'a AccountId>,
    {
        let mut touched = std::collections::HashSet::new();
        for account_id in accounts {
            self.account_floors
                .entry(account_id.clone())
                .and_modify(|floor| *floor = (*floor).max(version))
                .or_insert(version);
            touched.insert(account_id.clone());
        }

        if !touched.is_empty() {
            self.entries.retain(|(account_id, _), _| !touched.contains(account_id));
        }
    }

    /// Invalidate every entry as of rule-set `version`
    pub fn invalidate_all(&self, version: u64) {
        self.global_floor.fetch_max(version, Ordering::AcqRel);
        self.entries.clear();
        // Superseded by the global floor.
        self.account_floors.retain(|_, floor| *floor > version);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    fn floor_for(&self, account_id: &str) -> u64 {
        let global = self.global_floor.load(Ordering::Acquire);
        let account = self.account_floors.get(account_id).map(|f| *f).unwrap_or(0);
        global.max(account)
    }

    /// Drop expired entries, then up to 10% of the rest
    fn evict(&self) {
        let ttl = self.config.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));

        if self.entries.len() < self.config.capacity {
            return;
        }

        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
