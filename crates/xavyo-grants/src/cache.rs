//! Packet cache.
//!
//! A concurrent keyed store of packet snapshots with a per-entry TTL. Expiry
//! is logical only: stale entries stay readable until the next refresh
//! replaces them, and nothing is ever evicted.
//!
//! The cache is an ordinary value. Construct one per process, wrap it in an
//! [`Arc`] and hand clones to the refresh middleware and the evaluator.

use dashmap::DashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ids::{UserId, UserspaceId};
use crate::model::{Packet, SystemPacketMap};

/// Which discriminators participate in the cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheScope {
    /// One entry per user (and object key).
    User,
    /// One entry per user, userspace (and object key).
    #[default]
    Userspace,
}

impl FromStr for CacheScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(CacheScope::User),
            "userspace" => Ok(CacheScope::Userspace),
            other => Err(format!("unknown cache scope '{other}'")),
        }
    }
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheScope::User => write!(f, "user"),
            CacheScope::Userspace => write!(f, "userspace"),
        }
    }
}

/// Identifies one cached packet snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: UserId,
    pub userspace_id: Option<UserspaceId>,
    pub object_key: Option<String>,
}

impl CacheKey {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            userspace_id: None,
            object_key: None,
        }
    }

    #[must_use]
    pub fn with_userspace(mut self, userspace_id: UserspaceId) -> Self {
        self.userspace_id = Some(userspace_id);
        self
    }

    #[must_use]
    pub fn with_object_key(mut self, object_key: impl Into<String>) -> Self {
        self.object_key = Some(object_key.into());
        self
    }
}

/// A packet snapshot and its freshness window.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub packets: Arc<[Packet]>,
    pub added_at: Instant,
    /// `None` means the entry is always stale.
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    #[must_use]
    pub fn new(packets: Vec<Packet>, added_at: Instant, ttl: Option<Duration>) -> Self {
        Self {
            packets: packets.into(),
            added_at,
            ttl,
        }
    }

    /// Fresh on `[added_at, added_at + ttl)`, stale at and after the bound.
    #[must_use]
    pub fn is_stale_at(&self, now: Instant) -> bool {
        match self.ttl {
            None => true,
            Some(ttl) => now.saturating_duration_since(self.added_at) >= ttl,
        }
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }
}

/// Concurrent packet store plus the system-packet map table.
#[derive(Debug, Default)]
pub struct PacketCache {
    scope: CacheScope,
    entries: DashMap<CacheKey, CacheEntry>,
    system_packets: DashMap<UserId, Arc<[SystemPacketMap]>>,
}

impl PacketCache {
    /// Empty cache keyed per userspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scope(scope: CacheScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scope(&self) -> CacheScope {
        self.scope
    }

    /// Build the key for a lookup, dropping the userspace under [`CacheScope::User`].
    #[must_use]
    pub fn key(
        &self,
        user_id: UserId,
        userspace_id: Option<UserspaceId>,
        object_key: Option<&str>,
    ) -> CacheKey {
        CacheKey {
            user_id,
            userspace_id: match self.scope {
                CacheScope::User => None,
                CacheScope::Userspace => userspace_id,
            },
            object_key: object_key.map(str::to_owned),
        }
    }

    /// Cached packets for `key`, empty when absent.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Arc<[Packet]> {
        self.entries
            .get(key)
            .map(|entry| Arc::clone(&entry.packets))
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    #[must_use]
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    #[must_use]
    pub fn is_stale_or_missing(&self, key: &CacheKey) -> bool {
        self.is_stale_or_missing_at(key, Instant::now())
    }

    #[must_use]
    pub fn is_stale_or_missing_at(&self, key: &CacheKey, now: Instant) -> bool {
        self.entries
            .get(key)
            .map_or(true, |entry| entry.is_stale_at(now))
    }

    /// Replace the entry for `key` wholesale.
    pub fn set(&self, key: CacheKey, packets: Vec<Packet>, ttl: Option<Duration>) {
        self.set_entry(key, CacheEntry::new(packets, Instant::now(), ttl));
    }

    pub fn set_entry(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Every packet cached for `user_id` and `object_key`, across all userspaces.
    #[must_use]
    pub fn packets_for_user(&self, user_id: UserId, object_key: Option<&str>) -> Vec<Packet> {
        self.entries
            .iter()
            .filter(|entry| {
                let key = entry.key();
                key.user_id == user_id && key.object_key.as_deref() == object_key
            })
            .flat_map(|entry| entry.value().packets.to_vec())
            .collect()
    }

    /// System-packet maps cached for `user_id`, empty when absent.
    #[must_use]
    pub fn system_packet_maps(&self, user_id: UserId) -> Arc<[SystemPacketMap]> {
        self.system_packets
            .get(&user_id)
            .map(|maps| Arc::clone(maps.value()))
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    #[must_use]
    pub fn has_system_packet_maps(&self, user_id: UserId) -> bool {
        self.system_packets.contains_key(&user_id)
    }

    pub fn set_system_packet_maps(&self, user_id: UserId, maps: Vec<SystemPacketMap>) {
        self.system_packets.insert(user_id, maps.into());
    }

    /// Number of packet entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{PacketId, WorkGroupId};
    use crate::model::{PacketOwner, PacketType};
    use std::collections::BTreeSet;

    fn packet(id: i64, userspace: i64) -> Packet {
        Packet {
            id: PacketId::new(id),
            packet_type: PacketType::Regular,
            grants: BTreeSet::from(["base-system.work-group.read".to_string()]),
            owners: vec![PacketOwner {
                packet_id: PacketId::new(id),
                userspace_id: UserspaceId::new(userspace),
                work_group_id: WorkGroupId::new(1),
                users: vec![UserId::new(42)],
            }],
        }
    }

    #[test]
    fn test_get_missing_returns_empty() {
        let cache = PacketCache::new();
        let key = cache.key(UserId::new(7), None, None);
        assert!(cache.get(&key).is_empty());
        assert!(cache.is_stale_or_missing(&key));
        assert!(cache.entry(&key).is_none());
    }

    #[test]
    fn test_ttl_boundaries() {
        let added_at = Instant::now();
        let entry = CacheEntry::new(vec![], added_at, Some(Duration::from_secs(10)));

        assert!(!entry.is_stale_at(added_at));
        assert!(!entry.is_stale_at(added_at + Duration::from_millis(9_999)));
        assert!(entry.is_stale_at(added_at + Duration::from_secs(10)));
        assert!(entry.is_stale_at(added_at + Duration::from_secs(11)));
    }

    #[test]
    fn test_no_ttl_is_always_stale() {
        let added_at = Instant::now();
        let entry = CacheEntry::new(vec![packet(1, 9)], added_at, None);
        assert!(entry.is_stale_at(added_at));

        let cache = PacketCache::new();
        let key = CacheKey::new(UserId::new(42));
        cache.set(key.clone(), vec![packet(1, 9)], None);
        assert!(cache.is_stale_or_missing(&key));
        // Stale entries are still readable.
        assert_eq!(cache.get(&key).len(), 1);
    }

    #[test]
    fn test_set_replaces_without_merge() {
        let cache = PacketCache::new();
        let key = CacheKey::new(UserId::new(42)).with_userspace(UserspaceId::new(9));

        cache.set(key.clone(), vec![packet(1, 9), packet(2, 9)], Some(Duration::from_secs(60)));
        cache.set(key.clone(), vec![packet(3, 9)], Some(Duration::from_secs(60)));

        let packets = cache.get(&key);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].id, PacketId::new(3));
        assert!(!cache.is_stale_or_missing(&key));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_honours_scope() {
        let user_scoped = PacketCache::with_scope(CacheScope::User);
        let key = user_scoped.key(UserId::new(42), Some(UserspaceId::new(9)), Some("robot"));
        assert_eq!(key.userspace_id, None);
        assert_eq!(key.object_key.as_deref(), Some("robot"));

        let userspace_scoped = PacketCache::new();
        let key = userspace_scoped.key(UserId::new(42), Some(UserspaceId::new(9)), None);
        assert_eq!(key.userspace_id, Some(UserspaceId::new(9)));
    }

    #[test]
    fn test_keys_are_distinct_per_discriminator() {
        let cache = PacketCache::new();
        let base = CacheKey::new(UserId::new(42));
        cache.set(base.clone().with_userspace(UserspaceId::new(9)), vec![packet(1, 9)], None);
        cache.set(base.clone().with_userspace(UserspaceId::new(10)), vec![packet(2, 10)], None);
        cache.set(base.clone().with_object_key("robot"), vec![packet(3, 11)], None);

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&base).is_empty());
        assert_eq!(cache.packets_for_user(UserId::new(42), None).len(), 2);
        assert_eq!(cache.packets_for_user(UserId::new(42), Some("robot")).len(), 1);
        assert!(cache.packets_for_user(UserId::new(7), None).is_empty());
    }

    #[test]
    fn test_system_packet_maps() {
        let cache = PacketCache::new();
        let user = UserId::new(42);
        assert!(!cache.has_system_packet_maps(user));
        assert!(cache.system_packet_maps(user).is_empty());

        cache.set_system_packet_maps(
            user,
            vec![SystemPacketMap {
                userspace_id: UserspaceId::new(9),
                packet_type: PacketType::UserspaceAdmin,
                packet_id: PacketId::new(100),
            }],
        );
        assert!(cache.has_system_packet_maps(user));
        assert_eq!(cache.system_packet_maps(user)[0].packet_id, PacketId::new(100));
    }

    #[test]
    fn test_cache_scope_parse() {
        assert_eq!("user".parse::<CacheScope>().unwrap(), CacheScope::User);
        assert_eq!(" Userspace ".parse::<CacheScope>().unwrap(), CacheScope::Userspace);
        assert!("tenant".parse::<CacheScope>().is_err());
        assert_eq!(CacheScope::User.to_string(), "user");
    }

    #[test]
    fn test_concurrent_writers_last_write_wins() {
        let cache = Arc::new(PacketCache::new());
        let key = CacheKey::new(UserId::new(42));

        let handles: Vec<_> = (1..=8)
            .map(|id| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                std::thread::spawn(move || cache.set(key, vec![packet(id, 9)], None))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.get(&key).len(), 1);
    }
}
