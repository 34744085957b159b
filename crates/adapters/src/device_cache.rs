//! LRU-backed, per-resource device cache (C2).
//!
//! One [`PerDeviceCache`] exists per known [`Resource`]; [`DeviceCacheRegistry`]
//! holds them behind a single registry mutex, lazily constructing a device's
//! cache the first time it is referenced — the same shape as the original
//! `GpuCacheMgr` singleton map, generalized to cover `Disk`/`Cpu` as well as
//! every `Gpu(id)`. Eviction is strict LRU at key granularity; `lru::LruCache`
//! supplies the recency ordering, and this module layers the byte-budget
//! watermark math on top rather than relying on `lru`'s entry-count capacity.

use lru::LruCache;
use segmentdb_domain::{Resource, SegmentFileId};
use segmentdb_ports::BoxFuture;
use segmentdb_scheduler::DeviceCache;
use segmentdb_shared::invariants::BoundedU32;
use segmentdb_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Percentage-bounded low-watermark target for post-eviction occupancy.
pub type FreeMemPercent = BoundedU32<0, 100>;

struct CacheEntry {
    bytes: Arc<Vec<u8>>,
    size: u64,
}

struct PerDeviceState {
    entries: LruCache<SegmentFileId, CacheEntry>,
    capacity: u64,
    current_size: u64,
    free_mem_percent: FreeMemPercent,
    enabled: bool,
}

impl PerDeviceState {
    fn watermark_bytes(&self) -> u64 {
        (u128::from(self.capacity) * u128::from(self.free_mem_percent.get()) / 100) as u64
    }

    /// Evicts least-recently-used entries until `current_size + incoming`
    /// fits under the watermark, or the cache runs out of entries to evict.
    /// Returns whether the target was reached.
    fn evict_for(&mut self, incoming: u64) -> bool {
        let target = self.watermark_bytes();
        while self.current_size.saturating_add(incoming) > target {
            let Some((_, entry)) = self.entries.pop_lru() else {
                return false;
            };
            self.current_size = self.current_size.saturating_sub(entry.size);
            tracing::debug!(size = entry.size, "device cache evicted lru entry");
        }
        true
    }
}

/// A single resource's cache of loaded index/artifact bytes.
struct PerDeviceCache {
    state: Mutex<PerDeviceState>,
}

impl PerDeviceCache {
    fn new(capacity: u64, free_mem_percent: FreeMemPercent) -> Self {
        Self {
            state: Mutex::new(PerDeviceState {
                entries: LruCache::new(NonZeroUsize::MAX),
                capacity,
                current_size: 0,
                free_mem_percent,
                enabled: true,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PerDeviceState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn contains(&self, key: &SegmentFileId) -> bool {
        self.lock().entries.peek(key).is_some()
    }

    fn get(&self, key: &SegmentFileId) -> Option<Arc<Vec<u8>>> {
        self.lock().entries.get(key).map(|entry| Arc::clone(&entry.bytes))
    }

    /// Evicts enough headroom to fit `size` bytes, or fails once the cache
    /// is empty and still over the watermark.
    fn reserve(&self, size: u64) -> bool {
        self.lock().evict_for(size)
    }

    fn insert(&self, key: SegmentFileId, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len() as u64;
        let mut state = self.lock();
        if !state.enabled {
            return Ok(());
        }
        if !state.evict_for(size) {
            return Err(ErrorEnvelope::expected(
                ErrorCode::capacity_exceeded(),
                format!("cache cannot make room for a {size}-byte insert"),
            ));
        }
        state.current_size += size;
        state.entries.put(key, CacheEntry { bytes: Arc::new(bytes), size });
        Ok(())
    }

    fn set_capacity(&self, capacity: u64) {
        let mut state = self.lock();
        state.capacity = capacity;
        state.evict_for(0);
    }

    fn set_free_mem_percent(&self, percent: FreeMemPercent) {
        let mut state = self.lock();
        state.free_mem_percent = percent;
        state.evict_for(0);
    }

    fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }
}

/// Construction parameters shared by every lazily-created per-device cache.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCacheDefaults {
    /// Capacity in bytes for a newly-created device cache.
    pub capacity_bytes: u64,
    /// Low-watermark target applied after eviction.
    pub free_mem_percent: FreeMemPercent,
}

/// One cache per known [`Resource`], lazily constructed and held behind a
/// single registry mutex — analogous to the original `GpuCacheMgr` map.
pub struct DeviceCacheRegistry {
    caches: Mutex<HashMap<Resource, Arc<PerDeviceCache>>>,
    defaults: DeviceCacheDefaults,
}

impl DeviceCacheRegistry {
    /// Builds an empty registry; every device's cache is created on first
    /// reference, seeded from `defaults`.
    #[must_use]
    pub fn new(defaults: DeviceCacheDefaults) -> Self {
        Self { caches: Mutex::new(HashMap::new()), defaults }
    }

    fn cache_for(&self, device: Resource) -> Arc<PerDeviceCache> {
        let mut caches = self.caches.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            caches
                .entry(device)
                .or_insert_with(|| Arc::new(PerDeviceCache::new(self.defaults.capacity_bytes, self.defaults.free_mem_percent))),
        )
    }

    /// Evicts enough of `device`'s cache to free `size` bytes of headroom.
    #[must_use]
    pub fn reserve(&self, device: Resource, size: u64) -> bool {
        self.cache_for(device).reserve(size)
    }

    /// Resizes `device`'s cache capacity, evicting down to the watermark if
    /// the new capacity is smaller.
    pub fn set_capacity(&self, device: Resource, capacity_bytes: u64) {
        self.cache_for(device).set_capacity(capacity_bytes);
    }

    /// Sets `device`'s low-watermark target, evicting if now over it.
    pub fn set_free_mem_percent(&self, device: Resource, percent: FreeMemPercent) {
        self.cache_for(device).set_free_mem_percent(percent);
    }

    /// Enables or disables `device`'s cache; `insert` is a no-op while disabled.
    pub fn set_enabled(&self, device: Resource, enabled: bool) {
        self.cache_for(device).set_enabled(enabled);
    }
}

impl DeviceCache for DeviceCacheRegistry {
    fn contains(&self, device: Resource, key: &SegmentFileId) -> bool {
        self.cache_for(device).contains(key)
    }

    fn get<'a>(&'a self, _ctx: &'a RequestContext, device: Resource, key: &'a SegmentFileId) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        let cache = self.cache_for(device);
        let key = key.clone();
        Box::pin(async move { Ok(cache.get(&key).map(|bytes| (*bytes).clone())) })
    }

    fn insert<'a>(&'a self, _ctx: &'a RequestContext, device: Resource, key: SegmentFileId, bytes: Vec<u8>) -> BoxFuture<'a, Result<()>> {
        let cache = self.cache_for(device);
        Box::pin(async move { cache.insert(key, bytes) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percent(value: u32) -> FreeMemPercent {
        FreeMemPercent::new(value).expect("valid percent")
    }

    fn registry(capacity_bytes: u64, free_mem_percent: u32) -> DeviceCacheRegistry {
        DeviceCacheRegistry::new(DeviceCacheDefaults { capacity_bytes, free_mem_percent: percent(free_mem_percent) })
    }

    fn key(name: &str) -> SegmentFileId {
        SegmentFileId::parse(name).expect("valid id")
    }

    #[test]
    fn eviction_follows_watermark_scenario() {
        let registry = registry(100, 85);
        let cache = registry.cache_for(Resource::Cpu);
        cache.insert(key("a"), vec![0u8; 40]).expect("insert a");
        cache.insert(key("b"), vec![0u8; 40]).expect("insert b");
        cache.insert(key("c"), vec![0u8; 30]).expect("insert c");

        assert!(!cache.contains(&key("a")));
        assert!(cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert_eq!(cache.lock().current_size, 70);
    }

    #[test]
    fn get_promotes_recency_ahead_of_insert_order() {
        let registry = registry(100, 85);
        let cache = registry.cache_for(Resource::Cpu);
        cache.insert(key("a"), vec![0u8; 40]).expect("insert a");
        cache.insert(key("b"), vec![0u8; 40]).expect("insert b");
        assert!(cache.get(&key("a")).is_some());

        cache.insert(key("c"), vec![0u8; 30]).expect("insert c");
        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
    }

    #[test]
    fn oversized_insert_into_empty_cache_fails() {
        let registry = registry(100, 85);
        let cache = registry.cache_for(Resource::Cpu);
        let result = cache.insert(key("huge"), vec![0u8; 200]);
        assert!(result.is_err());
    }

    #[test]
    fn disabled_device_makes_insert_a_no_op() {
        let registry = registry(100, 85);
        registry.set_enabled(Resource::Gpu(0), false);
        let cache = registry.cache_for(Resource::Gpu(0));
        cache.insert(key("a"), vec![0u8; 10]).expect("no-op insert");
        assert!(!cache.contains(&key("a")));
    }

    #[test]
    fn reserve_frees_headroom_without_inserting() {
        let registry = registry(100, 85);
        let cache = registry.cache_for(Resource::Cpu);
        cache.insert(key("a"), vec![0u8; 80]).expect("insert a");
        assert!(cache.reserve(50));
        assert!(!cache.contains(&key("a")));
    }

    #[test]
    fn shrinking_capacity_evicts_down_to_new_watermark() {
        let registry = registry(100, 85);
        registry.set_free_mem_percent(Resource::Cpu, percent(85));
        let cache = registry.cache_for(Resource::Cpu);
        cache.insert(key("a"), vec![0u8; 60]).expect("insert a");
        registry.set_capacity(Resource::Cpu, 50);
        assert!(!cache.contains(&key("a")));
    }

    #[test]
    fn distinct_devices_have_independent_caches() {
        let registry = registry(100, 85);
        let cpu = registry.cache_for(Resource::Cpu);
        let gpu = registry.cache_for(Resource::Gpu(1));
        cpu.insert(key("a"), vec![0u8; 10]).expect("insert a");
        assert!(cpu.contains(&key("a")));
        assert!(!gpu.contains(&key("a")));
    }
}
