//! In-process device residency cache.
//!
//! Unlike [`segmentdb_ports::SegmentStore`] and
//! [`segmentdb_ports::MetadataCatalog`], a device cache crosses no external
//! system boundary — it is a pure in-memory structure, so it lives here
//! rather than in `ports`. A concrete LRU-backed implementation is provided
//! by the adapters layer; this crate only depends on the trait.

use segmentdb_domain::SegmentFileId;
use segmentdb_domain::Resource;
use segmentdb_ports::BoxFuture;
use segmentdb_shared::Result;
use segmentdb_shared::RequestContext;

/// Tracks which device currently holds a decoded index artifact in memory.
///
/// `contains` is synchronous and cheap: placement passes call it while
/// choosing a resource and must never block or await. `get`/`insert` do the
/// actual (possibly expensive) residency I/O and are only called from the
/// worker loop once a resource has already been chosen.
pub trait DeviceCache: Send + Sync {
    /// Returns whether `device` already holds the artifact keyed by `key`,
    /// without touching it. Used by placement passes to prefer a warm
    /// device over a cold one.
    fn contains(&self, device: Resource, key: &SegmentFileId) -> bool;

    /// Fetches the cached bytes for `key` on `device`, if present.
    fn get<'a>(
        &'a self,
        ctx: &'a RequestContext,
        device: Resource,
        key: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>>>;

    /// Inserts `bytes` into `device`'s cache under `key`, evicting as needed.
    fn insert<'a>(
        &'a self,
        ctx: &'a RequestContext,
        device: Resource,
        key: SegmentFileId,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<()>>;
}

impl DeviceCache for std::sync::Arc<dyn DeviceCache> {
    fn contains(&self, device: Resource, key: &SegmentFileId) -> bool {
        (**self).contains(device, key)
    }

    fn get<'a>(
        &'a self,
        ctx: &'a RequestContext,
        device: Resource,
        key: &'a SegmentFileId,
    ) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        (**self).get(ctx, device, key)
    }

    fn insert<'a>(
        &'a self,
        ctx: &'a RequestContext,
        device: Resource,
        key: SegmentFileId,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<()>> {
        (**self).insert(ctx, device, key, bytes)
    }
}
