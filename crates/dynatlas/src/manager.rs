//! The session-owned entry point multiplexing atlas sets per owner.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::atlas::AtlasSnapshot;
use crate::blit::{PageBlitter, PixelSource};
use crate::config::{PackPolicy, SizeClass};
use crate::placement::{Placement, PlacementCallback, RequestState};
use crate::pool::{Pool, RecordPools};
use crate::queue::QueuedWork;
use crate::set::AtlasSet;

/// Identifies the logical owner of an atlas namespace, typically one UI
/// root. Clearing one owner's atlases never disturbs another's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OwnerId(pub u64);

/// Notified after an owner's set is torn down, so consumers that packed
/// into it can reset to their pre-pack state.
pub type ClearListener = Box<dyn FnMut(OwnerId)>;

/// Point-in-time view of the whole manager.
#[derive(Debug, Serialize)]
pub struct ManagerDiagnostics {
    pub paused: bool,
    pub pooled_sets: usize,
    pub owners: Vec<OwnerDiagnostics>,
}

#[derive(Debug, Serialize)]
pub struct OwnerDiagnostics {
    pub owner: OwnerId,
    pub label: String,
    pub atlases: Vec<AtlasSnapshot>,
}

/// Owns the blitter, the per-owner atlas sets, and the record pools.
///
/// One manager lives for one session, created by the application context and
/// passed explicitly to UI construction. All operations are synchronous and
/// single-threaded; deferral happens in [`OperationQueue`], not here.
///
/// [`OperationQueue`]: crate::queue::OperationQueue
pub struct AtlasManager<B: PageBlitter> {
    blitter: B,
    policy: PackPolicy,
    sets: HashMap<OwnerId, AtlasSet>,
    set_pool: Pool<AtlasSet>,
    sets_created: u64,
    pools: RecordPools,
    paused: bool,
    clear_listeners: Vec<ClearListener>,
}

impl<B: PageBlitter> AtlasManager<B> {
    /// Sets kept warm in the pool from the start, sized for the common case
    /// of a few simultaneously live UI roots.
    pub const PREWARMED_SETS: usize = 3;

    pub fn new(blitter: B, policy: PackPolicy) -> Self {
        let mut set_pool = Pool::new();
        for _ in 0..Self::PREWARMED_SETS {
            set_pool.release(AtlasSet::default());
        }
        Self {
            blitter,
            policy,
            sets: HashMap::new(),
            set_pool,
            sets_created: 0,
            pools: RecordPools::new(),
            paused: false,
            clear_listeners: Vec::new(),
        }
    }

    pub fn policy(&self) -> PackPolicy {
        self.policy
    }

    pub fn blitter(&self) -> &B {
        &self.blitter
    }

    pub fn blitter_mut(&mut self) -> &mut B {
        &mut self.blitter
    }

    pub fn pools(&self) -> &RecordPools {
        &self.pools
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    pub fn set(&self, owner: OwnerId) -> Option<&AtlasSet> {
        self.sets.get(&owner)
    }

    /// While paused, releases skip the transparent pixel wipe; space is
    /// still reclaimed.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Register a callback fired after each owner's set teardown.
    pub fn add_clear_listener(&mut self, listener: ClearListener) {
        self.clear_listeners.push(listener);
    }

    /// Submit a placement request under `owner` for the given size class.
    ///
    /// On [`RequestState::Pending`] the caller should enqueue a [`PackWork`]
    /// item carrying the pixel source; hits, coalesced joins, and rejections
    /// need no further work.
    pub fn request_placement(
        &mut self,
        owner: OwnerId,
        size_class: SizeClass,
        key: &str,
        width: u32,
        height: u32,
        callback: PlacementCallback,
    ) -> RequestState {
        let policy = self.policy;
        let set = Self::set_entry(&mut self.sets, &mut self.set_pool, &mut self.sets_created, owner);
        set.atlas_mut(size_class, policy).request_placement(key, width, height, callback, &mut self.pools)
    }

    /// Pack the pending request(s) for `key`. A stale call after the owner's
    /// set was cleared is a no-op.
    pub fn resolve_pending(
        &mut self,
        owner: OwnerId,
        size_class: SizeClass,
        key: &str,
        source: Option<&dyn PixelSource>,
    ) {
        let Some(set) = self.sets.get_mut(&owner) else { return };
        let policy = self.policy;
        set.atlas_mut(size_class, policy).resolve_pending(key, source, &mut self.blitter, &mut self.pools);
    }

    /// Drop one reference to `key`, or cancel its pending request.
    pub fn release_placement(&mut self, owner: OwnerId, size_class: SizeClass, key: &str, clear_pixels: bool) -> bool {
        let Some(set) = self.sets.get_mut(&owner) else { return false };
        let policy = self.policy;
        let wipe = clear_pixels && !self.paused;
        set.atlas_mut(size_class, policy).release_placement(key, wipe, &mut self.blitter, &mut self.pools)
    }

    /// The live placement for a key, if resolved.
    pub fn placement(&self, owner: OwnerId, size_class: SizeClass, key: &str) -> Option<Placement> {
        self.sets.get(&owner)?.atlas(size_class)?.placement(key)
    }

    /// Tear down every atlas and page under `owner`, recycle the set, and
    /// notify registered clear listeners. Returns `false` for an unknown
    /// owner.
    pub fn clear_set(&mut self, owner: OwnerId) -> bool {
        let Some(mut set) = self.sets.remove(&owner) else { return false };
        info!(owner = owner.0, label = set.label(), "clearing atlas set");
        set.destroy(&mut self.blitter, &mut self.pools);
        self.set_pool.release(set);
        for listener in &mut self.clear_listeners {
            listener(owner);
        }
        true
    }

    /// Tear down every owner's set. Used on memory pressure or scene
    /// teardown.
    pub fn clear_all_cache(&mut self) {
        let mut owners: Vec<OwnerId> = self.sets.keys().copied().collect();
        owners.sort();
        debug!(owners = owners.len(), "clearing all atlas sets");
        for owner in owners {
            self.clear_set(owner);
        }
    }

    pub fn diagnostics(&self) -> ManagerDiagnostics {
        let mut owners: Vec<OwnerDiagnostics> = self
            .sets
            .iter()
            .map(|(owner, set)| OwnerDiagnostics {
                owner: *owner,
                label: set.label().to_owned(),
                atlases: set.snapshots(),
            })
            .collect();
        owners.sort_by_key(|o| o.owner);
        ManagerDiagnostics { paused: self.paused, pooled_sets: self.set_pool.pooled(), owners }
    }

    fn set_entry<'a>(
        sets: &'a mut HashMap<OwnerId, AtlasSet>,
        set_pool: &mut Pool<AtlasSet>,
        sets_created: &mut u64,
        owner: OwnerId,
    ) -> &'a mut AtlasSet {
        sets.entry(owner).or_insert_with(|| {
            let mut set = set_pool.acquire();
            set.assign(&format!("set-{}", *sets_created));
            *sets_created += 1;
            set
        })
    }
}

impl<B: PageBlitter> std::fmt::Debug for AtlasManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasManager")
            .field("sets", &self.sets.len())
            .field("pooled_sets", &self.set_pool.pooled())
            .field("paused", &self.paused)
            .finish()
    }
}

/// A queued pack operation: resolves one pending key against its pixel
/// source when the frame budget reaches it.
pub struct PackWork<S> {
    work_id: u64,
    owner: OwnerId,
    size_class: SizeClass,
    key: String,
    source: S,
}

impl<S> PackWork<S> {
    pub fn new(work_id: u64, owner: OwnerId, size_class: SizeClass, key: impl Into<String>, source: S) -> Self {
        Self { work_id, owner, size_class, key: key.into(), source }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<S: PixelSource, B: PageBlitter> QueuedWork<AtlasManager<B>> for PackWork<S> {
    fn work_id(&self) -> u64 {
        self.work_id
    }

    fn run(self: Box<Self>, manager: &mut AtlasManager<B>) {
        manager.resolve_pending(self.owner, self.size_class, &self.key, Some(&self.source));
    }
}
