//! Multi-page allocator: request coalescing, reference-counted placements,
//! lazy page growth.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::blit::{PageBlitter, PixelSource};
use crate::config::{PackPolicy, SizeClass};
use crate::page::Page;
use crate::placement::{AlignmentOffset, Placement, PlacementCallback, RequestState};
use crate::pool::{Recycle, RecordPools};
use crate::rect::{ceil_align, floor_align, IntRect};

/// Bookkeeping for one live placement, keyed by name in the atlas.
#[derive(Debug, Default)]
pub struct AllocationRecord {
    pub(crate) page: u32,
    pub(crate) rect: IntRect,
    pub(crate) carved: IntRect,
    pub(crate) offset: AlignmentOffset,
    pub(crate) refs: u32,
}

impl Recycle for AllocationRecord {
    fn recycle(&mut self) {
        self.page = 0;
        self.rect = IntRect::ZERO;
        self.carved = IntRect::ZERO;
        self.offset = AlignmentOffset::default();
        self.refs = 0;
    }
}

/// One waiter for a key that has not been packed yet.
#[derive(Default)]
pub struct PendingRequest {
    pub(crate) key: String,
    pub(crate) callback: Option<PlacementCallback>,
}

impl Recycle for PendingRequest {
    fn recycle(&mut self) {
        self.key.clear();
        self.callback = None;
    }
}

/// Counters for one atlas's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AtlasStats {
    pub pages_created: u32,
    pub placed: u32,
    pub hits: u32,
    pub rejected: u32,
    pub released: u32,
}

/// Point-in-time view of an atlas, for inspectors and logs.
#[derive(Debug, Clone, Serialize)]
pub struct AtlasSnapshot {
    pub name: String,
    pub size_class: SizeClass,
    pub live: usize,
    pub pending: usize,
    pub pages: Vec<PageSnapshot>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageSnapshot {
    pub index: u32,
    pub free_areas: usize,
    pub free_pixels: u64,
}

struct PlacedArea {
    page: u32,
    content: IntRect,
    carved: IntRect,
}

/// An ordered collection of same-size pages serving one size class.
pub struct Atlas {
    name: String,
    size_class: SizeClass,
    policy: PackPolicy,
    pages: Vec<Page>,
    live: HashMap<String, AllocationRecord>,
    pending: Vec<PendingRequest>,
    stats: AtlasStats,
}

impl Atlas {
    pub fn new(name: impl Into<String>, size_class: SizeClass, policy: PackPolicy) -> Self {
        Self {
            name: name.into(),
            size_class,
            policy,
            pages: Vec::new(),
            live: HashMap::new(),
            pending: Vec::new(),
            stats: AtlasStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_class(&self) -> SizeClass {
        self.size_class
    }

    pub fn policy(&self) -> PackPolicy {
        self.policy
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> AtlasStats {
        self.stats
    }

    /// The placement a live key resolves to, if any.
    pub fn placement(&self, key: &str) -> Option<Placement> {
        let rec = self.live.get(key)?;
        Some(Placement {
            texture: Some(self.pages[rec.page as usize].texture()),
            page: Some(rec.page),
            rect: rec.rect,
            offset: rec.offset,
        })
    }

    /// Current reference count for a live key.
    pub fn ref_count(&self, key: &str) -> Option<u32> {
        self.live.get(key).map(|r| r.refs)
    }

    pub fn snapshot(&self) -> AtlasSnapshot {
        AtlasSnapshot {
            name: self.name.clone(),
            size_class: self.size_class,
            live: self.live.len(),
            pending: self.pending.len(),
            pages: self
                .pages
                .iter()
                .map(|p| PageSnapshot {
                    index: p.index(),
                    free_areas: p.free_area_count(),
                    free_pixels: p.free_pixels(),
                })
                .collect(),
        }
    }

    /// Submit a placement request for `key` with the given content size.
    ///
    /// Live keys are served synchronously with a bumped reference count.
    /// Unknown keys become pending; requests for a key already in flight are
    /// coalesced onto it, so a later [`resolve_pending`] packs once and
    /// answers every waiter. Zero-sized and page-exceeding content is
    /// rejected immediately through the sentinel — re-requesting it would
    /// fail identically, so it is never queued.
    ///
    /// [`resolve_pending`]: Atlas::resolve_pending
    pub fn request_placement(
        &mut self,
        key: &str,
        width: u32,
        height: u32,
        callback: PlacementCallback,
        pools: &mut RecordPools,
    ) -> RequestState {
        if let Some(rec) = self.live.get_mut(key) {
            rec.refs += 1;
            self.stats.hits += 1;
            let placement = Placement {
                texture: Some(self.pages[rec.page as usize].texture()),
                page: Some(rec.page),
                rect: rec.rect,
                offset: rec.offset,
            };
            callback(placement);
            return RequestState::Hit;
        }

        let length = self.size_class.length();
        if width == 0 || height == 0 || width > length || height > length {
            warn!(atlas = %self.name, key, width, height, "content cannot be placed on a {length} page");
            self.stats.rejected += 1;
            callback(Placement::UNPLACED);
            return RequestState::Rejected;
        }

        let coalesced = self.pending.iter().any(|p| p.key == key);
        let mut request = pools.requests.acquire();
        request.key.push_str(key);
        request.callback = Some(callback);
        self.pending.push(request);

        if coalesced {
            trace!(atlas = %self.name, key, "coalesced onto in-flight request");
            RequestState::Coalesced
        } else {
            RequestState::Pending
        }
    }

    /// Pack the pending request(s) for `key` and invoke every waiting
    /// callback with the same placement.
    ///
    /// `None` or an unavailable source resolves the waiters with the
    /// sentinel. A key with no pending entries (already resolved, or
    /// cancelled by a release) is a no-op.
    pub fn resolve_pending(
        &mut self,
        key: &str,
        source: Option<&dyn PixelSource>,
        blitter: &mut dyn PageBlitter,
        pools: &mut RecordPools,
    ) {
        if !self.pending.iter().any(|p| p.key == key) {
            return;
        }

        // A stale work item can run after an earlier one already packed the
        // key; late waiters just join the live placement.
        if self.live.contains_key(key) {
            let placement = self.placement(key).unwrap_or(Placement::UNPLACED);
            let joined = self.drain_pending(key, placement, pools);
            if let Some(rec) = self.live.get_mut(key) {
                rec.refs += joined as u32;
            }
            return;
        }

        let Some(source) = source.filter(|s| s.available()) else {
            warn!(atlas = %self.name, key, "source unavailable, resolving waiters with sentinel");
            self.stats.rejected += 1;
            self.drain_pending(key, Placement::UNPLACED, pools);
            return;
        };

        let alignment = self.policy.alignment();
        let src_rect = source.source_rect();
        let width = ceil_align(src_rect.width, alignment);
        let height = ceil_align(src_rect.height, alignment);
        let length = self.size_class.length();
        if width == 0 || height == 0 || width > length || height > length {
            warn!(atlas = %self.name, key, width, height, "aligned content exceeds a {length} page");
            self.stats.rejected += 1;
            self.drain_pending(key, Placement::UNPLACED, pools);
            return;
        }

        let Some(placed) = self.insert_area(width, height, blitter) else {
            self.stats.rejected += 1;
            self.drain_pending(key, Placement::UNPLACED, pools);
            return;
        };

        let page = &self.pages[placed.page as usize];
        let (aligned_src, offset) = align_source_rect(
            src_rect,
            alignment,
            source.width(),
            source.height(),
            placed.content.x,
            placed.content.y,
            page.width(),
            page.height(),
        );
        blitter.copy_region(source, aligned_src, page.texture(), placed.content.x, placed.content.y);

        let mut record = pools.records.acquire();
        record.page = placed.page;
        record.rect = IntRect::new(placed.content.x, placed.content.y, width, height);
        record.carved = placed.carved;
        record.offset = offset;

        let placement = Placement {
            texture: Some(page.texture()),
            page: Some(placed.page),
            rect: record.rect,
            offset,
        };
        record.refs = self.drain_pending(key, placement, pools) as u32;
        self.live.insert(key.to_owned(), record);
        self.stats.placed += 1;
    }

    /// Drop one reference to `key`.
    ///
    /// At zero the record is destroyed and its carved rectangle always
    /// returns to the owning page's free list; `clear_pixels` only controls
    /// whether the vacated region is wiped to transparent. Releasing a key
    /// that is still pending cancels its most recent pending entry without
    /// invoking the queued callback.
    ///
    /// Returns `false` if the key is neither live nor pending.
    pub fn release_placement(
        &mut self,
        key: &str,
        clear_pixels: bool,
        blitter: &mut dyn PageBlitter,
        pools: &mut RecordPools,
    ) -> bool {
        if let Some(mut rec) = self.live.remove(key) {
            rec.refs = rec.refs.saturating_sub(1);
            if rec.refs > 0 {
                self.live.insert(key.to_owned(), rec);
            } else {
                let page = &mut self.pages[rec.page as usize];
                if clear_pixels {
                    blitter.clear_region(page.texture(), rec.carved);
                }
                page.add_free_area(rec.carved);
                trace!(atlas = %self.name, key, page = rec.page, "placement evicted");
                self.stats.released += 1;
                pools.records.release(rec);
            }
            return true;
        }

        // Cancel-before-resolve: drop the newest pending entry for the key.
        for i in (0..self.pending.len()).rev() {
            if self.pending[i].key == key {
                let request = self.pending.remove(i);
                pools.requests.release(request);
                trace!(atlas = %self.name, key, "pending request cancelled");
                return true;
            }
        }

        false
    }

    /// Forget every placement and pending request and mark all pages free.
    /// Pages and their textures stay alive for reuse; the pixel wipe is
    /// skipped when `wipe_pixels` is false (application paused).
    pub fn clear(&mut self, wipe_pixels: bool, blitter: &mut dyn PageBlitter, pools: &mut RecordPools) {
        for (_, record) in self.live.drain() {
            pools.records.release(record);
        }
        for request in self.pending.drain(..) {
            // Queued callbacks are dropped uninvoked on teardown.
            pools.requests.release(request);
        }
        for page in &mut self.pages {
            page.reset();
            if wipe_pixels {
                blitter.clear_region(page.texture(), IntRect::new(0, 0, page.width(), page.height()));
            }
        }
    }

    /// Release every page texture. The atlas is unusable afterwards.
    pub fn destroy(&mut self, blitter: &mut dyn PageBlitter) {
        self.live.clear();
        self.pending.clear();
        for page in self.pages.drain(..) {
            blitter.release_page(page.texture());
        }
    }

    /// First-fit scan over pages in creation order, growing by one lazily
    /// created page when every existing page is exhausted.
    fn insert_area(&mut self, width: u32, height: u32, blitter: &mut dyn PageBlitter) -> Option<PlacedArea> {
        let padding = self.policy.padding();
        let alignment = self.policy.alignment();

        let mut choice = None;
        for (i, page) in self.pages.iter().enumerate() {
            if let Some(fit) = page.find_free_area(width, height, padding, alignment) {
                choice = Some((i, fit));
                break;
            }
        }

        let (index, fit) = match choice {
            Some(c) => c,
            None => {
                debug!(atlas = %self.name, page = self.pages.len(), "no free area, creating page");
                let index = self.create_page(blitter);
                match self.pages[index].find_free_area(width, height, padding, alignment) {
                    Some(fit) => (index, fit),
                    None => {
                        debug_assert!(false, "a fresh page must hold pre-checked content");
                        return None;
                    }
                }
            }
        };

        let area = self.pages[index].carve(fit, width, height, padding);
        debug_assert!(
            area.content.x % alignment == 0 && area.content.y % alignment == 0,
            "placement {:?} is off the {alignment} alignment grid",
            area.content
        );
        Some(PlacedArea { page: index as u32, content: area.content, carved: area.carved })
    }

    fn create_page(&mut self, blitter: &mut dyn PageBlitter) -> usize {
        let length = self.size_class.length();
        let index = self.pages.len() as u32;
        let label = format!("{}-{length}x{length}-{index}", self.name);
        let texture = blitter.create_page(length, length, &label);
        self.pages.push(Page::new(index, length, length, texture));
        self.stats.pages_created += 1;
        self.pages.len() - 1
    }

    /// Remove every pending entry for `key`, invoking each callback with
    /// `placement`. Returns how many waiters were answered.
    fn drain_pending(&mut self, key: &str, placement: Placement, pools: &mut RecordPools) -> usize {
        let mut answered = 0;
        for i in (0..self.pending.len()).rev() {
            if self.pending[i].key == key {
                let mut request = self.pending.remove(i);
                if let Some(callback) = request.callback.take() {
                    callback(placement);
                    answered += 1;
                }
                pools.requests.release(request);
            }
        }
        answered
    }
}

impl std::fmt::Debug for Atlas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atlas")
            .field("name", &self.name)
            .field("size_class", &self.size_class)
            .field("pages", &self.pages.len())
            .field("live", &self.live.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Expand a source rectangle to copy-block boundaries.
///
/// The copied region's edges are floor/ceil rounded to the alignment and
/// clamped to the backing image; the width and height are trimmed (on the
/// alignment grid) where the destination would run past the page edge. The
/// returned offset says where the requested content sits inside the
/// expanded block.
#[allow(clippy::too_many_arguments)]
fn align_source_rect(
    src: IntRect,
    alignment: u32,
    image_width: u32,
    image_height: u32,
    dst_x: u32,
    dst_y: u32,
    page_width: u32,
    page_height: u32,
) -> (IntRect, AlignmentOffset) {
    let min_x = floor_align(src.x, alignment);
    let min_y = floor_align(src.y, alignment);
    let max_x = ceil_align(src.right(), alignment).min(image_width);
    let max_y = ceil_align(src.top(), alignment).min(image_height);

    let mut width = max_x.saturating_sub(min_x);
    let mut height = max_y.saturating_sub(min_y);
    if dst_x + width > page_width {
        width = floor_align(page_width - dst_x, alignment);
    }
    if dst_y + height > page_height {
        height = floor_align(page_height - dst_y, alignment);
    }

    (
        IntRect::new(min_x, min_y, width, height),
        AlignmentOffset { x: src.x - min_x, y: src.y - min_y },
    )
}
