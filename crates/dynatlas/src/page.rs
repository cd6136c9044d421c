//! A single fixed-size bin and its free-rectangle bookkeeping.

use tracing::trace;

use crate::blit::TextureHandle;
use crate::rect::IntRect;

/// Result of a free-area search: which rectangle fits, and whether it holds
/// the padded request or only the bare content (the near-edge fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeAreaFit {
    pub index: usize,
    pub padded: bool,
}

/// The region carved out of a page for one placement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CarvedArea {
    /// Rectangle the content occupies.
    pub content: IntRect,
    /// Rectangle removed from free space (content plus padding ring). This
    /// is what a release returns to the free list.
    pub carved: IntRect,
}

/// One fixed-size pixel buffer plus its free-rectangle bookkeeping.
///
/// Free rectangles are kept pairwise disjoint, so the free area total plus
/// the carved area total always equals the page area. Guillotine splitting
/// leaves non-mergeable slivers behind; that fragmentation is accepted in
/// exchange for O(free-list) allocation with no rebalancing pass.
#[derive(Debug)]
pub struct Page {
    index: u32,
    width: u32,
    height: u32,
    texture: TextureHandle,
    free_areas: Vec<IntRect>,
}

impl Page {
    pub(crate) fn new(index: u32, width: u32, height: u32, texture: TextureHandle) -> Self {
        Self {
            index,
            width,
            height,
            texture,
            free_areas: vec![IntRect::new(0, 0, width, height)],
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn free_areas(&self) -> &[IntRect] {
        &self.free_areas
    }

    pub fn free_area_count(&self) -> usize {
        self.free_areas.len()
    }

    /// Total unallocated pixels.
    pub fn free_pixels(&self) -> u64 {
        self.free_areas.iter().map(IntRect::area).sum()
    }

    /// Find a free rectangle for `width x height` content.
    ///
    /// Prefers a rectangle that holds the content inflated by `padding` on
    /// every side, falling back to a bare fit so placements near page edges
    /// stay possible. Candidates are ranked by smallest `x` (left-to-right
    /// bias); a rectangle whose edge exactly matches the request is taken
    /// immediately since it leaves no sliver behind.
    pub fn find_free_area(&self, width: u32, height: u32, padding: u32, alignment: u32) -> Option<FreeAreaFit> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }

        let padded_w = width + padding * 2;
        let padded_h = height + padding * 2;

        let mut best: Option<FreeAreaFit> = None;
        let mut best_x = self.width + 1;

        for (i, free) in self.free_areas.iter().enumerate() {
            debug_assert!(
                free.x % alignment == 0 && free.y % alignment == 0,
                "free area {free:?} drifted off the {alignment} alignment grid"
            );

            if free.x < best_x && padded_w <= free.width && padded_h <= free.height {
                best = Some(FreeAreaFit { index: i, padded: true });
                best_x = free.x;
                if padded_w == free.width || padded_h == free.height {
                    break;
                }
            } else if free.x < best_x && width <= free.width && height <= free.height {
                best = Some(FreeAreaFit { index: i, padded: false });
                best_x = free.x;
                if width == free.width || height == free.height {
                    break;
                }
            }
        }

        best
    }

    /// Carve `width x height` content out of the free rectangle chosen by
    /// [`find_free_area`], guillotine-splitting the remainder.
    ///
    /// Every free rectangle overlapping the carved region is decomposed into
    /// up to four disjoint slivers (left/right at full height, top/bottom
    /// clamped to the carved x-range); slivers contained in another new
    /// sliver are filtered out before the survivors rejoin the free list.
    ///
    /// [`find_free_area`]: Page::find_free_area
    pub(crate) fn carve(&mut self, fit: FreeAreaFit, width: u32, height: u32, padding: u32) -> CarvedArea {
        let chosen = self.free_areas.swap_remove(fit.index);

        let (content, carved) = if fit.padded {
            (
                IntRect::new(chosen.x + padding, chosen.y + padding, width, height),
                IntRect::new(chosen.x, chosen.y, width + padding * 2, height + padding * 2),
            )
        } else {
            let content = IntRect::new(chosen.x, chosen.y, width, height);
            (content, content)
        };
        debug_assert!(chosen.contains_rect(&carved), "carve must stay inside the chosen free area");

        let mut new_areas: Vec<IntRect> = Vec::with_capacity(4);
        split_around(&chosen, &carved, &mut new_areas);

        // Free rectangles are disjoint, so nothing else should overlap the
        // carved region; sweep anyway so broken bookkeeping cannot silently
        // double-allocate.
        let mut i = 0;
        while i < self.free_areas.len() {
            if self.free_areas[i].overlaps(&carved) {
                debug_assert!(false, "free areas overlap: {:?} vs carved {carved:?}", self.free_areas[i]);
                let area = self.free_areas.swap_remove(i);
                split_around(&area, &carved, &mut new_areas);
            } else {
                i += 1;
            }
        }

        filter_contained(&mut new_areas);
        trace!(page = self.index, ?carved, slivers = new_areas.len(), "carved area");
        self.free_areas.append(&mut new_areas);

        CarvedArea { content, carved }
    }

    /// Return a previously carved rectangle to the free list, as-is.
    pub(crate) fn add_free_area(&mut self, area: IntRect) {
        debug_assert!(!area.is_empty());
        debug_assert!(
            self.free_areas.iter().all(|f| !f.overlaps(&area)),
            "returned area {area:?} overlaps existing free space"
        );
        self.free_areas.push(area);
    }

    /// Drop all bookkeeping and mark the whole page free again.
    pub(crate) fn reset(&mut self) {
        self.free_areas.clear();
        self.free_areas.push(IntRect::new(0, 0, self.width, self.height));
    }
}

/// Decompose `area \ divider` into up to four disjoint slivers.
fn split_around(area: &IntRect, divider: &IntRect, out: &mut Vec<IntRect>) {
    // Left and right slivers run the full height of the area.
    if divider.x > area.x {
        out.push(IntRect::new(area.x, area.y, divider.x - area.x, area.height));
    }
    if area.right() > divider.right() {
        out.push(IntRect::new(divider.right(), area.y, area.right() - divider.right(), area.height));
    }

    // Top and bottom slivers are clamped to the divider's x-range so the
    // four pieces stay disjoint.
    let mx0 = divider.x.max(area.x);
    let mx1 = divider.right().min(area.right());
    if mx1 > mx0 {
        if divider.y > area.y {
            out.push(IntRect::new(mx0, area.y, mx1 - mx0, divider.y - area.y));
        }
        if area.top() > divider.top() {
            out.push(IntRect::new(mx0, divider.top(), mx1 - mx0, area.top() - divider.top()));
        }
    }
}

/// Remove rectangles fully contained within another rectangle of the batch.
fn filter_contained(areas: &mut Vec<IntRect>) {
    let mut i = 0;
    'outer: while i < areas.len() {
        for j in 0..areas.len() {
            if i != j && areas[j].contains_rect(&areas[i]) {
                areas.swap_remove(i);
                continue 'outer;
            }
        }
        i += 1;
    }
}
