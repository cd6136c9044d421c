//! End-to-end packing behavior through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dynatlas::{
    Atlas, AtlasManager, CpuBlitter, IntRect, OperationQueue, OwnerId, PackPolicy, PackWork,
    Placement, PlacementCallback, RecordPools, RgbaSource, SizeClass,
};

const OWNER: OwnerId = OwnerId(1);

fn manager() -> AtlasManager<CpuBlitter> {
    AtlasManager::new(CpuBlitter::new(), PackPolicy::default())
}

fn capture() -> (Rc<Cell<Option<Placement>>>, PlacementCallback) {
    let slot = Rc::new(Cell::new(None));
    let inner = Rc::clone(&slot);
    (slot, Box::new(move |p| inner.set(Some(p))))
}

fn pack(mgr: &mut AtlasManager<CpuBlitter>, size: SizeClass, key: &str, w: u32, h: u32) -> Placement {
    let (slot, cb) = capture();
    mgr.request_placement(OWNER, size, key, w, h, cb);
    let img = RgbaSource::solid(w, h, [200, 100, 50, 255]);
    mgr.resolve_pending(OWNER, size, key, Some(&img));
    slot.get().expect("resolve must invoke the callback")
}

/// Every pair of placements on the same page must be disjoint, and every
/// placement must be disjoint from every free rectangle of its page.
fn assert_no_overlap(atlas: &Atlas, keys: &[String]) {
    let placed: Vec<(u32, IntRect)> = keys
        .iter()
        .filter_map(|k| atlas.placement(k))
        .map(|p| (p.page.unwrap(), p.rect))
        .collect();

    for (i, (page_a, a)) in placed.iter().enumerate() {
        for (page_b, b) in &placed[i + 1..] {
            if page_a == page_b {
                assert!(!a.overlaps(b), "placements overlap on page {page_a}: {a:?} {b:?}");
            }
        }
        for free in atlas.pages()[*page_a as usize].free_areas() {
            assert!(!a.overlaps(free), "placement {a:?} overlaps free rect {free:?}");
        }
    }
}

#[test]
fn test_single_image_lifecycle_on_1024_page() {
    let mut mgr = manager();
    let placement = pack(&mut mgr, SizeClass::Size1024, "img1", 100, 60);

    assert!(placement.is_placed());
    assert_eq!(placement.page, Some(0));
    assert_eq!(placement.rect.x % 4, 0);
    assert_eq!(placement.rect.y % 4, 0);
    assert_eq!(placement.rect.width, 100);
    assert_eq!(placement.rect.height, 60);

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size1024).unwrap();
    let occupied = 1024 * 1024 - atlas.pages()[0].free_pixels();
    assert!(occupied >= 100 * 60, "carved area covers at least the content");

    assert!(mgr.release_placement(OWNER, SizeClass::Size1024, "img1", true));
    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size1024).unwrap();
    assert_eq!(atlas.live_count(), 0);
    assert_eq!(atlas.pages()[0].free_pixels(), 1024 * 1024, "released area returns to the free list");
}

#[test]
fn test_bulk_packing_grows_pages_lazily() {
    let mut mgr = manager();

    // No request yet, no pages.
    mgr.request_placement(OWNER, SizeClass::Size512, "probe", 200, 200, Box::new(|_| {}));
    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    assert_eq!(atlas.page_count(), 0, "pages appear only when a resolve needs one");
    mgr.release_placement(OWNER, SizeClass::Size512, "probe", false);

    let keys: Vec<String> = (0..20).map(|i| format!("img{i}")).collect();
    for key in &keys {
        let p = pack(&mut mgr, SizeClass::Size512, key, 200, 200);
        assert!(p.is_placed(), "{key} must place");
    }

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    // A 512 page holds four padded 200x200 images (216x216 each).
    assert!(atlas.page_count() >= 2, "cumulative area must force growth");
    assert_eq!(atlas.live_count(), 20);
    assert_no_overlap(atlas, &keys);

    // Page indices are stable and in creation order.
    for (i, page) in atlas.pages().iter().enumerate() {
        assert_eq!(page.index() as usize, i);
    }
}

#[test]
fn test_oversized_request_yields_sentinel_and_no_state() {
    let mut mgr = manager();
    let (slot, cb) = capture();

    mgr.request_placement(OWNER, SizeClass::Size1024, "imgA", 2000, 2000, cb);
    let placement = slot.get().expect("rejection resolves synchronously");
    assert!(!placement.is_placed());
    assert_eq!(placement.texture, None);
    assert_eq!(placement.rect, IntRect::ZERO);

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size1024).unwrap();
    assert_eq!(atlas.page_count(), 0, "no page created for an oversized request");
    assert_eq!(atlas.live_count(), 0);
    assert_eq!(atlas.pending_count(), 0);
    assert_eq!(atlas.stats().rejected, 1);
}

#[test]
fn test_refcount_balances_to_zero() {
    let mut mgr = manager();
    let n = 5;

    pack(&mut mgr, SizeClass::Size512, "icon", 48, 48);
    for _ in 1..n {
        let (slot, cb) = capture();
        mgr.request_placement(OWNER, SizeClass::Size512, "icon", 48, 48, cb);
        assert!(slot.get().unwrap().is_placed(), "cache hits resolve synchronously");
    }

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    assert_eq!(atlas.ref_count("icon"), Some(n));

    for i in 0..n {
        assert!(mgr.release_placement(OWNER, SizeClass::Size512, "icon", true));
        let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
        let expect_live = if i + 1 < n { 1 } else { 0 };
        assert_eq!(atlas.live_count(), expect_live);
    }

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    assert_eq!(atlas.pages()[0].free_pixels(), 512 * 512, "space reclaimed exactly once");
    assert!(!mgr.release_placement(OWNER, SizeClass::Size512, "icon", true), "over-release is refused");
}

#[test]
fn test_same_tick_requests_coalesce_into_one_insert() {
    let mut mgr = manager();
    let placements: Rc<RefCell<Vec<Placement>>> = Rc::new(RefCell::new(Vec::new()));

    for _ in 0..4 {
        let sink = Rc::clone(&placements);
        mgr.request_placement(
            OWNER,
            SizeClass::Size512,
            "face",
            64,
            64,
            Box::new(move |p| sink.borrow_mut().push(p)),
        );
    }

    let img = RgbaSource::solid(64, 64, [9, 9, 9, 255]);
    mgr.resolve_pending(OWNER, SizeClass::Size512, "face", Some(&img));

    let placements = placements.borrow();
    assert_eq!(placements.len(), 4, "every waiter is answered");
    assert!(placements.iter().all(|p| *p == placements[0]), "all waiters share one placement");

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    assert_eq!(atlas.stats().placed, 1, "one pack operation for all waiters");
    assert_eq!(atlas.ref_count("face"), Some(4));
}

#[test]
fn test_all_positions_stay_on_alignment_grid() {
    let mut mgr = manager();
    let sizes = [(100, 60), (33, 47), (7, 7), (250, 12), (64, 64), (121, 93), (16, 200)];

    for (i, (w, h)) in sizes.iter().enumerate() {
        let key = format!("img{i}");
        let p = pack(&mut mgr, SizeClass::Size1024, &key, *w, *h);
        assert!(p.is_placed());
        assert_eq!(p.rect.x % 4, 0, "{key} x off grid");
        assert_eq!(p.rect.y % 4, 0, "{key} y off grid");
    }
}

#[test]
fn test_freed_space_is_reused_under_churn() {
    let mut mgr = manager();

    // Fill and empty the page repeatedly with a working set that fits in
    // one page; churn must never force a second page.
    for round in 0..10 {
        let keys: Vec<String> = (0..4).map(|i| format!("r{round}-{i}")).collect();
        for key in &keys {
            assert!(pack(&mut mgr, SizeClass::Size512, key, 180, 180).is_placed());
        }
        for key in &keys {
            mgr.release_placement(OWNER, SizeClass::Size512, key, true);
        }
    }

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    assert_eq!(atlas.page_count(), 1, "churn within one page's capacity must not grow");
    assert_eq!(atlas.pages()[0].free_pixels(), 512 * 512);
}

#[test]
fn test_queue_driven_packing_resolves_newest_first() {
    let mut mgr = manager();
    let mut queue: OperationQueue<AtlasManager<CpuBlitter>> = OperationQueue::new();
    let order: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    for (id, key) in ["old", "mid", "new"].iter().enumerate() {
        let sink = Rc::clone(&order);
        let name = key.to_string();
        mgr.request_placement(
            OWNER,
            SizeClass::Size512,
            key,
            32,
            32,
            Box::new(move |p| {
                assert!(p.is_placed());
                sink.borrow_mut().push(name);
            }),
        );
        let source = RgbaSource::solid(32, 32, [id as u8, 0, 0, 255]);
        queue.add(Box::new(PackWork::new(id as u64, OWNER, SizeClass::Size512, *key, source)));
    }

    let outcome = queue.update(&mut mgr);
    assert_eq!(outcome.processed, 3);
    assert_eq!(*order.borrow(), vec!["new", "mid", "old"]);

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    assert_eq!(atlas.live_count(), 3);
    assert_eq!(atlas.pending_count(), 0);
}

#[test]
fn test_padded_placements_leave_a_gap() {
    let mut mgr = manager();
    let a = pack(&mut mgr, SizeClass::Size512, "a", 64, 64);
    let b = pack(&mut mgr, SizeClass::Size512, "b", 64, 64);

    assert_eq!(a.page, b.page);
    // Neighboring placements are separated by at least the 8px padding on
    // each side, so samples cannot bleed across.
    let dx = if b.rect.x >= a.rect.right() { b.rect.x - a.rect.right() } else { u32::MAX };
    let dy = if b.rect.y >= a.rect.top() { b.rect.y - a.rect.top() } else { u32::MAX };
    assert!(dx >= 8 || dy >= 8, "gap too small: dx={dx} dy={dy}");
}

#[test]
fn test_unpadded_fallback_fills_a_whole_page() {
    let mut mgr = manager();
    // 512x512 content on a 512 page fits only through the unpadded path.
    let p = pack(&mut mgr, SizeClass::Size512, "full", 512, 512);
    assert!(p.is_placed());
    assert_eq!(p.rect, IntRect::new(0, 0, 512, 512));

    let atlas = mgr.set(OWNER).unwrap().atlas(SizeClass::Size512).unwrap();
    assert_eq!(atlas.pages()[0].free_pixels(), 0);
}

#[test]
fn test_pixels_land_at_the_placement() {
    let mut mgr = manager();
    let p = pack(&mut mgr, SizeClass::Size512, "img", 16, 16);
    let texture = p.texture.unwrap();

    let inside = mgr.blitter().pixel(texture, p.rect.x, p.rect.y);
    assert_eq!(inside, Some([200, 100, 50, 255]));

    // The padding ring around the content stays transparent.
    if p.rect.x >= 8 {
        let ring = mgr.blitter().pixel(texture, p.rect.x - 8, p.rect.y);
        assert_eq!(ring, Some([0, 0, 0, 0]));
    }
}

#[test]
fn test_direct_atlas_api_matches_manager_path() {
    let mut atlas = Atlas::new("direct", SizeClass::Size256, PackPolicy::default());
    let mut blitter = CpuBlitter::new();
    let mut pools = RecordPools::new();

    let (slot, cb) = capture();
    atlas.request_placement("x", 40, 40, cb, &mut pools);
    let img = RgbaSource::solid(40, 40, [1, 2, 3, 255]);
    atlas.resolve_pending("x", Some(&img), &mut blitter, &mut pools);

    let placement = slot.get().unwrap();
    assert_eq!(Some(placement), atlas.placement("x"));
    assert_eq!(atlas.snapshot().pages.len(), 1);
    assert_eq!(atlas.snapshot().live, 1);
}
