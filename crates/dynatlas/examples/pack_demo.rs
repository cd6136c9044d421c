//! Packs a burst of images through the frame-budgeted queue and prints the
//! resulting atlas layout.
//!
//! Run with `RUST_LOG=dynatlas=trace` to watch the packer's bookkeeping.

use std::time::Duration;

use dynatlas::{
    AtlasManager, CpuBlitter, OperationQueue, OwnerId, PackPolicy, PackWork, RgbaSource, SizeClass,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut manager = AtlasManager::new(CpuBlitter::new(), PackPolicy::default());
    let mut queue: OperationQueue<AtlasManager<CpuBlitter>> = OperationQueue::with_budget(Duration::from_millis(10));
    let owner = OwnerId(1);

    // A bulk UI show: many icons become visible in the same frame.
    let sizes = [(100, 60), (48, 48), (200, 200), (33, 47), (250, 12), (180, 180), (64, 64)];
    for (i, (w, h)) in sizes.into_iter().enumerate() {
        let key = format!("icon-{i}");
        let shade = (40 * (i + 1)) as u8;
        let state = manager.request_placement(
            owner,
            SizeClass::Size512,
            &key,
            w,
            h,
            Box::new(move |p| match p.page {
                Some(page) => println!("{w}x{h} -> page {page} at ({}, {})", p.rect.x, p.rect.y),
                None => println!("{w}x{h} -> rejected"),
            }),
        );
        if state == dynatlas::RequestState::Pending {
            let source = RgbaSource::solid(w, h, [shade, shade, shade, 255]);
            queue.add(Box::new(PackWork::new(i as u64, owner, SizeClass::Size512, key, source)));
        }
    }

    // Drain across simulated frames, re-submitting whatever a tick abandons.
    let mut frame = 0;
    while !queue.is_empty() || frame == 0 {
        let mut outcome = queue.update(&mut manager);
        println!("frame {frame}: processed {} in {:?}", outcome.processed, outcome.elapsed);
        for work in outcome.abandoned.drain(..).rev() {
            queue.add(work);
        }
        frame += 1;
    }

    let diag = manager.diagnostics();
    println!("{}", serde_json::to_string_pretty(&diag).unwrap());

    manager.clear_all_cache();
}
