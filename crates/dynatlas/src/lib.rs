//! dynatlas: a dynamic texture-atlas engine for UI sprite batching.
//!
//! An online 2D rectangle bin-packing allocator: variable-sized images are
//! placed into fixed-size pages with padding and block-alignment
//! constraints, grown one page at a time on exhaustion, evicted by
//! reference count, and packed under a per-frame wall-clock budget.
//!
//! The crate never touches GPU resources or decodes image formats. Pixels
//! come in through [`PixelSource`] and land in pages through [`PageBlitter`];
//! the renderer layer implements both seams ([`CpuBlitter`] is the bundled
//! software implementation).
//!
//! ```
//! use dynatlas::{AtlasManager, CpuBlitter, OwnerId, PackPolicy, RgbaSource, SizeClass};
//!
//! let mut manager = AtlasManager::new(CpuBlitter::new(), PackPolicy::default());
//! let owner = OwnerId(1);
//!
//! manager.request_placement(owner, SizeClass::Size1024, "icon", 100, 60, Box::new(|placement| {
//!     assert!(placement.is_placed());
//! }));
//! let icon = RgbaSource::solid(100, 60, [255, 0, 0, 255]);
//! manager.resolve_pending(owner, SizeClass::Size1024, "icon", Some(&icon));
//!
//! let placement = manager.placement(owner, SizeClass::Size1024, "icon").unwrap();
//! assert_eq!(placement.rect.x % 4, 0);
//! manager.release_placement(owner, SizeClass::Size1024, "icon", true);
//! ```

pub mod atlas;
pub mod blit;
pub mod config;
pub mod manager;
pub mod page;
pub mod placement;
pub mod pool;
pub mod queue;
pub mod rect;
pub mod set;

pub use atlas::{Atlas, AtlasSnapshot, AtlasStats, PageSnapshot};
pub use blit::{CpuBlitter, PageBlitter, PixelSource, RgbaSource, TextureHandle};
pub use config::{PackPolicy, SizeClass};
pub use manager::{AtlasManager, ClearListener, ManagerDiagnostics, OwnerId, PackWork};
pub use page::Page;
pub use placement::{AlignmentOffset, Placement, PlacementCallback, RequestState};
pub use pool::{Pool, Recycle, RecordPools};
pub use queue::{OperationQueue, QueuedWork, TickOutcome};
pub use rect::IntRect;
pub use set::AtlasSet;

use thiserror::Error;

/// Construction and validation failures. Packing itself never returns
/// errors; failed placements resolve through the sentinel callback.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AtlasError {
    #[error("invalid page length {0}, expected one of 256, 512, 1024, 2048")]
    InvalidSizeClass(u32),
    #[error("alignment must be non-zero, got {0}")]
    InvalidAlignment(u32),
    #[error("padding {padding} is not a multiple of alignment {alignment}")]
    MisalignedPadding { padding: u32, alignment: u32 },
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
