//! Placement results and the callback contract.

use crate::blit::TextureHandle;
use crate::rect::IntRect;

/// Offset of the requested content inside the block-aligned region that was
/// actually copied. Zero when the source rectangle was already aligned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignmentOffset {
    pub x: u32,
    pub y: u32,
}

/// Outcome of a placement request, delivered through the callback.
///
/// A failed request carries the unplaced sentinel (`texture` is `None` and
/// `rect` is zero) instead of an error; callers must check [`is_placed`].
///
/// [`is_placed`]: Placement::is_placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Page texture the content was copied into.
    pub texture: Option<TextureHandle>,
    /// Index of the page within its atlas.
    pub page: Option<u32>,
    /// Content rectangle in page-pixel space (alignment-rounded size).
    pub rect: IntRect,
    pub offset: AlignmentOffset,
}

impl Placement {
    /// Sentinel for permanently failed or unavailable requests.
    pub const UNPLACED: Placement = Placement {
        texture: None,
        page: None,
        rect: IntRect::ZERO,
        offset: AlignmentOffset { x: 0, y: 0 },
    };

    pub const fn is_placed(&self) -> bool {
        self.texture.is_some()
    }
}

/// Invoked exactly once per accepted request: synchronously on a cache hit
/// or rejection, later when a pending request resolves.
pub type PlacementCallback = Box<dyn FnOnce(Placement)>;

/// What happened to a placement request at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Key already live; reference count bumped and callback invoked.
    Hit,
    /// New pending request; the caller should schedule pack work for it.
    Pending,
    /// Joined an in-flight request for the same key; no extra work needed.
    Coalesced,
    /// Zero-sized or oversized; the sentinel was delivered, nothing recorded.
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unplaced_sentinel() {
        assert!(!Placement::UNPLACED.is_placed());
        assert_eq!(Placement::UNPLACED.rect.area(), 0);
        assert_eq!(Placement::UNPLACED.page, None);
    }
}
