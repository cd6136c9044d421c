//! Integer rectangles in page-pixel space.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle with non-negative integer coordinates.
///
/// A live rectangle is never degenerate: `width` and `height` are both
/// greater than zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl IntRect {
    pub const ZERO: IntRect = IntRect { x: 0, y: 0, width: 0, height: 0 };

    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge (`x + width`).
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive top edge (`y + height`).
    pub const fn top(&self) -> u32 {
        self.y + self.height
    }

    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &IntRect) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.top() <= self.top()
    }

    /// Whether the two rectangles share any area. Touching edges do not count.
    pub fn overlaps(&self, other: &IntRect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.top() && other.y < self.top()
    }

    pub fn intersection(&self, other: &IntRect) -> Option<IntRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.top().min(other.top());
        if x1 > x0 && y1 > y0 {
            Some(IntRect::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

/// Round `v` up to the next multiple of `alignment`.
pub fn ceil_align(v: u32, alignment: u32) -> u32 {
    debug_assert!(alignment > 0, "alignment must be nonzero");
    v.div_ceil(alignment) * alignment
}

/// Round `v` down to the previous multiple of `alignment`.
pub fn floor_align(v: u32, alignment: u32) -> u32 {
    debug_assert!(alignment > 0, "alignment must be nonzero");
    v / alignment * alignment
}
