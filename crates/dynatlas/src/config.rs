//! Page size classes and packing policy.

use serde::{Deserialize, Serialize};

use crate::AtlasError;

/// Fixed set of square page dimensions an atlas can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    Size256,
    Size512,
    Size1024,
    Size2048,
}

impl SizeClass {
    /// Edge length of a page in pixels.
    pub const fn length(self) -> u32 {
        match self {
            Self::Size256 => 256,
            Self::Size512 => 512,
            Self::Size1024 => 1024,
            Self::Size2048 => 2048,
        }
    }

    pub fn from_length(length: u32) -> Result<Self, AtlasError> {
        match length {
            256 => Ok(Self::Size256),
            512 => Ok(Self::Size512),
            1024 => Ok(Self::Size1024),
            2048 => Ok(Self::Size2048),
            other => Err(AtlasError::InvalidSizeClass(other)),
        }
    }
}

/// Alignment and padding applied to every placement in an atlas.
///
/// The alignment is the copy-block granularity of the target pixel format
/// (4 for BC/DXT, 6 for ASTC 6x6). Placement positions and carved sizes are
/// kept on multiples of it. Padding is the border reserved around a placed
/// image to avoid sampling bleed; it must itself be a multiple of the
/// alignment so padded placements stay block-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackPolicy {
    alignment: u32,
    padding: u32,
}

impl PackPolicy {
    pub fn new(alignment: u32, padding: u32) -> Result<Self, AtlasError> {
        if alignment == 0 {
            return Err(AtlasError::InvalidAlignment(alignment));
        }
        if padding % alignment != 0 {
            return Err(AtlasError::MisalignedPadding { padding, alignment });
        }
        Ok(Self { alignment, padding })
    }

    /// Policy for a compressed format with the given block size, reserving
    /// one block of padding on each side of a placement.
    pub fn for_block_size(block: u32) -> Result<Self, AtlasError> {
        Self::new(block, block * 2)
    }

    pub const fn alignment(&self) -> u32 {
        self.alignment
    }

    pub const fn padding(&self) -> u32 {
        self.padding
    }
}

impl Default for PackPolicy {
    /// 4-pixel block alignment with one block of padding per side.
    fn default() -> Self {
        Self { alignment: 4, padding: 8 }
    }
}
