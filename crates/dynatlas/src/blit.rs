//! Pixel source and sink seams.
//!
//! The packer never owns image data. Incoming pixels are described by
//! [`PixelSource`]; page textures live behind [`PageBlitter`], which the
//! renderer layer implements on top of its texture resources. [`CpuBlitter`]
//! is the software implementation used by tests and software renderers.

use std::collections::HashMap;

use tracing::trace;

use crate::rect::IntRect;

/// Opaque handle to a page texture owned by the renderer layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Read-only pixel content offered for packing.
pub trait PixelSource {
    /// Width of the backing image.
    fn width(&self) -> u32;

    /// Height of the backing image.
    fn height(&self) -> u32;

    /// Region of the backing image to pack. Defaults to the whole image.
    fn source_rect(&self) -> IntRect {
        IntRect::new(0, 0, self.width(), self.height())
    }

    /// Whether the backing pixels are resident and readable.
    fn available(&self) -> bool {
        true
    }

    /// Raw RGBA rows when the pixels live on the CPU.
    fn rgba(&self) -> Option<&[u8]> {
        None
    }
}

/// Sink for region blits into page textures.
///
/// The packer only ever asks for region copies and clears; creation and
/// destruction of the actual texture objects stays on this side of the seam.
pub trait PageBlitter {
    fn create_page(&mut self, width: u32, height: u32, label: &str) -> TextureHandle;

    /// Copy `src_rect` of `source` into `dst` with its top-left corner at
    /// `(dst_x, dst_y)`.
    fn copy_region(&mut self, source: &dyn PixelSource, src_rect: IntRect, dst: TextureHandle, dst_x: u32, dst_y: u32);

    /// Fill `rect` of `dst` with fully transparent pixels.
    fn clear_region(&mut self, dst: TextureHandle, rect: IntRect);

    fn release_page(&mut self, dst: TextureHandle);
}

/// An owned RGBA image, the simplest [`PixelSource`].
#[derive(Debug, Clone)]
pub struct RgbaSource {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaSource {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self { width, height, pixels }
    }

    /// A single-color image, handy for tests and demos.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.iter().copied().cycle().take((width * height * 4) as usize).collect();
        Self { width, height, pixels }
    }
}

impl PixelSource for RgbaSource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn rgba(&self) -> Option<&[u8]> {
        Some(&self.pixels)
    }
}

/// Software blitter backed by RGBA buffers, one per page.
#[derive(Debug, Default)]
pub struct CpuBlitter {
    pages: HashMap<TextureHandle, CpuPage>,
    next_handle: u64,
}

#[derive(Debug)]
struct CpuPage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CpuBlitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Raw RGBA contents of a page, row-major.
    pub fn page_pixels(&self, handle: TextureHandle) -> Option<&[u8]> {
        self.pages.get(&handle).map(|p| p.pixels.as_slice())
    }

    pub fn pixel(&self, handle: TextureHandle, x: u32, y: u32) -> Option<[u8; 4]> {
        let page = self.pages.get(&handle)?;
        if x >= page.width || y >= page.height {
            return None;
        }
        let i = ((y * page.width + x) * 4) as usize;
        Some([page.pixels[i], page.pixels[i + 1], page.pixels[i + 2], page.pixels[i + 3]])
    }
}

impl PageBlitter for CpuBlitter {
    fn create_page(&mut self, width: u32, height: u32, label: &str) -> TextureHandle {
        self.next_handle += 1;
        let handle = TextureHandle(self.next_handle);
        trace!(width, height, label, handle = handle.0, "creating cpu page");
        self.pages.insert(handle, CpuPage { width, height, pixels: vec![0; (width * height * 4) as usize] });
        handle
    }

    fn copy_region(&mut self, source: &dyn PixelSource, src_rect: IntRect, dst: TextureHandle, dst_x: u32, dst_y: u32) {
        let Some(page) = self.pages.get_mut(&dst) else { return };
        let Some(src) = source.rgba() else { return };
        let src_stride = (source.width() * 4) as usize;
        let dst_stride = (page.width * 4) as usize;

        for row in 0..src_rect.height {
            let sy = src_rect.y + row;
            let dy = dst_y + row;
            if sy >= source.height() || dy >= page.height {
                break;
            }
            let copy_w = src_rect.width.min(source.width() - src_rect.x).min(page.width.saturating_sub(dst_x));
            if copy_w == 0 {
                break;
            }
            let src_start = sy as usize * src_stride + (src_rect.x * 4) as usize;
            let dst_start = dy as usize * dst_stride + (dst_x * 4) as usize;
            let bytes = (copy_w * 4) as usize;
            page.pixels[dst_start..dst_start + bytes].copy_from_slice(&src[src_start..src_start + bytes]);
        }
    }

    fn clear_region(&mut self, dst: TextureHandle, rect: IntRect) {
        let Some(page) = self.pages.get_mut(&dst) else { return };
        let dst_stride = (page.width * 4) as usize;
        for row in 0..rect.height {
            let y = rect.y + row;
            if y >= page.height {
                break;
            }
            let w = rect.width.min(page.width.saturating_sub(rect.x));
            let start = y as usize * dst_stride + (rect.x * 4) as usize;
            page.pixels[start..start + (w * 4) as usize].fill(0);
        }
    }

    fn release_page(&mut self, dst: TextureHandle) {
        self.pages.remove(&dst);
    }
}
