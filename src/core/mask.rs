use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::core::lookup::ColorLookupTable;

/// Byte order of the three channels in an interleaved mask buffer.
///
/// OpenCV-style readers hand back BGR; the `image` crate hands back RGB. The
/// decoder must know which, so that a pixel maps to the class its color was
/// painted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Byte offsets of (red, green, blue) within one pixel.
    #[inline]
    fn offsets(self) -> (usize, usize, usize) {
        match self {
            ChannelOrder::Rgb => (0, 1, 2),
            ChannelOrder::Bgr => (2, 1, 0),
        }
    }
}

/// Per-pixel class ids, row-major, one byte per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LabelGrid {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(anyhow!(
                "label buffer has {} bytes, expected {}x{} = {}",
                data.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y as usize * self.width as usize + x as usize])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Decode an interleaved 3-channel color mask into class ids.
///
/// `pixels` must hold exactly `width * height * 3` bytes laid out in `order`.
/// Colors missing from the table decode to background; there is no error path.
pub fn decode_mask(
    pixels: &[u8],
    width: u32,
    height: u32,
    order: ChannelOrder,
    table: &ColorLookupTable,
) -> LabelGrid {
    let n = width as usize * height as usize;
    assert_eq!(
        pixels.len(),
        n * 3,
        "mask buffer must be {}x{}x3 bytes",
        width,
        height
    );

    let (ri, gi, bi) = order.offsets();
    let data = pixels
        .chunks_exact(3)
        .map(|px| table.lookup(px[ri], px[gi], px[bi]))
        .collect();

    LabelGrid { width, height, data }
}

/// Decode a mask already loaded by the `image` crate (always RGB).
pub fn decode_mask_image(img: &RgbImage, table: &ColorLookupTable) -> LabelGrid {
    decode_mask(img.as_raw(), img.width(), img.height(), ChannelOrder::Rgb, table)
}

/// Decode PNG (or any format `image` understands) mask bytes into class ids.
pub fn decode_mask_bytes(bytes: &[u8], table: &ColorLookupTable) -> Result<LabelGrid> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| anyhow!("mask decode failed: {}", e))?
        .to_rgb8();
    Ok(decode_mask_image(&img, table))
}
