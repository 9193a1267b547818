//! HEIF decoding through libheif.

use anyhow::{bail, Result};

/// Copy `height` rows of `row_len` bytes out of a plane whose rows are
/// padded to `stride` bytes.
#[cfg_attr(not(feature = "heif"), allow(dead_code))]
pub(crate) fn pack_rows(data: &[u8], stride: usize, row_len: usize, height: usize) -> Result<Vec<u8>> {
    if stride < row_len {
        bail!("HEIF plane stride {} is shorter than a {} byte row", stride, row_len);
    }
    if height == 0 || row_len == 0 {
        return Ok(Vec::new());
    }
    // the last row may omit its padding
    let needed = stride * (height - 1) + row_len;
    if data.len() < needed {
        bail!(
            "HEIF plane holds {} bytes, {} rows of stride {} need {}",
            data.len(),
            height,
            stride,
            needed
        );
    }

    let mut pixels = Vec::with_capacity(row_len * height);
    for row in 0..height {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    Ok(pixels)
}

#[cfg(feature = "heif")]
pub use libheif::decode;

#[cfg(feature = "heif")]
mod libheif {
    use super::pack_rows;
    use anyhow::{anyhow, Context, Result};
    use image::{DynamicImage, RgbImage, RgbaImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    /// Decode the primary image of a HEIF container into 8-bit RGB(A).
    pub fn decode(data: &[u8]) -> Result<DynamicImage> {
        let lib = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(data).context("Failed to parse HEIF container")?;
        let handle = ctx
            .primary_image_handle()
            .context("HEIF container has no primary image")?;

        let has_alpha = handle.has_alpha_channel();
        let (chroma, channels) = if has_alpha {
            (RgbChroma::Rgba, 4)
        } else {
            (RgbChroma::Rgb, 3)
        };

        let decoded = lib
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .context("Failed to decode HEIF image")?;
        let plane = decoded
            .planes()
            .interleaved
            .ok_or_else(|| anyhow!("HEIF image has no interleaved plane"))?;

        let (width, height) = (plane.width, plane.height);
        let pixels = pack_rows(plane.data, plane.stride, width as usize * channels, height as usize)?;

        let img = if has_alpha {
            RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
        } else {
            RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        };

        img.ok_or_else(|| anyhow!("HEIF plane is smaller than {}x{}", width, height))
    }
}
