//! Local codec: decode with the `image` crate (or libheif), encode JPEG.

use super::{Artifact, Codec, ProgressReporter, SourceRef};
use crate::config::OutputConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

/// ISO-BMFF major brands used by HEIF still images and sequences.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"hevm", b"hevs", b"mif1", b"msf1",
];

/// In-process codec producing JPEG output.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    quality: u8,
    max_input_bytes: u64,
}

impl ImageCodec {
    pub fn new(quality: u8, max_input_bytes: u64) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            max_input_bytes,
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new(output.quality, output.max_input_bytes)
    }
}

#[async_trait]
impl Codec for ImageCodec {
    fn name(&self) -> &str {
        "image"
    }

    async fn convert(&self, source: &SourceRef, progress: &ProgressReporter) -> Result<Artifact> {
        let data = source.read().await?;
        if data.len() as u64 > self.max_input_bytes {
            anyhow::bail!(
                "Input is {} bytes, over the {} byte limit",
                data.len(),
                self.max_input_bytes
            );
        }
        progress.report(30);

        let quality = self.quality;
        let progress = progress.clone();
        let jpeg = tokio::task::spawn_blocking(move || {
            let decoded = decode_image(&data)?;
            progress.report(70);
            encode_jpeg(&decoded, quality)
        })
        .await
        .context("Transcode task panicked")??;

        Ok(Artifact::new(jpeg))
    }
}

/// Check for an ISO-BMFF `ftyp` box with a HEIF brand.
pub fn is_heif_data(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    HEIF_BRANDS.iter().any(|brand| &data[8..12] == brand.as_slice())
}

/// Decode any supported still image.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    if is_heif_data(data) {
        return decode_heif(data);
    }
    image::load_from_memory(data).context("Failed to decode image")
}

#[cfg(feature = "heif")]
fn decode_heif(data: &[u8]) -> Result<DynamicImage> {
    super::heif::decode(data)
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_data: &[u8]) -> Result<DynamicImage> {
    anyhow::bail!("HEIF input requires heicforge built with the `heif` feature")
}

/// Encode as baseline JPEG, flattening transparency onto white.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
    let rgb = flatten_onto_white(img);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .context("Failed to encode JPEG")?;
    Ok(Bytes::from(out))
}

fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u16;
        let blend = |c: u8| ((c as u16 * a + 255 * (255 - a)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
