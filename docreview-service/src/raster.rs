//! Renderable page rasters.

use base64::Engine;
use bytes::Bytes;
use image::codecs::webp::WebPEncoder;
use image::{ImageEncoder, RgbaImage};

use crate::error::DecodeError;

pub const RASTER_MIME_TYPE: &str = "image/webp";

/// One rendered page: encoded pixel data plus pixel dimensions.
///
/// All three asset kinds converge to this representation, so downstream
/// consumers never branch on the asset kind.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl Raster {
    /// Encode an RGBA frame as a lossless WebP raster.
    pub fn encode(image: &RgbaImage) -> Result<Self, DecodeError> {
        let mut buffer = Vec::new();
        let encoder = WebPEncoder::new_lossless(&mut buffer);
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(DecodeError::Encode)?;

        Ok(Self {
            width: image.width(),
            height: image.height(),
            data: Bytes::from(buffer),
        })
    }

    /// Base64 `data:` URI for JSON transport.
    pub fn to_data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{RASTER_MIME_TYPE};base64,{encoded}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keeps_dimensions() {
        let image = RgbaImage::from_pixel(12, 7, image::Rgba([10, 20, 30, 255]));
        let raster = Raster::encode(&image).unwrap();
        assert_eq!(raster.width, 12);
        assert_eq!(raster.height, 7);
        assert!(!raster.data.is_empty());
    }

    #[test]
    fn test_data_uri_prefix() {
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let raster = Raster::encode(&image).unwrap();
        assert!(raster.to_data_uri().starts_with("data:image/webp;base64,"));
    }
}
