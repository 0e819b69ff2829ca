//! Page containers for the three asset kinds.
//!
//! A single image, a multi-page TIFF, and a multi-page PDF are normalized
//! into one `PageSource` with `page_count()` and `render(page_number)`.
//! Decoding happens once at `open`; page navigation only re-renders.

use std::io::Cursor;

use image::RgbaImage;
use pdfium_render::prelude::*;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::asset::AssetKind;
use crate::error::DecodeError;
use crate::raster::Raster;

/// The active page container for the selected asset
pub enum PageSource {
    /// A single-page image, decoded once.
    Image { image: RgbaImage },
    /// TIFF frames, decoded once in page order.
    Tiff { frames: Vec<RgbaImage> },
    /// PDF document bytes plus the page count obtained at open time.
    /// Pages are rendered on demand from the retained bytes.
    Pdf { bytes: Vec<u8>, page_count: u32 },
}

impl PageSource {
    /// Decode/open raw asset bytes into a page container.
    pub fn open(kind: AssetKind, bytes: Vec<u8>) -> Result<Self, DecodeError> {
        match kind {
            AssetKind::Image => {
                let image = image::load_from_memory(&bytes)
                    .map_err(DecodeError::Image)?
                    .to_rgba8();
                Ok(PageSource::Image { image })
            }
            AssetKind::Tiff => {
                let frames = decode_tiff_frames(&bytes)?;
                debug!(pages = frames.len(), "TIFF decoded");
                Ok(PageSource::Tiff { frames })
            }
            AssetKind::Pdf => {
                let page_count = pdf_page_count(&bytes)?;
                debug!(pages = page_count, "PDF opened");
                Ok(PageSource::Pdf { bytes, page_count })
            }
        }
    }

    pub fn page_count(&self) -> u32 {
        match self {
            PageSource::Image { .. } => 1,
            PageSource::Tiff { frames } => frames.len() as u32,
            PageSource::Pdf { page_count, .. } => *page_count,
        }
    }

    /// Render one page (1-indexed) to a raster. PDF pages are rendered at
    /// `pdf_render_scale` times their natural size.
    pub fn render(&self, page_number: u32, pdf_render_scale: f32) -> Result<Raster, DecodeError> {
        let page_count = self.page_count();
        if page_number < 1 || page_number > page_count {
            return Err(DecodeError::PageOutOfRange {
                page: page_number,
                page_count,
            });
        }

        match self {
            PageSource::Image { image } => Raster::encode(image),
            PageSource::Tiff { frames } => Raster::encode(&frames[(page_number - 1) as usize]),
            PageSource::Pdf { bytes, .. } => render_pdf_page(bytes, page_number, pdf_render_scale),
        }
    }
}

/// Create a new Pdfium instance (dynamically linked).
///
/// Searches for libpdfium in:
/// 1. Current directory (./libpdfium.so)
/// 2. vendor/pdfium/lib/
/// 3. System library paths
fn create_pdfium() -> Result<Pdfium, DecodeError> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| DecodeError::PdfOpen {
            message: format!("Failed to load PDFium library: {e:?}"),
        })?;

    Ok(Pdfium::new(bindings))
}

fn pdf_page_count(bytes: &[u8]) -> Result<u32, DecodeError> {
    let pdfium = create_pdfium()?;
    let document =
        pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| DecodeError::PdfOpen {
                message: format!("{e:?}"),
            })?;
    Ok(document.pages().len() as u32)
}

fn render_pdf_page(bytes: &[u8], page_number: u32, scale: f32) -> Result<Raster, DecodeError> {
    let pdfium = create_pdfium()?;
    let document =
        pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| DecodeError::PdfOpen {
                message: format!("{e:?}"),
            })?;

    let page = document
        .pages()
        .get((page_number - 1) as u16)
        .map_err(|e| DecodeError::PdfRender {
            page: page_number,
            message: format!("{e:?}"),
        })?;

    let config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| DecodeError::PdfRender {
            page: page_number,
            message: format!("{e:?}"),
        })?;

    Raster::encode(&bitmap.as_image().to_rgba8())
}

/// Decode every TIFF directory into an RGBA frame, in file order.
fn decode_tiff_frames(bytes: &[u8]) -> Result<Vec<RgbaImage>, DecodeError> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let mut frames = Vec::new();

    loop {
        let (width, height) = decoder.dimensions()?;
        let color_type = decoder.colortype()?;
        let data = decoder.read_image()?;
        frames.push(frame_to_rgba(width, height, color_type, data)?);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    Ok(frames)
}

fn frame_to_rgba(
    width: u32,
    height: u32,
    color_type: ColorType,
    data: DecodingResult,
) -> Result<RgbaImage, DecodeError> {
    let unsupported = |layout: &str| DecodeError::TiffLayout {
        layout: layout.to_string(),
    };

    let DecodingResult::U8(buffer) = data else {
        return Err(unsupported(&format!("{color_type:?} (non-8-bit samples)")));
    };

    let pixels = (width as usize) * (height as usize);
    let rgba = match color_type {
        ColorType::RGBA(8) => buffer,
        ColorType::RGB(8) => {
            if buffer.len() < pixels * 3 {
                return Err(unsupported("truncated RGB frame"));
            }
            let mut out = Vec::with_capacity(pixels * 4);
            for px in buffer.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            out
        }
        ColorType::Gray(8) => {
            if buffer.len() < pixels {
                return Err(unsupported("truncated grayscale frame"));
            }
            let mut out = Vec::with_capacity(pixels * 4);
            for &gray in &buffer[..pixels] {
                out.extend_from_slice(&[gray, gray, gray, 255]);
            }
            out
        }
        other => return Err(unsupported(&format!("{other:?}"))),
    };

    RgbaImage::from_raw(width, height, rgba).ok_or_else(|| unsupported("frame buffer size mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn two_page_tiff(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = tiff::encoder::TiffEncoder::new(&mut buffer).unwrap();
            let page: Vec<u8> = vec![128; (width * height * 3) as usize];
            encoder
                .write_image::<tiff::encoder::colortype::RGB8>(width, height, &page)
                .unwrap();
            encoder
                .write_image::<tiff::encoder::colortype::RGB8>(width, height, &page)
                .unwrap();
        }
        buffer.into_inner()
    }

    #[test]
    fn test_image_has_exactly_one_page() {
        let source = PageSource::open(AssetKind::Image, png_bytes(20, 10)).unwrap();
        assert_eq!(source.page_count(), 1);

        let raster = source.render(1, 2.0).unwrap();
        assert_eq!((raster.width, raster.height), (20, 10));

        let out_of_range = source.render(2, 2.0);
        assert!(matches!(
            out_of_range,
            Err(DecodeError::PageOutOfRange {
                page: 2,
                page_count: 1
            })
        ));
    }

    #[test]
    fn test_tiff_frames_map_to_pages() {
        let source = PageSource::open(AssetKind::Tiff, two_page_tiff(8, 6)).unwrap();
        assert_eq!(source.page_count(), 2);

        let page_two = source.render(2, 2.0).unwrap();
        assert_eq!((page_two.width, page_two.height), (8, 6));

        assert!(matches!(
            source.render(0, 2.0),
            Err(DecodeError::PageOutOfRange { .. })
        ));
        assert!(matches!(
            source.render(3, 2.0),
            Err(DecodeError::PageOutOfRange { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let result = PageSource::open(AssetKind::Image, b"not an image".to_vec());
        assert!(matches!(result, Err(DecodeError::Image(_))));

        let result = PageSource::open(AssetKind::Tiff, b"not a tiff".to_vec());
        assert!(matches!(result, Err(DecodeError::Tiff(_))));
    }
}
