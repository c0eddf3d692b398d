//! Raster image re-encoding for embedded media parts

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Re-encode a raster image at reduced size.
///
/// JPEG data is re-encoded lossily at the given quality; PNG data is
/// re-encoded losslessly at maximum compression so transparency
/// survives. Returns the new bytes only when they are strictly smaller
/// than the input; any decode or encode failure yields `None` so a bad
/// image never aborts the surrounding pass.
pub fn recompress(data: &[u8], jpeg_quality: u8) -> Option<Vec<u8>> {
    let format = image::guess_format(data).ok()?;
    let img = image::load_from_memory(data).ok()?;

    let mut out = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), jpeg_quality);
            rgb.write_with_encoder(encoder).ok()?;
        }
        ImageFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                Cursor::new(&mut out),
                CompressionType::Best,
                FilterType::Adaptive,
            );
            img.write_with_encoder(encoder).ok()?;
        }
        // GIF, BMP, EMF blobs etc. are left alone
        _ => return None,
    }

    if out.len() < data.len() { Some(out) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn noisy_jpeg(width: u32, height: u32, quality: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
        DynamicImage::ImageRgb8(img).write_with_encoder(encoder).unwrap();
        out
    }

    #[test]
    fn test_jpeg_shrinks_at_lower_quality() {
        let original = noisy_jpeg(64, 64, 100);
        let recompressed = recompress(&original, 40).expect("should shrink");
        assert!(recompressed.len() < original.len());
        // Output must still be a decodable JPEG
        assert_eq!(image::guess_format(&recompressed).unwrap(), ImageFormat::Jpeg);
        image::load_from_memory(&recompressed).unwrap();
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert!(recompress(b"not an image at all", 65).is_none());
        assert!(recompress(&[], 65).is_none());
    }

    #[test]
    fn test_already_small_is_kept() {
        // A tiny uniform image re-encoded at the same quality will not get
        // strictly smaller; the caller should keep the original bytes.
        let original = noisy_jpeg(4, 4, 40);
        if let Some(out) = recompress(&original, 40) {
            assert!(out.len() < original.len());
        }
    }
}
