use thiserror::Error;

/// Lossy recompression quality for WebP output.
const WEBP_QUALITY: f32 = 40.0;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to encode webp image")]
    Encode,
}

/// Re-encodes image bytes (jpeg/png/gif) as lossy WebP.
pub fn convert_to_webp(bytes: &[u8]) -> Result<Vec<u8>, ImagingError> {
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let encoder = webp::Encoder::from_rgba(&rgba, width, height);
    let encoded = encoder
        .encode_simple(false, WEBP_QUALITY)
        .map_err(|_| ImagingError::Encode)?;

    Ok(encoded.to_vec())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, Rgba};

    use super::convert_to_webp;

    fn png_fixture() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(8, 8, Rgba([200u8, 40, 40, 255]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png fixture");
        bytes
    }

    #[test]
    fn converts_png_to_webp_container() {
        let webp_bytes = convert_to_webp(&png_fixture()).expect("convert");
        // RIFF....WEBP header
        assert_eq!(&webp_bytes[0..4], b"RIFF");
        assert_eq!(&webp_bytes[8..12], b"WEBP");
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(convert_to_webp(b"definitely not an image").is_err());
    }
}
