//! Normalise converter image payloads to the bytes that land on disk.

use crate::engine::ImagePayload;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("data URI is not an image or has no comma")]
    MalformedDataUri,
    #[error("unsupported bitmap mode {0:?}")]
    UnsupportedMode(String),
    #[error("bitmap of {width}x{height} {mode} does not match {len} pixel bytes")]
    BitmapSize {
        mode: String,
        width: u32,
        height: u32,
        len: usize,
    },
    #[error("jpeg encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("unknown image payload kind")]
    Unknown,
}

/// Raw bytes for one payload.
///
/// Bitmaps that are not already RGB are converted to RGB, then every bitmap
/// is JPEG-encoded at `jpeg_quality`.
pub fn to_bytes(payload: &ImagePayload, jpeg_quality: u8) -> Result<Vec<u8>, PayloadError> {
    match payload {
        ImagePayload::Bytes { data } => Ok(STANDARD.decode(data)?),
        ImagePayload::DataUri { uri } => decode_data_uri(uri),
        ImagePayload::Bitmap {
            mode,
            width,
            height,
            pixels,
        } => {
            let raw = STANDARD.decode(pixels)?;
            let img = bitmap(mode, *width, *height, raw)?;
            encode_jpeg(img, jpeg_quality)
        }
        ImagePayload::Unknown => Err(PayloadError::Unknown),
    }
}

/// `data:image/<type>[;base64],<payload>`: split at the first comma.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, PayloadError> {
    if !uri.starts_with("data:image/") {
        return Err(PayloadError::MalformedDataUri);
    }
    let (_, data) = uri.split_once(',').ok_or(PayloadError::MalformedDataUri)?;
    Ok(STANDARD.decode(data.trim())?)
}

fn bitmap(mode: &str, width: u32, height: u32, raw: Vec<u8>) -> Result<DynamicImage, PayloadError> {
    let len = raw.len();
    let size_err = || PayloadError::BitmapSize {
        mode: mode.to_string(),
        width,
        height,
        len,
    };
    let img = match mode {
        "RGB" => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw).ok_or_else(size_err)?),
        "RGBA" => {
            DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, raw).ok_or_else(size_err)?)
        }
        "L" => DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw).ok_or_else(size_err)?),
        "LA" => DynamicImage::ImageLumaA8(
            GrayAlphaImage::from_raw(width, height, raw).ok_or_else(size_err)?,
        ),
        other => return Err(PayloadError::UnsupportedMode(other.to_string())),
    };
    Ok(img)
}

fn encode_jpeg(img: DynamicImage, quality: u8) -> Result<Vec<u8>, PayloadError> {
    let rgb = match img {
        DynamicImage::ImageRgb8(_) => img,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_splits_at_first_comma() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(b"a,b"));
        assert_eq!(decode_data_uri(&uri).unwrap(), b"a,b");
    }

    #[test]
    fn data_uri_requires_image_prefix() {
        assert!(matches!(
            decode_data_uri("data:text/plain;base64,AAAA"),
            Err(PayloadError::MalformedDataUri)
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64"),
            Err(PayloadError::MalformedDataUri)
        ));
    }

    #[test]
    fn short_bitmap_is_rejected() {
        let err = bitmap("RGB", 4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, PayloadError::BitmapSize { len: 10, .. }));
    }
}
