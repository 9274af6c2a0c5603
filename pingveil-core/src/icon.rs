//! Favicon decoding.
//!
//! Operators paste the server icon into the rewrite config as base64, with or
//! without a `data:image/png;base64,` header. Backends send it the same way in
//! their status JSON. Both paths go through [`IconDecoder::decode`], which
//! validates that the payload really is an image before it can reach a client.
//!
//! PNG bytes are kept as-is, so rendering an icon back into a data URI
//! round-trips a canonical payload unchanged. JPEG, GIF and BMP icons are
//! re-encoded as PNG since that is all clients display.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use image::{ImageFormat, ImageReader};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::IconError;

const DATA_URI_SCHEME: &str = "data:image/";
const BASE64_MARKER: &str = ";base64,";
const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Standard alphabet, `=` padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A validated PNG image. Cheap to clone, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedIcon {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl DecodedIcon {
    /// Render as the `data:image/png;base64,...` string the status JSON expects.
    pub fn to_data_uri(&self) -> String {
        format!("{PNG_DATA_URI_PREFIX}{}", STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for DecodedIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedIcon")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Serialize for DecodedIcon {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_uri())
    }
}

impl<'de> Deserialize<'de> for DecodedIcon {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        IconDecoder::decode(&raw).map_err(serde::de::Error::custom)
    }
}

/// Stateless base64 → [`DecodedIcon`] decoder.
pub struct IconDecoder;

impl IconDecoder {
    /// Decode a base64 favicon payload.
    ///
    /// Accepts an optional `data:image/<type>;base64,` header, missing `=`
    /// padding and ASCII whitespace, so multi-line values from config files
    /// work. No dimension or size limit is applied.
    pub fn decode(payload: &str) -> Result<DecodedIcon, IconError> {
        let body = Self::strip_data_uri(payload.trim());
        let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = LENIENT.decode(compact.as_bytes())?;

        let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| IconError::UnsupportedImageFormat(e.to_string()))?;
        let Some(format) = reader.format() else {
            return Err(IconError::UnsupportedImageFormat(
                "unrecognized image data".to_string(),
            ));
        };
        let image = reader
            .decode()
            .map_err(|e| IconError::UnsupportedImageFormat(e.to_string()))?;

        let bytes = if format == ImageFormat::Png {
            bytes
        } else {
            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| IconError::UnsupportedImageFormat(e.to_string()))?;
            debug!(?format, "re-encoded favicon as PNG");
            png
        };

        let (width, height) = (image.width(), image.height());
        debug!(width, height, len = bytes.len(), "decoded favicon");
        Ok(DecodedIcon {
            bytes: bytes.into(),
            width,
            height,
        })
    }

    /// Remove a `data:image/<type>;base64,` header if one is present.
    pub fn strip_data_uri(payload: &str) -> &str {
        if !payload.starts_with(DATA_URI_SCHEME) {
            return payload;
        }
        match payload.find(BASE64_MARKER) {
            Some(idx) => &payload[idx + BASE64_MARKER.len()..],
            None => payload,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD_NO_PAD;
    use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};

    /// Encode a solid-color PNG of the given size.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let canvas = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    pub(crate) fn png_base64(width: u32, height: u32) -> String {
        STANDARD.encode(png_bytes(width, height))
    }

    #[test]
    fn test_decode_plain_payload() {
        let icon = IconDecoder::decode(&png_base64(64, 64)).unwrap();
        assert_eq!((icon.width, icon.height), (64, 64));
        assert_eq!(&*icon.bytes, png_bytes(64, 64).as_slice());
    }

    #[test]
    fn test_data_uri_header_is_stripped() {
        let payload = png_base64(64, 64);
        let prefixed = format!("data:image/png;base64,{payload}");
        assert_eq!(
            IconDecoder::decode(&prefixed).unwrap(),
            IconDecoder::decode(&payload).unwrap()
        );
    }

    #[test]
    fn test_decode_is_idempotent() {
        let payload = png_base64(16, 16);
        let first = IconDecoder::decode(&payload).unwrap();
        let second = IconDecoder::decode(&payload).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_data_uri_round_trip() {
        let payload = png_base64(64, 64);
        let icon = IconDecoder::decode(&payload).unwrap();
        assert_eq!(icon.to_data_uri(), format!("data:image/png;base64,{payload}"));
        assert_eq!(IconDecoder::decode(&icon.to_data_uri()).unwrap(), icon);
    }

    #[test]
    fn test_whitespace_in_payload_is_ignored() {
        let payload = png_base64(64, 64);
        let (head, tail) = payload.split_at(payload.len() / 2);
        let wrapped = format!("  {head}\n    {tail}\n");
        assert_eq!(
            IconDecoder::decode(&wrapped).unwrap(),
            IconDecoder::decode(&payload).unwrap()
        );
    }

    #[test]
    fn test_no_dimension_limit() {
        let icon = IconDecoder::decode(&png_base64(300, 20)).unwrap();
        assert_eq!((icon.width, icon.height), (300, 20));
    }

    #[test]
    fn test_unpadded_payload() {
        let bytes = (1..=8)
            .map(|n| png_bytes(n * 8, n * 8))
            .find(|bytes| bytes.len() % 3 != 0)
            .unwrap();
        let unpadded = STANDARD_NO_PAD.encode(&bytes);
        assert!(!unpadded.ends_with('='));

        let icon = IconDecoder::decode(&unpadded).unwrap();
        assert_eq!(&*icon.bytes, bytes.as_slice());
        assert_eq!(icon, IconDecoder::decode(&STANDARD.encode(&bytes)).unwrap());
    }

    #[test]
    fn test_jpeg_is_reencoded_as_png() {
        let canvas = RgbImage::from_pixel(32, 24, Rgb([20, 120, 220]));
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let payload = format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg));
        let icon = IconDecoder::decode(&payload).unwrap();
        assert_eq!((icon.width, icon.height), (32, 24));
        assert_eq!(
            image::guess_format(&icon.bytes).unwrap(),
            ImageFormat::Png
        );
        assert!(icon.to_data_uri().starts_with("data:image/png;base64,"));
        assert_eq!(IconDecoder::decode(&icon.to_data_uri()).unwrap(), icon);
    }

    #[test]
    fn test_bmp_is_reencoded_as_png() {
        let canvas = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 255]));
        let mut bmp = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut bmp), ImageFormat::Bmp)
            .unwrap();

        let icon = IconDecoder::decode(&STANDARD.encode(&bmp)).unwrap();
        assert_eq!((icon.width, icon.height), (16, 16));
        assert_eq!(
            image::guess_format(&icon.bytes).unwrap(),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_malformed_base64() {
        let result = IconDecoder::decode("this is not base64!!");
        assert!(matches!(result, Err(IconError::MalformedBase64(_))));
    }

    #[test]
    fn test_non_image_payload() {
        let payload = STANDARD.encode(b"definitely not a png");
        let result = IconDecoder::decode(&payload);
        assert!(matches!(result, Err(IconError::UnsupportedImageFormat(_))));
    }

    #[test]
    fn test_truncated_png() {
        let mut bytes = png_bytes(64, 64);
        bytes.truncate(bytes.len() / 2);
        let result = IconDecoder::decode(&STANDARD.encode(bytes));
        assert!(matches!(result, Err(IconError::UnsupportedImageFormat(_))));
    }

    #[test]
    fn test_strip_data_uri_variants() {
        assert_eq!(IconDecoder::strip_data_uri("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(IconDecoder::strip_data_uri("data:image/jpeg;base64,AAAA"), "AAAA");
        assert_eq!(IconDecoder::strip_data_uri("AAAA"), "AAAA");
        assert_eq!(IconDecoder::strip_data_uri("data:image/png,AAAA"), "data:image/png,AAAA");
    }

    #[test]
    fn test_serializes_as_data_uri() {
        let icon = IconDecoder::decode(&png_base64(8, 8)).unwrap();
        let json = serde_json::to_value(&icon).unwrap();
        assert_eq!(json, serde_json::Value::String(icon.to_data_uri()));
        let back: DecodedIcon = serde_json::from_value(json).unwrap();
        assert_eq!(back, icon);
    }
}
