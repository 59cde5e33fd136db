//! Image payloads, carried around as `data:` URLs.

use base64::Engine;
use base64::engine::general_purpose;
use image::ImageFormat;
use serde::{Deserialize, Serialize};

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Errors returned when parsing or decoding an image payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PayloadError {
    /// The string isn't a `data:<media type>;base64,<data>` URL.
    NotADataUrl,
    /// The media type part was empty.
    MissingMediaType,
    /// There was no data after the marker.
    Empty,
    /// The data part isn't valid base64.
    Base64(String),
    /// The bytes aren't PNG, JPEG or WebP.
    UnsupportedFormat(String),
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotADataUrl => write!(f, "Image payload is not a base64 data URL"),
            Self::MissingMediaType => write!(f, "Image payload has no media type"),
            Self::Empty => write!(f, "Image payload is empty"),
            Self::Base64(err) => write!(f, "Image payload is not valid base64: {err}"),
            Self::UnsupportedFormat(format) => {
                write!(f, "Unsupported image format {format}, expected PNG, JPEG or WebP")
            }
        }
    }
}

impl std::error::Error for PayloadError {}

/// An encoded raster image with its media type, as a data URL.
///
/// Immutable once built. The media type and data offsets are re-derived from
/// the string, which is validated on construction.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImagePayload(String);

impl ImagePayload {
    /// Parses and validates a data URL.
    pub fn parse(data_url: &str) -> Result<Self, PayloadError> {
        split_data_url(data_url)?;
        Ok(Self(data_url.to_string()))
    }

    /// Encodes raw image bytes.
    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Result<Self, PayloadError> {
        if media_type.trim().is_empty() {
            return Err(PayloadError::MissingMediaType);
        }
        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(Self(format!(
            "{DATA_PREFIX}{media_type}{BASE64_MARKER}{}",
            general_purpose::STANDARD.encode(bytes)
        )))
    }

    /// Encodes an uploaded file, taking the media type from its contents.
    pub fn sniff(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.is_empty() {
            return Err(PayloadError::Empty);
        }
        match image::guess_format(bytes) {
            Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => {
                Self::from_bytes(format.to_mime_type(), bytes)
            }
            Ok(other) => Err(PayloadError::UnsupportedFormat(format!("{other:?}"))),
            Err(_) => Err(PayloadError::UnsupportedFormat("unknown".to_string())),
        }
    }

    /// Builds a payload from a media type and data that is already base64.
    pub fn from_base64(media_type: &str, data: &str) -> Result<Self, PayloadError> {
        Self::parse(&format!("{DATA_PREFIX}{media_type}{BASE64_MARKER}{data}"))
    }

    /// The media type, eg `image/png`.
    pub fn media_type(&self) -> &str {
        split_data_url(&self.0).map(|(media, _)| media).unwrap_or_default()
    }

    /// File extension matching the media type, `png` when unknown.
    pub fn file_extension(&self) -> &'static str {
        match self.media_type() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }

    /// The base64 data, without the `data:` header.
    pub fn base64_data(&self) -> &str {
        split_data_url(&self.0).map(|(_, data)| data).unwrap_or_default()
    }

    /// Decodes the image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, PayloadError> {
        general_purpose::STANDARD
            .decode(self.base64_data())
            .map_err(|err| PayloadError::Base64(err.to_string()))
    }

    /// The full data URL, usable as an `<img src>`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ImagePayload {
    // payloads run to megabytes, keep logs readable
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImagePayload({}, {} bytes)", self.media_type(), self.0.len())
    }
}

impl std::fmt::Display for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ImagePayload {
    type Error = PayloadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        split_data_url(&value)?;
        Ok(Self(value))
    }
}

impl From<ImagePayload> for String {
    fn from(value: ImagePayload) -> Self {
        value.0
    }
}

fn split_data_url(value: &str) -> Result<(&str, &str), PayloadError> {
    let rest = value
        .strip_prefix(DATA_PREFIX)
        .ok_or(PayloadError::NotADataUrl)?;
    let (media_type, data) = rest
        .split_once(BASE64_MARKER)
        .ok_or(PayloadError::NotADataUrl)?;
    if media_type.trim().is_empty() {
        return Err(PayloadError::MissingMediaType);
    }
    if data.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok((media_type, data))
}
