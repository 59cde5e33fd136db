//! Downscales image payloads before they go into history storage.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH};
use crate::payload::ImagePayload;

/// Media type of everything [resize] produces.
pub const RESIZED_MEDIA_TYPE: &str = "image/jpeg";

/// Bounds and quality for [resize].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeOptions {
    /// Maximum output width in pixels.
    pub max_width: u32,
    /// Maximum output height in pixels.
    pub max_height: u32,
    /// JPEG quality factor, `0.0..=1.0`.
    pub quality: f32,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ResizeOptions {
    fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// Why a resize failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResizeError {
    /// The payload couldn't be decoded into an image.
    Decode(String),
    /// Couldn't get a surface to draw into, or couldn't encode it.
    RenderSurface(String),
}

impl std::fmt::Display for ResizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(err) => write!(f, "Failed to decode image: {err}"),
            Self::RenderSurface(err) => write!(f, "Failed to render resized image: {err}"),
        }
    }
}

impl std::error::Error for ResizeError {}

/// Works out the output size, keeping the aspect ratio.
///
/// The longer side (width on ties) is the constrained one; if the other side
/// still doesn't fit it gets clamped too. Images already inside the bounds
/// keep their size.
pub fn target_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (mut out_width, mut out_height) = (width, height);
    if width >= height {
        if width > max_width {
            out_width = max_width;
            out_height = scale(height, max_width, width);
        }
    } else if height > max_height {
        out_width = scale(width, max_height, height);
        out_height = max_height;
    }

    if out_height > max_height {
        out_width = scale(width, max_height, height);
        out_height = max_height;
    }
    if out_width > max_width {
        out_height = scale(height, max_width, width);
        out_width = max_width;
    }
    (out_width, out_height)
}

/// `side * numerator / denominator`, rounded, never below one pixel.
fn scale(side: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = f64::from(side) * f64::from(numerator) / f64::from(denominator);
    (scaled.round() as u32).max(1)
}

/// Re-encodes `payload` as a bounded JPEG. Absent in, absent out.
pub fn resize(
    payload: Option<&ImagePayload>,
    options: &ResizeOptions,
) -> Result<Option<ImagePayload>, ResizeError> {
    let Some(payload) = payload else {
        return Ok(None);
    };

    let bytes = payload
        .decode()
        .map_err(|err| ResizeError::Decode(err.to_string()))?;
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| ResizeError::Decode(err.to_string()))?
        .decode()
        .map_err(|err| ResizeError::Decode(err.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(ResizeError::RenderSurface(
            "image has a zero dimension".to_string(),
        ));
    }

    let (width, height) = target_dimensions(
        image.width(),
        image.height(),
        options.max_width,
        options.max_height,
    );
    debug!(
        from_width = image.width(),
        from_height = image.height(),
        width,
        height,
        "resizing image"
    );

    let image = if (width, height) == (image.width(), image.height()) {
        image
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    };
    // jpeg has no alpha channel
    let rgb = image.into_rgb8();

    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, options.jpeg_quality());
    encoder
        .encode_image(&rgb)
        .map_err(|err| ResizeError::RenderSurface(err.to_string()))?;

    ImagePayload::from_bytes(RESIZED_MEDIA_TYPE, &output)
        .map(Some)
        .map_err(|err| ResizeError::RenderSurface(err.to_string()))
}
