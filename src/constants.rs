//! Shared constants for things
//!

/// Storage key the session history lives under.
pub const HISTORY_STORAGE_KEY: &str = "photoShootHistory";

/// How many sessions the history keeps, newest first.
pub const MAX_HISTORY_SESSIONS: usize = 10;

/// Default bound for stored image width, in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 800;

/// Default bound for stored image height, in pixels.
pub const DEFAULT_MAX_HEIGHT: u32 = 800;

/// Default JPEG quality factor for stored images, `0.0..=1.0`.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.7;

/// Default history storage quota, same ballpark as a browser's local storage.
pub const DEFAULT_HISTORY_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Public Gemini endpoint.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Multimodal text model used to describe the inputs.
pub const DEFAULT_DESCRIBE_MODEL: &str = "gemini-2.5-flash";

/// Image model used for the three edits.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Style used when the user hasn't picked one.
pub const DEFAULT_STYLE: &str = "Editorial";

/// Title of the studio portrait card.
pub const PORTRAIT_TITLE: &str = "Full-Body Portrait";
/// Title of the product photo card.
pub const PRODUCT_TITLE: &str = "Accessory Photo";
/// Title of the lifestyle scene card.
pub const LIFESTYLE_TITLE: &str = "Lifestyle Scene";

/// Message shown when a history write fails.
pub const PERSISTENCE_FAILURE_MESSAGE: &str =
    "Could not save the session to history. The storage may be full.";

/// Seconds between refreshes of the pending page.
pub const PENDING_REFRESH_SECONDS: u32 = 2;

/// Largest request body accepted by the web form; two photos fit comfortably.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
