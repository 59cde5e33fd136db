//! Records shared by the pipeline, the controller and the history store.

use serde::{Deserialize, Serialize};

use crate::payload::ImagePayload;

/// One of the three result cards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Card title.
    pub title: String,
    /// Generated image; `None` while generation is still running.
    pub src: Option<ImagePayload>,
    /// Input image the result was made from, for comparison.
    pub original: Option<ImagePayload>,
}

impl GeneratedImage {
    /// A card that is still waiting on its image.
    pub fn placeholder(title: &str, original: Option<ImagePayload>) -> Self {
        Self {
            title: title.to_string(),
            src: None,
            original,
        }
    }

    /// True while the image hasn't arrived.
    pub fn is_pending(&self) -> bool {
        self.src.is_none()
    }
}

/// A completed photo shoot as kept in history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoShootSession {
    /// Unique id, assigned by the caller.
    pub id: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Downscaled person image.
    pub person_image: ImagePayload,
    /// Downscaled accessory image.
    pub accessory_image: ImagePayload,
    /// Scenario text the lifestyle scene was built from.
    pub scenario: String,
    /// Style name as picked by the user.
    pub style: String,
    /// Portrait, product and lifestyle, in that order.
    pub generated_images: [GeneratedImage; 3],
}

impl PhotoShootSession {
    /// Local creation time formatted for display.
    pub fn created_label(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
            .map(|utc| {
                utc.with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string()
            })
            .unwrap_or_default()
    }
}
