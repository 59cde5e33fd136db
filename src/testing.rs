//! Test helpers: sample images, sessions and a scripted model.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, RgbImage};

use crate::gemini::{ContentPart, Descriptions, GenerativeModel, RemoteError};
use crate::models::{GeneratedImage, PhotoShootSession};
use crate::payload::ImagePayload;
use crate::shoot::{Progress, Shot};

/// A small gradient PNG.
pub(crate) fn sample_png(width: u32, height: u32) -> ImagePayload {
    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode png");
    ImagePayload::from_bytes("image/png", bytes.get_ref()).expect("png payload")
}

pub(crate) fn payload_dimensions(payload: &ImagePayload) -> (u32, u32) {
    let bytes = payload.decode().expect("decode payload");
    let image = image::load_from_memory(&bytes).expect("decode image");
    (image.width(), image.height())
}

pub(crate) fn sample_session(id: &str, timestamp: i64) -> PhotoShootSession {
    let image = |tag: &str| {
        ImagePayload::from_bytes("image/jpeg", format!("{id}-{tag}").as_bytes())
            .expect("payload")
    };
    PhotoShootSession {
        id: id.to_string(),
        timestamp,
        person_image: image("person"),
        accessory_image: image("accessory"),
        scenario: format!("scenario {id}"),
        style: "Retro".to_string(),
        generated_images: [
            GeneratedImage {
                title: "Full-Body Portrait".to_string(),
                src: Some(image("portrait")),
                original: Some(image("person")),
            },
            GeneratedImage {
                title: "Accessory Photo".to_string(),
                src: Some(image("product")),
                original: Some(image("accessory")),
            },
            GeneratedImage {
                title: "Lifestyle Scene".to_string(),
                src: Some(image("lifestyle")),
                original: Some(image("person")),
            },
        ],
    }
}

/// Everything a [ScriptedModel] saw, interleaved with progress reports the
/// test pushes itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Progress(Progress),
    Describe,
    Edit(ImagePayload),
}

#[derive(Clone, Copy, Debug)]
enum Script {
    Succeed,
    FailDescribe,
    PanicDescribe,
    TextOnly(Shot),
    FailEdit(Shot),
}

/// In-process [GenerativeModel] that follows a fixed script.
#[derive(Clone, Debug)]
pub(crate) struct ScriptedModel {
    script: Script,
    leading_text: bool,
    outputs: [ImagePayload; 3],
    log: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedModel {
    fn new(script: Script) -> Self {
        Self {
            script,
            leading_text: false,
            outputs: [sample_png(1200, 900), sample_png(700, 700), sample_png(600, 1000)],
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn succeeding() -> Self {
        Self::new(Script::Succeed)
    }

    pub(crate) fn failing_describe() -> Self {
        Self::new(Script::FailDescribe)
    }

    /// Panics inside describe, like a bug in the client would.
    pub(crate) fn panicking_describe() -> Self {
        Self::new(Script::PanicDescribe)
    }

    pub(crate) fn text_only_edit(shot: Shot) -> Self {
        Self::new(Script::TextOnly(shot))
    }

    pub(crate) fn failing_edit(shot: Shot) -> Self {
        Self::new(Script::FailEdit(shot))
    }

    pub(crate) fn with_leading_text(mut self) -> Self {
        self.leading_text = true;
        self
    }

    /// Returns images that are valid payloads but not decodable images.
    pub(crate) fn with_undecodable_outputs(mut self) -> Self {
        let junk = ImagePayload::from_bytes("image/png", b"not really a png").expect("payload");
        self.outputs = [junk.clone(), junk.clone(), junk];
        self
    }

    pub(crate) fn log(&self) -> Arc<Mutex<Vec<Call>>> {
        self.log.clone()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.log.lock().expect("log lock").clone()
    }

    pub(crate) fn outputs(&self) -> [ImagePayload; 3] {
        self.outputs.clone()
    }

    fn edits_so_far(&self) -> usize {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .filter(|call| matches!(call, Call::Edit(_)))
            .count()
    }
}

impl GenerativeModel for ScriptedModel {
    #[allow(clippy::panic)]
    async fn describe(
        &self,
        _person: &ImagePayload,
        _accessory: &ImagePayload,
    ) -> Result<Descriptions, RemoteError> {
        self.log.lock().expect("log lock").push(Call::Describe);
        if matches!(self.script, Script::PanicDescribe) {
            panic!("describe blew up");
        }
        if matches!(self.script, Script::FailDescribe) {
            return Err(RemoteError::Status {
                status: 500,
                body: "describe exploded".to_string(),
            });
        }
        Ok(Descriptions {
            person: "a person in a blue coat".to_string(),
            accessory: "a leather handbag".to_string(),
        })
    }

    async fn edit(
        &self,
        base: &ImagePayload,
        _prompt: &str,
    ) -> Result<Vec<ContentPart>, RemoteError> {
        let index = self.edits_so_far();
        self.log.lock().expect("log lock").push(Call::Edit(base.clone()));
        let shot = Shot::ALL[index % 3];

        match self.script {
            Script::FailEdit(failing) if failing == shot => {
                return Err(RemoteError::Transport("connection reset".to_string()));
            }
            Script::TextOnly(failing) if failing == shot => {
                return Ok(vec![ContentPart::Text("I can't do that".to_string())]);
            }
            _ => {}
        }

        let mut parts = Vec::new();
        if self.leading_text {
            parts.push(ContentPart::Text("Here is your photo".to_string()));
        }
        parts.push(ContentPart::Image(self.outputs[index % 3].clone()));
        Ok(parts)
    }
}
