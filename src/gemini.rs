//! The remote generative model: the describe and edit calls the photo shoot
//! pipeline is built from, and the Gemini REST client implementing them.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use crate::constants::{DEFAULT_DESCRIBE_MODEL, DEFAULT_IMAGE_MODEL};
use crate::payload::ImagePayload;

const API_KEY_HEADER: &str = "x-goog-api-key";
const MAX_ERROR_BODY: usize = 500;

const DESCRIBE_INSTRUCTIONS: &str = "Analyze the two provided images. Image 1 contains a person. Image 2 contains an accessory. Provide a detailed, objective description of the person's key visual features (age range, gender presentation, hair style and color, skin tone, prominent facial features, body type) and the clothing they are wearing. Then, provide a detailed, objective description of the accessory (type of object, material, color, shape, details). Return ONLY the JSON object.";

/// Textual identity of the subject and the accessory, reused in every edit
/// prompt so the three shots stay consistent with each other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptions {
    /// Age range, gender presentation, hair, skin tone, face, build, clothing.
    pub person: String,
    /// Object type, material, color, shape, details.
    pub accessory: String,
}

/// A piece of an edit response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentPart {
    /// Commentary the model sent along.
    Text(String),
    /// An image.
    Image(ImagePayload),
}

/// Failures talking to the remote model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemoteError {
    /// The request never got a response.
    Transport(String),
    /// Non-success HTTP status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },
    /// The response body didn't have the expected shape.
    Parse(String),
    /// The response was well formed but had nothing usable in it.
    MissingContent(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "Request to the model failed: {err}"),
            Self::Status { status, body } => write!(f, "Model API error {status}: {body}"),
            Self::Parse(err) => write!(f, "Failed to parse model response: {err}"),
            Self::MissingContent(what) => write!(f, "Model response missing {what}"),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// The two remote operations the pipeline needs.
pub trait GenerativeModel: Send + Sync {
    /// Describes the person in the first image and the accessory in the
    /// second.
    fn describe(
        &self,
        person: &ImagePayload,
        accessory: &ImagePayload,
    ) -> impl Future<Output = Result<Descriptions, RemoteError>> + Send;

    /// Edits `base` following `prompt`; returns every part of the answer.
    fn edit(
        &self,
        base: &ImagePayload,
        prompt: &str,
    ) -> impl Future<Output = Result<Vec<ContentPart>, RemoteError>> + Send;
}

/// Where and which models to call.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API root, eg `https://generativelanguage.googleapis.com/`.
    pub base_url: Url,
    /// Model used for the describe call.
    pub describe_model: String,
    /// Model used for the edit calls.
    pub image_model: String,
}

impl GeminiConfig {
    /// Default models against `base_url`.
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            describe_model: DEFAULT_DESCRIBE_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

/// Gemini `generateContent` client.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Builds a client. The base URL is treated as a directory.
    pub fn new(api_key: &str, mut config: GeminiConfig) -> Self {
        if !config.base_url.path().ends_with('/') {
            let path = format!("{}/", config.base_url.path());
            config.base_url.set_path(&path);
        }
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            config,
        }
    }

    fn endpoint(&self, model: &str) -> Result<Url, RemoteError> {
        self.config
            .base_url
            .join(&format!("v1beta/models/{model}:generateContent"))
            .map_err(|err| RemoteError::Transport(err.to_string()))
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, RemoteError> {
        let url = self.endpoint(model)?;
        debug!(%url, "calling generateContent");

        let resp = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| RemoteError::Parse(err.to_string()))
    }
}

impl GenerativeModel for GeminiClient {
    #[instrument(skip_all, fields(model = %self.config.describe_model))]
    async fn describe(
        &self,
        person: &ImagePayload,
        accessory: &ImagePayload,
    ) -> Result<Descriptions, RemoteError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::text(DESCRIBE_INSTRUCTIONS),
                    RequestPart::image(person),
                    RequestPart::image(accessory),
                ],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(descriptions_schema()),
                response_modalities: None,
            }),
        };

        let response = self
            .generate_content(&self.config.describe_model, &request)
            .await?;
        let text = response
            .into_parts()
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| RemoteError::MissingContent("description text".to_string()))?;

        serde_json::from_str(&text)
            .map_err(|err| RemoteError::Parse(format!("descriptions: {err}")))
    }

    #[instrument(skip_all, fields(model = %self.config.image_model))]
    async fn edit(
        &self,
        base: &ImagePayload,
        prompt: &str,
    ) -> Result<Vec<ContentPart>, RemoteError> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart::image(base), RequestPart::text(prompt)],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_schema: None,
                response_modalities: Some(vec!["IMAGE", "TEXT"]),
            }),
        };

        let response = self
            .generate_content(&self.config.image_model, &request)
            .await?;

        let mut parts = Vec::new();
        for part in response.into_parts() {
            if let Some(inline) = part.inline_data {
                match ImagePayload::from_base64(&inline.mime_type, &inline.data) {
                    Ok(payload) => parts.push(ContentPart::Image(payload)),
                    Err(err) => debug!("Skipping unusable inline part: {}", err),
                }
            } else if let Some(text) = part.text {
                parts.push(ContentPart::Text(text));
            }
        }
        debug!(parts = parts.len(), "edit response");
        Ok(parts)
    }
}

fn descriptions_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "person": {
                "type": "STRING",
                "description": "Detailed description of the person's appearance."
            },
            "accessory": {
                "type": "STRING",
                "description": "Detailed description of the accessory's appearance."
            }
        },
        "required": ["person", "accessory"]
    })
}

// -----------------------------
// generateContent wire format
// -----------------------------

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Debug)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: RequestInlineData<'a>,
    },
}

impl<'a> RequestPart<'a> {
    fn text(text: &'a str) -> Self {
        Self::Text { text }
    }

    fn image(payload: &'a ImagePayload) -> Self {
        Self::Inline {
            inline_data: RequestInlineData {
                mime_type: payload.media_type(),
                data: payload.base64_data(),
            },
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RequestInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate; empty when there is none.
    fn into_parts(self) -> Vec<ResponsePart> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default()
    }
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize, Debug)]
struct ResponseInlineData {
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: String,
    data: String,
}
