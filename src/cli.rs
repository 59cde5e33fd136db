//! CLI parser
use clap::{Args, Parser};
use std::num::NonZeroU16;
use url::Url;

use crate::constants::{
    DEFAULT_DESCRIBE_MODEL, DEFAULT_GEMINI_BASE_URL, DEFAULT_HISTORY_QUOTA_BYTES,
    DEFAULT_IMAGE_MODEL,
};
use crate::gemini::{GeminiClient, GeminiConfig};

#[derive(Args, Debug, Clone)]
/// Options for talking to Gemini, shared by both binaries.
pub struct GeminiOptions {
    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// Gemini API key. Env: GEMINI_API_KEY
    pub gemini_api_key: String,

    #[clap(long, default_value = DEFAULT_GEMINI_BASE_URL, env = "GEMINI_BASE_URL")]
    /// API base URL. Env: GEMINI_BASE_URL
    pub gemini_base_url: Url,

    #[clap(long, default_value = DEFAULT_DESCRIBE_MODEL, env = "PHOTOSHOOT_DESCRIBE_MODEL")]
    /// Model used to describe the uploaded images.
    /// Env: PHOTOSHOOT_DESCRIBE_MODEL
    pub describe_model: String,

    #[clap(long, default_value = DEFAULT_IMAGE_MODEL, env = "PHOTOSHOOT_IMAGE_MODEL")]
    /// Model used for the three image edits.
    /// Env: PHOTOSHOOT_IMAGE_MODEL
    pub image_model: String,
}

impl GeminiOptions {
    /// Builds a client from the options.
    pub fn client(&self) -> GeminiClient {
        let config = GeminiConfig {
            describe_model: self.describe_model.clone(),
            image_model: self.image_model.clone(),
            ..GeminiConfig::with_base_url(self.gemini_base_url.clone())
        };
        GeminiClient::new(&self.gemini_api_key, config)
    }
}

#[derive(Args, Debug, Clone)]
/// Where history lives.
pub struct StorageOptions {
    #[clap(
        long,
        default_value = "photoshoot.sqlite",
        env = "PHOTOSHOOT_DATABASE_PATH"
    )]
    /// Path to the database file, eg `/data/photoshoot.sqlite`.
    /// Env: PHOTOSHOOT_DATABASE_PATH
    pub database_path: String,

    #[clap(long, default_value_t = DEFAULT_HISTORY_QUOTA_BYTES, env = "PHOTOSHOOT_HISTORY_QUOTA")]
    /// Largest serialised history accepted, in bytes. `0` disables the limit.
    /// Env: PHOTOSHOOT_HISTORY_QUOTA
    pub history_quota_bytes: usize,
}

impl StorageOptions {
    /// The quota as the stores expect it.
    pub fn quota(&self) -> Option<usize> {
        (self.history_quota_bytes > 0).then_some(self.history_quota_bytes)
    }
}

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "PHOTOSHOOT_DEBUG")]
    /// Enable debug logging. Env: PHOTOSHOOT_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "PHOTOSHOOT_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: PHOTOSHOOT_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "PHOTOSHOOT_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: PHOTOSHOOT_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(flatten)]
    /// History storage.
    pub storage: StorageOptions,

    #[clap(flatten)]
    /// Gemini access.
    pub gemini: GeminiOptions,
}
