pub(crate) use super::csrf::{csrf_token, validate_csrf};
pub(crate) use crate::error::PhotoShootError;
pub(crate) use crate::gemini::GenerativeModel;
pub(crate) use crate::storage::KeyValueStore;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::extract::{Form, Path, State};
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use tower_sessions::Session;
pub(crate) use tracing::{info, instrument, warn};
