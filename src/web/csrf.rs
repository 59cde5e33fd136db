use rand::distr::{Alphanumeric, Distribution};
use tower_sessions::Session;

use crate::error::PhotoShootError;

const CSRF_TOKEN_KEY: &str = "csrf_token";
const CSRF_TOKEN_LENGTH: usize = 32;

fn generate_token() -> String {
    Alphanumeric
        .sample_iter(rand::rng())
        .take(CSRF_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn session_error(err: tower_sessions::session::Error) -> PhotoShootError {
    PhotoShootError::InternalServerError(err.to_string())
}

/// Returns the session's token, minting one on first use.
pub(crate) async fn csrf_token(session: &Session) -> Result<String, PhotoShootError> {
    let existing = session
        .get::<String>(CSRF_TOKEN_KEY)
        .await
        .map_err(session_error)?;
    if let Some(token) = existing {
        return Ok(token);
    }
    let token = generate_token();
    session
        .insert(CSRF_TOKEN_KEY, token.clone())
        .await
        .map_err(session_error)?;
    Ok(token)
}

pub(crate) async fn validate_csrf(session: &Session, token: &str) -> Result<(), PhotoShootError> {
    let stored = session
        .get::<String>(CSRF_TOKEN_KEY)
        .await
        .map_err(session_error)?;
    match stored {
        Some(expected) if !token.is_empty() && expected == token => Ok(()),
        _ => Err(PhotoShootError::Unauthorized),
    }
}
