//! Web interface for the photo shoot generator

use std::num::NonZeroU16;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::sync::{Mutex, watch};
use tower_sessions::{MemoryStore as SessionStore, SessionManagerLayer};
use tracing::{error, info};

use crate::constants::MAX_UPLOAD_BYTES;
use crate::controller::Controller;
use crate::gemini::GenerativeModel;
use crate::shoot::Progress;
use crate::storage::KeyValueStore;

mod actions;
pub(crate) mod csrf;
pub(crate) mod prelude;
mod views;

const PENDING_MESSAGE: &str = "Generating your photo shoot...";

/// Shared handle on the controller plus a lock-free view of its progress.
pub struct AppState<M, S> {
    pub(crate) controller: Arc<Mutex<Controller<M, S>>>,
    progress: watch::Receiver<Option<Progress>>,
}

impl<M, S> Clone for AppState<M, S> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<M: GenerativeModel, S: KeyValueStore> AppState<M, S> {
    /// Wraps a controller for sharing between requests.
    pub fn new(controller: Controller<M, S>) -> Self {
        let progress = controller.subscribe_progress();
        Self {
            controller: Arc::new(Mutex::new(controller)),
            progress,
        }
    }

    /// The shared controller.
    pub fn controller(&self) -> Arc<Mutex<Controller<M, S>>> {
        self.controller.clone()
    }

    pub(crate) fn progress(&self) -> Option<Progress> {
        *self.progress.borrow()
    }

    pub(crate) fn progress_message(&self) -> String {
        self.progress()
            .map(|step| step.to_string())
            .unwrap_or_else(|| PENDING_MESSAGE.to_string())
    }
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

/// Builds the router, sessions included.
pub fn create_router<M, S>(state: AppState<M, S>) -> Router
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    let session_layer = SessionManagerLayer::new(SessionStore::default()).with_secure(false);

    Router::new()
        .route("/", get(views::root_handler::<M, S>))
        .route("/progress", get(views::progress_handler::<M, S>))
        .route("/generate", post(actions::generate_handler::<M, S>))
        .route(
            "/history/{id}/load",
            post(actions::load_session_handler::<M, S>),
        )
        .route(
            "/history/{id}/delete",
            post(actions::delete_session_handler::<M, S>),
        )
        .route(
            "/history/clear",
            post(actions::clear_history_handler::<M, S>),
        )
        .route("/error/dismiss", post(actions::dismiss_error_handler::<M, S>))
        .route("/static/styles.css", get(styles_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(session_layer)
        .with_state(state)
}

/// Serves the UI until the listener fails.
pub async fn setup_server<M, S>(
    listen_addr: &str,
    port: NonZeroU16,
    controller: Controller<M, S>,
) -> Result<(), anyhow::Error>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    let app = create_router(AppState::new(controller));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::controller::GenerationState;
    use crate::history::HistoryStore;
    use crate::shoot::PhotoShootClient;
    use crate::storage::MemoryStore;
    use crate::testing::{ScriptedModel, sample_png, sample_session};
    use views::ProgressView;

    const BOUNDARY: &str = "photoshoot-test-boundary";

    async fn setup_state(model: ScriptedModel, seed: &[&str]) -> AppState<ScriptedModel, MemoryStore> {
        let store = MemoryStore::new();
        let mut history = HistoryStore::load(store.clone()).await;
        for (n, id) in seed.iter().enumerate() {
            history
                .add(sample_session(id, n as i64))
                .await
                .expect("seed history");
        }
        let history = HistoryStore::load(store).await;
        AppState::new(Controller::new(PhotoShootClient::new(model), history))
    }

    async fn read_body(response: axum::response::Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).to_string()
    }

    /// Loads the page and returns the session cookie and CSRF token.
    async fn session_for(app: &Router) -> (String, String) {
        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .expect("cookie text")
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string();
        let body = read_body(response).await;
        let marker = "name=\"csrf_token\" value=\"";
        let start = body.find(marker).expect("csrf field") + marker.len();
        let token = body[start..start + 32].to_string();
        (cookie, token)
    }

    fn form_post(uri: &str, cookie: &str, token: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("csrf_token={token}")))
            .expect("request")
    }

    fn text_part(body: &mut Vec<u8>, name: &str, value: &str) {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    fn file_part(body: &mut Vec<u8>, name: &str, bytes: &[u8]) {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    #[tokio::test]
    async fn homepage_renders_form_and_history() {
        let state = setup_state(ScriptedModel::succeeding(), &["first", "second"]).await;
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::SET_COOKIE));
        let body = read_body(response).await;
        assert!(body.contains("name=\"csrf_token\""));
        assert!(body.contains("<option value=\"Editorial\" selected>"));
        assert!(body.contains("Cinematográfico"));
        assert!(body.contains("Minimalista"));
        assert!(body.contains("scenario first"));
        assert!(body.contains("/history/second/load"));
    }

    #[tokio::test]
    async fn history_actions_need_a_csrf_token() {
        let state = setup_state(ScriptedModel::succeeding(), &["keep"]).await;
        let controller = state.controller();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::post("/history/clear")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("csrf_token=guess"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(controller.lock().await.history().len(), 1);
    }

    #[tokio::test]
    async fn clear_load_and_delete_history() {
        let state = setup_state(ScriptedModel::succeeding(), &["a", "b", "c"]).await;
        let controller = state.controller();
        let app = create_router(state);
        let (cookie, token) = session_for(&app).await;

        let response = app
            .clone()
            .oneshot(form_post("/history/b/load", &cookie, &token))
            .await
            .expect("load");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(controller.lock().await.working().scenario, "scenario b");

        let response = app
            .clone()
            .oneshot(form_post("/history/missing/load", &cookie, &token))
            .await
            .expect("load missing");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(form_post("/history/c/delete", &cookie, &token))
            .await
            .expect("delete");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let ids: Vec<String> = controller
            .lock()
            .await
            .history()
            .iter()
            .map(|session| session.id.clone())
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);

        let response = app
            .oneshot(form_post("/history/clear", &cookie, &token))
            .await
            .expect("clear");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(controller.lock().await.history().is_empty());
    }

    #[tokio::test]
    async fn busy_controller_shows_pending_page_and_rejects_changes() {
        let state = setup_state(ScriptedModel::succeeding(), &["a"]).await;
        let controller = state.controller();
        let app = create_router(state);
        let (cookie, token) = session_for(&app).await;

        let _guard = controller.lock_owned().await;

        let response = app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_body(response).await;
        assert!(body.contains("http-equiv=\"refresh\""));
        assert!(body.contains("Lifestyle Scene"));
        assert!(body.contains(PENDING_MESSAGE));

        let response = app
            .clone()
            .oneshot(Request::get("/progress").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let progress: ProgressView =
            serde_json::from_str(&read_body(response).await).expect("progress json");
        assert_eq!(
            progress,
            ProgressView {
                busy: true,
                message: None
            }
        );

        let response = app
            .oneshot(form_post("/history/clear", &cookie, &token))
            .await
            .expect("clear");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn generate_runs_in_the_background_and_saves_history() {
        let state = setup_state(ScriptedModel::succeeding(), &[]).await;
        let controller = state.controller();
        let app = create_router(state);
        let (cookie, token) = session_for(&app).await;

        let person = sample_png(60, 90).decode().expect("person bytes");
        let accessory = sample_png(40, 40).decode().expect("accessory bytes");
        let mut body = Vec::new();
        text_part(&mut body, "csrf_token", &token);
        file_part(&mut body, "person", &person);
        file_part(&mut body, "accessory", &accessory);
        text_part(&mut body, "scenario", "a snowy mountain cabin");
        text_part(&mut body, "style", "Retro");
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let response = app
            .clone()
            .oneshot(
                Request::post("/generate")
                    .header(header::COOKIE, &cookie)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("generate");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let controller = controller.lock().await;
        assert_eq!(controller.working().state, GenerationState::Succeeded);
        assert_eq!(controller.working().style, "Retro");
        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.history()[0].scenario, "a snowy mountain cabin");
    }

    fn multipart_post(cookie: &str, body: Vec<u8>) -> Request<Body> {
        Request::post("/generate")
            .header(header::COOKIE, cookie)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn generate_without_images_is_rejected() {
        let state = setup_state(ScriptedModel::succeeding(), &[]).await;
        let controller = state.controller();
        let app = create_router(state);
        let (cookie, token) = session_for(&app).await;

        let mut body = Vec::new();
        text_part(&mut body, "csrf_token", &token);
        file_part(&mut body, "person", &[]);
        text_part(&mut body, "scenario", "a beach");
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let response = app
            .oneshot(multipart_post(&cookie, body))
            .await
            .expect("generate");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let page = read_body(response).await;
        assert!(page.contains("Please upload both images."));

        let controller = controller.lock().await;
        assert_eq!(controller.working().state, GenerationState::Idle);
        assert_eq!(controller.working().scenario, "");
        assert_eq!(controller.working().error, None);
        assert!(controller.client().model().calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_generate_keeps_the_stored_inputs() {
        let state = setup_state(ScriptedModel::succeeding(), &["a"]).await;
        let controller = state.controller();
        let app = create_router(state);
        let (cookie, token) = session_for(&app).await;

        let response = app
            .clone()
            .oneshot(form_post("/history/a/load", &cookie, &token))
            .await
            .expect("load");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let before = controller.lock().await.working().clone();

        let replacement = sample_png(8, 8).decode().expect("png bytes");
        let mut body = Vec::new();
        text_part(&mut body, "csrf_token", &token);
        file_part(&mut body, "person", &replacement);
        text_part(&mut body, "scenario", "   ");
        text_part(&mut body, "style", "Minimalista");
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let response = app
            .oneshot(multipart_post(&cookie, body))
            .await
            .expect("generate");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_body(response).await.contains("Please describe a scenario."));
        assert_eq!(controller.lock().await.working(), &before);
    }

    #[tokio::test]
    async fn generate_recovers_when_the_task_dies() {
        let state = setup_state(ScriptedModel::panicking_describe(), &[]).await;
        let controller = state.controller();
        let app = create_router(state);
        let (cookie, token) = session_for(&app).await;

        let person = sample_png(20, 30).decode().expect("person bytes");
        let accessory = sample_png(10, 10).decode().expect("accessory bytes");
        let mut body = Vec::new();
        text_part(&mut body, "csrf_token", &token);
        file_part(&mut body, "person", &person);
        file_part(&mut body, "accessory", &accessory);
        text_part(&mut body, "scenario", "a lighthouse");
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let response = app
            .clone()
            .oneshot(multipart_post(&cookie, body))
            .await
            .expect("generate");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let mut state = GenerationState::Generating;
        for _ in 0..1000 {
            state = controller.lock().await.working().state;
            if state != GenerationState::Generating {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state, GenerationState::Failed);

        let guard = controller.lock().await;
        assert!(guard.can_generate());
        assert!(guard.working().error.is_some());
        assert!(guard.working().generated_images.is_empty());
        drop(guard);

        let response = app
            .oneshot(form_post("/history/clear", &cookie, &token))
            .await
            .expect("clear");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn file_inputs_are_required_until_an_image_is_stored() {
        let state = setup_state(ScriptedModel::succeeding(), &["a"]).await;
        let app = create_router(state);
        let (cookie, token) = session_for(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let page = read_body(response).await;
        assert!(page.contains("name=\"person\" accept=\"image/png,image/jpeg,image/webp\" required"));
        assert!(page.contains("name=\"accessory\" accept=\"image/png,image/jpeg,image/webp\" required"));

        let response = app
            .clone()
            .oneshot(form_post("/history/a/load", &cookie, &token))
            .await
            .expect("load");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let page = read_body(response).await;
        assert!(!page.contains("required>"));
        assert!(page.contains("<textarea name=\"scenario\" rows=\"3\" required"));
    }

    #[tokio::test]
    async fn serves_the_stylesheet() {
        let state = setup_state(ScriptedModel::succeeding(), &[]).await;
        let response = create_router(state)
            .oneshot(
                Request::get("/static/styles.css")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).expect("content type"),
            "text/css"
        );
    }
}
