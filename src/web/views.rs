use super::prelude::*;
use crate::constants::{
    LIFESTYLE_TITLE, PENDING_REFRESH_SECONDS, PORTRAIT_TITLE, PRODUCT_TITLE,
};
use crate::controller::{ActiveError, Controller, WorkingState};
use crate::error::ErrorKind;
use crate::models::{GeneratedImage, PhotoShootSession};
use crate::payload::ImagePayload;
use crate::shoot::Style;
use axum::Json;

#[derive(Clone, Debug)]
pub(crate) struct StyleOption {
    pub(crate) name: &'static str,
    pub(crate) selected: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct CardView {
    pub(crate) title: String,
    pub(crate) src: Option<String>,
    pub(crate) original: Option<String>,
    pub(crate) download_name: String,
}

impl From<&GeneratedImage> for CardView {
    fn from(card: &GeneratedImage) -> Self {
        let slug = card.title.to_ascii_lowercase().replace(' ', "-");
        let extension = card.src.as_ref().map(ImagePayload::file_extension).unwrap_or("png");
        Self {
            title: card.title.clone(),
            src: card.src.as_ref().map(|src| src.as_str().to_string()),
            original: card.original.as_ref().map(|src| src.as_str().to_string()),
            download_name: format!("photoshoot-{slug}.{extension}"),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct HistoryEntryView {
    pub(crate) id: String,
    pub(crate) created: String,
    pub(crate) scenario: String,
    pub(crate) style: String,
    pub(crate) thumbnail: Option<String>,
}

impl From<&PhotoShootSession> for HistoryEntryView {
    fn from(session: &PhotoShootSession) -> Self {
        Self {
            id: session.id.clone(),
            created: session.created_label(),
            scenario: session.scenario.clone(),
            style: session.style.clone(),
            thumbnail: session
                .generated_images
                .iter()
                .find_map(|card| card.src.as_ref())
                .map(|src| src.as_str().to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ErrorView {
    pub(crate) heading: &'static str,
    pub(crate) message: String,
}

impl From<&ActiveError> for ErrorView {
    fn from(err: &ActiveError) -> Self {
        let heading = match err.kind {
            ErrorKind::InputValidation => "Missing input",
            ErrorKind::RemoteCall => "Generation failed",
            ErrorKind::Resize => "Could not prepare the session for history",
            ErrorKind::Persistence => "History not saved",
            ErrorKind::Other => "Something went wrong",
        };
        Self {
            heading,
            message: err.message.clone(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub(crate) csrf_token: String,
    pub(crate) person_image: Option<String>,
    pub(crate) accessory_image: Option<String>,
    pub(crate) scenario: String,
    pub(crate) styles: Vec<StyleOption>,
    pub(crate) cards: Vec<CardView>,
    pub(crate) error: Option<ErrorView>,
    pub(crate) history: Vec<HistoryEntryView>,
}

impl IndexTemplate {
    fn new(working: &WorkingState, history: &[PhotoShootSession], csrf_token: String) -> Self {
        Self {
            csrf_token,
            person_image: working
                .person_image
                .as_ref()
                .map(|image| image.as_str().to_string()),
            accessory_image: working
                .accessory_image
                .as_ref()
                .map(|image| image.as_str().to_string()),
            scenario: working.scenario.clone(),
            styles: Style::ALL
                .into_iter()
                .map(|style| StyleOption {
                    name: style.name(),
                    selected: style.name() == working.style,
                })
                .collect(),
            cards: working.generated_images.iter().map(CardView::from).collect(),
            error: working.error.as_ref().map(ErrorView::from),
            history: history.iter().map(HistoryEntryView::from).collect(),
        }
    }
}

/// Shown while a generation holds the controller.
#[derive(Template, WebTemplate)]
#[template(path = "pending.html")]
pub(crate) struct PendingTemplate {
    pub(crate) message: String,
    pub(crate) titles: [&'static str; 3],
    pub(crate) refresh_seconds: u32,
}

impl PendingTemplate {
    fn new(message: String) -> Self {
        Self {
            message,
            titles: [PORTRAIT_TITLE, PRODUCT_TITLE, LIFESTYLE_TITLE],
            refresh_seconds: PENDING_REFRESH_SECONDS,
        }
    }
}

fn render_index<M, S>(controller: &Controller<M, S>, csrf_token: String) -> Response
where
    M: GenerativeModel,
    S: KeyValueStore,
{
    IndexTemplate::new(controller.working(), controller.history(), csrf_token).into_response()
}

/// The page for a generate request that didn't pass validation. The error is
/// shown without being stored.
pub(crate) fn rejected_form<M, S>(
    controller: &Controller<M, S>,
    csrf_token: String,
    err: &PhotoShootError,
) -> Response
where
    M: GenerativeModel,
    S: KeyValueStore,
{
    let mut page = IndexTemplate::new(controller.working(), controller.history(), csrf_token);
    page.error = Some(ErrorView::from(&ActiveError::from(err)));
    page.into_response()
}

/// handles the / GET
#[instrument(level = "debug", skip_all)]
pub(crate) async fn root_handler<M, S>(
    State(state): State<AppState<M, S>>,
    session: Session,
) -> Result<Response, PhotoShootError>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    let csrf_token = csrf_token(&session).await?;
    match state.controller.try_lock() {
        Ok(controller) => Ok(render_index(&controller, csrf_token)),
        Err(_) => Ok(PendingTemplate::new(state.progress_message()).into_response()),
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct ProgressView {
    pub(crate) busy: bool,
    pub(crate) message: Option<String>,
}

/// handles the /progress GET
pub(crate) async fn progress_handler<M, S>(State(state): State<AppState<M, S>>) -> Json<ProgressView>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    let busy = match state.controller.try_lock() {
        Ok(controller) => controller.is_busy(),
        Err(_) => true,
    };
    let message = state.progress().map(|step| step.to_string());
    Json(ProgressView { busy, message })
}
