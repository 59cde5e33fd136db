use super::prelude::*;
use super::views::rejected_form;
use crate::controller::Controller;
use crate::payload::ImagePayload;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use tracing::error;

#[derive(Deserialize)]
pub(crate) struct CsrfForm {
    csrf_token: String,
}

/// Fields of the generate form. Image fields are `None` when the user didn't
/// pick a new file.
#[derive(Debug, Default)]
pub(crate) struct GenerateForm {
    csrf_token: String,
    person: Option<ImagePayload>,
    accessory: Option<ImagePayload>,
    scenario: String,
    style: String,
}

fn multipart_error(err: MultipartError) -> PhotoShootError {
    info!("Failed to read multipart body: {}", err);
    PhotoShootError::BadRequest
}

fn upload_payload(bytes: &[u8]) -> Result<Option<ImagePayload>, PhotoShootError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    ImagePayload::sniff(bytes).map(Some).map_err(|err| {
        info!("Rejected upload: {}", err);
        PhotoShootError::BadRequest
    })
}

impl GenerateForm {
    async fn read(mut multipart: Multipart) -> Result<Self, PhotoShootError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let field_name = field.name().unwrap_or_default().to_string();
            match field_name.as_str() {
                "csrf_token" => form.csrf_token = field.text().await.map_err(multipart_error)?,
                "scenario" => form.scenario = field.text().await.map_err(multipart_error)?,
                "style" => form.style = field.text().await.map_err(multipart_error)?,
                "person" => {
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    form.person = upload_payload(&bytes)?;
                }
                "accessory" => {
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    form.accessory = upload_payload(&bytes)?;
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

/// Starts a photo shoot and returns straight away; the page polls until the
/// background task lets go of the controller.
///
/// Incomplete submissions get the page back with the error panel filled in
/// and leave the stored inputs alone.
pub(crate) async fn generate_handler<M, S>(
    State(state): State<AppState<M, S>>,
    session: Session,
    multipart: Multipart,
) -> Result<Response, PhotoShootError>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    let form = GenerateForm::read(multipart).await?;
    validate_csrf(&session, &form.csrf_token).await?;

    let mut controller = state
        .controller
        .clone()
        .try_lock_owned()
        .map_err(|_| PhotoShootError::Busy)?;

    // a blank file field keeps the image already on screen
    let person = form
        .person
        .or_else(|| controller.working().person_image.clone());
    let accessory = form
        .accessory
        .or_else(|| controller.working().accessory_image.clone());
    if let Err(err) =
        Controller::<M, S>::validate_inputs(person.as_ref(), accessory.as_ref(), &form.scenario)
    {
        info!("Rejected photo shoot: {}", err);
        let csrf_token = csrf_token(&session).await?;
        return Ok((
            StatusCode::BAD_REQUEST,
            rejected_form(&controller, csrf_token, &err),
        )
            .into_response());
    }

    controller.set_person_image(person);
    controller.set_accessory_image(accessory);
    controller.set_scenario(&form.scenario);
    if !form.style.is_empty() {
        controller.set_style(&form.style);
    }

    let request = controller.begin_generation()?;
    info!(style = %request.style, "starting photo shoot");
    let task = tokio::spawn(async move {
        if let Err(err) = controller.run_generation(request).await {
            warn!("Photo shoot finished with an error: {}", err);
        }
    });

    // the guard is released when the task unwinds, the state isn't
    let shared = state.controller.clone();
    tokio::spawn(async move {
        if let Err(err) = task.await {
            error!("Photo shoot task died: {}", err);
            shared.lock().await.abandon_generation();
        }
    });

    Ok(Redirect::to("/").into_response())
}

#[instrument(skip_all, fields(id = %id))]
pub(crate) async fn load_session_handler<M, S>(
    State(state): State<AppState<M, S>>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, PhotoShootError>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    validate_csrf(&session, &form.csrf_token).await?;
    let mut controller = state
        .controller
        .try_lock()
        .map_err(|_| PhotoShootError::Busy)?;
    controller.load_session(&id)?;
    Ok(Redirect::to("/"))
}

#[instrument(skip_all, fields(id = %id))]
pub(crate) async fn delete_session_handler<M, S>(
    State(state): State<AppState<M, S>>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, PhotoShootError>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    validate_csrf(&session, &form.csrf_token).await?;
    let mut controller = state
        .controller
        .try_lock()
        .map_err(|_| PhotoShootError::Busy)?;
    // shown in the error panel on the next render
    if let Err(err) = controller.delete_session(&id).await {
        warn!("Failed to delete session: {}", err);
    }
    Ok(Redirect::to("/"))
}

pub(crate) async fn clear_history_handler<M, S>(
    State(state): State<AppState<M, S>>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, PhotoShootError>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    validate_csrf(&session, &form.csrf_token).await?;
    let mut controller = state
        .controller
        .try_lock()
        .map_err(|_| PhotoShootError::Busy)?;
    if let Err(err) = controller.clear_history().await {
        warn!("Failed to clear history: {}", err);
    }
    Ok(Redirect::to("/"))
}

pub(crate) async fn dismiss_error_handler<M, S>(
    State(state): State<AppState<M, S>>,
    session: Session,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, PhotoShootError>
where
    M: GenerativeModel + 'static,
    S: KeyValueStore + 'static,
{
    validate_csrf(&session, &form.csrf_token).await?;
    let mut controller = state
        .controller
        .try_lock()
        .map_err(|_| PhotoShootError::Busy)?;
    controller.dismiss_error();
    Ok(Redirect::to("/"))
}
