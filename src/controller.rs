//! Working state of the app and the generate / load / delete flows on top
//! of it.
//!
//! A request moves `Idle → Generating → Succeeded | Failed`; the last two
//! accept a new request straight away, same as `Idle`.

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::constants::{DEFAULT_STYLE, LIFESTYLE_TITLE, PORTRAIT_TITLE, PRODUCT_TITLE};
use crate::error::{ErrorKind, PhotoShootError};
use crate::gemini::GenerativeModel;
use crate::history::HistoryStore;
use crate::models::{GeneratedImage, PhotoShootSession};
use crate::payload::ImagePayload;
use crate::resize::{ResizeError, ResizeOptions, resize};
use crate::shoot::{PhotoShootClient, Progress};
use crate::storage::KeyValueStore;

/// Where the current request is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GenerationState {
    /// Nothing has run yet, or a session was just loaded.
    #[default]
    Idle,
    /// Placeholders are up and the pipeline is running.
    Generating,
    /// Results are in.
    Succeeded,
    /// The request failed; see the error.
    Failed,
}

/// The error currently on display. Only the latest is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveError {
    /// What kind of failure this was.
    pub kind: ErrorKind,
    /// Message for the user.
    pub message: String,
}

impl From<&PhotoShootError> for ActiveError {
    fn from(err: &PhotoShootError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

/// Everything on screen that isn't history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkingState {
    /// Uploaded person image.
    pub person_image: Option<ImagePayload>,
    /// Uploaded accessory image.
    pub accessory_image: Option<ImagePayload>,
    /// Scenario for the lifestyle scene.
    pub scenario: String,
    /// Picked style name.
    pub style: String,
    /// Empty, or the three result cards.
    pub generated_images: Vec<GeneratedImage>,
    /// Request state.
    pub state: GenerationState,
    /// Latest error.
    pub error: Option<ActiveError>,
}

impl Default for WorkingState {
    fn default() -> Self {
        Self {
            person_image: None,
            accessory_image: None,
            scenario: String::new(),
            style: DEFAULT_STYLE.to_string(),
            generated_images: Vec::new(),
            state: GenerationState::Idle,
            error: None,
        }
    }
}

/// Inputs captured when a request starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Person image.
    pub person_image: ImagePayload,
    /// Accessory image.
    pub accessory_image: ImagePayload,
    /// Scenario text.
    pub scenario: String,
    /// Style name.
    pub style: String,
}

fn result_cards(request: &GenerationRequest, srcs: [Option<ImagePayload>; 3]) -> Vec<GeneratedImage> {
    let originals = [
        &request.person_image,
        &request.accessory_image,
        &request.person_image,
    ];
    [PORTRAIT_TITLE, PRODUCT_TITLE, LIFESTYLE_TITLE]
        .into_iter()
        .zip(originals)
        .zip(srcs)
        .map(|((title, original), src)| GeneratedImage {
            src,
            ..GeneratedImage::placeholder(title, Some(original.clone()))
        })
        .collect()
}

/// Owns the working state and the history, and drives the pipeline.
#[derive(Debug)]
pub struct Controller<M, S> {
    client: PhotoShootClient<M>,
    history: HistoryStore<S>,
    working: WorkingState,
    progress: watch::Sender<Option<Progress>>,
}

impl<M: GenerativeModel, S: KeyValueStore> Controller<M, S> {
    /// A controller with empty working state.
    pub fn new(client: PhotoShootClient<M>, history: HistoryStore<S>) -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            client,
            history,
            working: WorkingState::default(),
            progress,
        }
    }

    /// The pipeline client.
    pub fn client(&self) -> &PhotoShootClient<M> {
        &self.client
    }

    /// Current working state.
    pub fn working(&self) -> &WorkingState {
        &self.working
    }

    /// Stored sessions, newest first.
    pub fn history(&self) -> &[PhotoShootSession] {
        self.history.list()
    }

    /// True while a request is running.
    pub fn is_busy(&self) -> bool {
        self.working.state == GenerationState::Generating
    }

    /// Latest progress checkpoint of the running request.
    pub fn progress(&self) -> Option<Progress> {
        *self.progress.borrow()
    }

    /// Progress updates that can be read without holding the controller.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<Progress>> {
        self.progress.subscribe()
    }

    /// Sets or clears the person image.
    pub fn set_person_image(&mut self, image: Option<ImagePayload>) {
        self.working.person_image = image;
    }

    /// Sets or clears the accessory image.
    pub fn set_accessory_image(&mut self, image: Option<ImagePayload>) {
        self.working.accessory_image = image;
    }

    /// Sets the scenario text.
    pub fn set_scenario(&mut self, scenario: &str) {
        self.working.scenario = scenario.to_string();
    }

    /// Sets the style name. Unknown names are kept and generate as Editorial.
    pub fn set_style(&mut self, style: &str) {
        self.working.style = style.to_string();
    }

    /// Clears the error panel.
    pub fn dismiss_error(&mut self) {
        self.working.error = None;
    }

    /// Both images, a scenario, and nothing running.
    pub fn can_generate(&self) -> bool {
        self.working.person_image.is_some()
            && self.working.accessory_image.is_some()
            && !self.working.scenario.trim().is_empty()
            && !self.is_busy()
    }

    /// Checks that a request could start from these inputs, handing back
    /// the two images.
    pub fn validate_inputs(
        person_image: Option<&ImagePayload>,
        accessory_image: Option<&ImagePayload>,
        scenario: &str,
    ) -> Result<(ImagePayload, ImagePayload), PhotoShootError> {
        let (Some(person_image), Some(accessory_image)) = (person_image, accessory_image) else {
            return Err(PhotoShootError::InputValidation(
                "Please upload both images.".to_string(),
            ));
        };
        if scenario.trim().is_empty() {
            return Err(PhotoShootError::InputValidation(
                "Please describe a scenario.".to_string(),
            ));
        }
        Ok((person_image.clone(), accessory_image.clone()))
    }

    /// Validates the inputs and puts up the placeholders.
    ///
    /// Leaves the state untouched when rejected.
    pub fn begin_generation(&mut self) -> Result<GenerationRequest, PhotoShootError> {
        if self.is_busy() {
            return Err(PhotoShootError::InputValidation(
                "A photo shoot is already being generated.".to_string(),
            ));
        }
        let (person_image, accessory_image) = Self::validate_inputs(
            self.working.person_image.as_ref(),
            self.working.accessory_image.as_ref(),
            &self.working.scenario,
        )?;

        let request = GenerationRequest {
            person_image,
            accessory_image,
            scenario: self.working.scenario.clone(),
            style: self.working.style.clone(),
        };
        self.working.error = None;
        self.working.generated_images = result_cards(&request, [None, None, None]);
        self.working.state = GenerationState::Generating;
        Ok(request)
    }

    /// Runs the pipeline for a request from [Self::begin_generation] and
    /// saves the result to history.
    #[instrument(skip_all, fields(style = %request.style))]
    pub async fn run_generation(&mut self, request: GenerationRequest) -> Result<(), PhotoShootError> {
        let progress = &self.progress;
        let result = self
            .client
            .generate_photo_shoot(
                &request.person_image,
                &request.accessory_image,
                &request.scenario,
                &request.style,
                |step| {
                    info!("{}", step);
                    progress.send_replace(Some(step));
                },
            )
            .await;
        self.progress.send_replace(None);

        let images = match result {
            Ok(images) => images,
            Err(err) => {
                self.working.generated_images.clear();
                return Err(self.fail(err.into()));
            }
        };

        self.working.generated_images =
            result_cards(&request, images.clone().map(Some));

        let session = match self.build_session(&request, &images) {
            Ok(session) => session,
            // results stay on screen, they just don't get saved
            Err(err) => return Err(self.fail(err.into())),
        };

        self.working.state = GenerationState::Succeeded;
        let session_id = session.id.clone();
        if let Err(err) = self.history.add(session).await {
            let err = PhotoShootError::from(err);
            self.working.error = Some(ActiveError::from(&err));
            return Err(err);
        }
        info!(session_id, "photo shoot saved to history");
        Ok(())
    }

    /// Fails a request whose task died before finishing, so the controller
    /// accepts new ones again. Does nothing when no request is running.
    pub fn abandon_generation(&mut self) {
        if !self.is_busy() {
            return;
        }
        self.progress.send_replace(None);
        self.working.generated_images.clear();
        self.fail(PhotoShootError::InternalServerError(
            "the photo shoot stopped unexpectedly".to_string(),
        ));
    }

    /// [Self::begin_generation] then [Self::run_generation].
    pub async fn generate(&mut self) -> Result<(), PhotoShootError> {
        let request = self.begin_generation()?;
        self.run_generation(request).await
    }

    /// Replaces the working state with a stored session.
    pub fn load_session(&mut self, id: &str) -> Result<(), PhotoShootError> {
        if self.is_busy() {
            return Err(PhotoShootError::Busy);
        }
        let session = self
            .history
            .get(id)
            .cloned()
            .ok_or_else(|| PhotoShootError::NotFound(format!("session {id}")))?;

        self.working = WorkingState {
            person_image: Some(session.person_image),
            accessory_image: Some(session.accessory_image),
            scenario: session.scenario,
            style: session.style,
            generated_images: session.generated_images.to_vec(),
            state: GenerationState::Idle,
            error: None,
        };
        Ok(())
    }

    /// Deletes a stored session.
    pub async fn delete_session(&mut self, id: &str) -> Result<(), PhotoShootError> {
        let result = self.history.remove(id).await;
        self.record_persistence(result)
    }

    /// Deletes every stored session.
    pub async fn clear_history(&mut self) -> Result<(), PhotoShootError> {
        let result = self.history.clear().await;
        self.record_persistence(result)
    }

    fn record_persistence(
        &mut self,
        result: Result<(), crate::history::PersistenceError>,
    ) -> Result<(), PhotoShootError> {
        result.map_err(|err| {
            let err = PhotoShootError::from(err);
            self.working.error = Some(ActiveError::from(&err));
            err
        })
    }

    fn fail(&mut self, err: PhotoShootError) -> PhotoShootError {
        warn!("Photo shoot failed: {}", err);
        self.working.state = GenerationState::Failed;
        self.working.error = Some(ActiveError::from(&err));
        err
    }

    fn shrink(&self, image: &ImagePayload) -> Result<ImagePayload, ResizeError> {
        resize(Some(image), &ResizeOptions::default())?
            .ok_or_else(|| ResizeError::RenderSurface("no output image".to_string()))
    }

    fn build_session(
        &self,
        request: &GenerationRequest,
        images: &[ImagePayload; 3],
    ) -> Result<PhotoShootSession, ResizeError> {
        let person = self.shrink(&request.person_image)?;
        let accessory = self.shrink(&request.accessory_image)?;
        let [portrait, product, lifestyle] = images;

        Ok(PhotoShootSession {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            person_image: person.clone(),
            accessory_image: accessory.clone(),
            scenario: request.scenario.clone(),
            style: request.style.clone(),
            generated_images: [
                GeneratedImage {
                    title: PORTRAIT_TITLE.to_string(),
                    src: Some(self.shrink(portrait)?),
                    original: Some(person.clone()),
                },
                GeneratedImage {
                    title: PRODUCT_TITLE.to_string(),
                    src: Some(self.shrink(product)?),
                    original: Some(accessory),
                },
                GeneratedImage {
                    title: LIFESTYLE_TITLE.to_string(),
                    src: Some(self.shrink(lifestyle)?),
                    original: Some(person),
                },
            ],
        })
    }
}
