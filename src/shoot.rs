//! The photo shoot pipeline: describe both inputs once, then run three edits
//! that share those descriptions.

use tracing::{info, instrument};

use crate::gemini::{ContentPart, Descriptions, GenerativeModel, RemoteError};
use crate::payload::ImagePayload;

const PROMPT_SUFFIX: &str = "Photorealistic, shot on DSLR, 8k, hyper-detailed, vertical format. Ensure the final image is a photograph and not an illustration.";

/// Visual styles on offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Style {
    /// High-end editorial look. Also the fallback.
    #[default]
    Editorial,
    /// Dramatic, graded, film-like.
    Cinematic,
    /// Vintage film stock.
    Retro,
    /// Clean and sparse.
    Minimalist,
}

impl Style {
    /// All styles, in picker order.
    pub const ALL: [Style; 4] = [
        Style::Editorial,
        Style::Cinematic,
        Style::Retro,
        Style::Minimalist,
    ];

    /// Name as shown in the picker and stored in history.
    pub fn name(self) -> &'static str {
        match self {
            Style::Editorial => "Editorial",
            Style::Cinematic => "Cinematográfico",
            Style::Retro => "Retro",
            Style::Minimalist => "Minimalista",
        }
    }

    /// Exact lookup by picker name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.name() == name)
    }

    /// Lookup that falls back to [Style::Editorial] for unknown names.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }

    /// Phrase appended to every prompt.
    pub fn prompt_phrase(self) -> &'static str {
        match self {
            Style::Editorial => {
                "High-end editorial photography style, professional photograph, high resolution, sharp focus, natural colors, realistic depth of field."
            }
            Style::Cinematic => {
                "Cinematic style, dramatic lighting, high contrast, film grain, anamorphic lens look, moody atmosphere, professional color grading."
            }
            Style::Retro => {
                "Vintage film photography style, retro color palette (e.g., Kodachrome, Polaroid), soft focus, authentic film grain, nostalgic feel."
            }
            Style::Minimalist => {
                "Minimalist style, clean composition, simple background, negative space, focused on the subject, neutral color palette."
            }
        }
    }
}

/// The three shots, in result order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shot {
    /// Studio portrait, edited from the person image.
    Portrait,
    /// Catalog photo, edited from the accessory image.
    Product,
    /// The user's scenario, edited from the person image.
    Lifestyle,
}

impl Shot {
    /// Shots in the order they are generated and returned.
    pub const ALL: [Shot; 3] = [Shot::Portrait, Shot::Product, Shot::Lifestyle];

    /// Short name for messages and logs.
    pub fn label(self) -> &'static str {
        match self {
            Shot::Portrait => "studio portrait",
            Shot::Product => "product photo",
            Shot::Lifestyle => "lifestyle scene",
        }
    }

    /// Progress checkpoint emitted right before this shot's edit.
    pub fn progress(self) -> Progress {
        match self {
            Shot::Portrait => Progress::CreatingStudioPortrait,
            Shot::Product => Progress::CreatingProductPhoto,
            Shot::Lifestyle => Progress::CreatingLifestyleScene,
        }
    }
}

/// Pipeline checkpoints, reported in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Describe call in flight.
    AnalyzingImages,
    /// Portrait edit in flight.
    CreatingStudioPortrait,
    /// Product edit in flight.
    CreatingProductPhoto,
    /// Lifestyle edit in flight.
    CreatingLifestyleScene,
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Progress::AnalyzingImages => "Analyzing images...",
            Progress::CreatingStudioPortrait => "Creating studio portrait...",
            Progress::CreatingProductPhoto => "Creating product photo...",
            Progress::CreatingLifestyleScene => "Creating lifestyle scene...",
        };
        f.write_str(message)
    }
}

/// The three edit prompts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShotPrompts {
    /// Studio portrait prompt.
    pub portrait: String,
    /// Product photo prompt.
    pub product: String,
    /// Lifestyle scene prompt.
    pub lifestyle: String,
}

impl ShotPrompts {
    /// Builds the prompts from the describe output, scenario and style.
    pub fn build(descriptions: &Descriptions, scenario: &str, style: Style) -> Self {
        let Descriptions { person, accessory } = descriptions;
        let style = style.prompt_phrase();
        Self {
            portrait: format!(
                "Using the provided image of a person ({person}), edit it to be a professional full-body studio photograph. The person should be wearing or using the described accessory ({accessory}). Replace the existing background with a seamless, neutral light-gray studio backdrop. Adjust the lighting to be soft and professional, typical of a high-end photoshoot. Maintain the person's pose and appearance exactly. Style: {style}. {PROMPT_SUFFIX}"
            ),
            product: format!(
                "Take this image of an accessory ({accessory}) and turn it into a high-resolution catalog-style product photo. Isolate the accessory by replacing the background with a pure white one. Add a soft, subtle shadow underneath the object for realism. Ensure the focus is tack-sharp on the product, highlighting its details and texture. Style: {style}. {PROMPT_SUFFIX}"
            ),
            lifestyle: format!(
                "Edit this photograph of a person ({person}). Place them in the following scene: {scenario}. The person should now be wearing or using the described accessory ({accessory}). The final image should be a professional lifestyle photograph. The lighting must be natural and ambient, matching the new environment, and all shadows should be coherent and realistic. The composition should capture a candid moment. Style: {style}. {PROMPT_SUFFIX}"
            ),
        }
    }

    /// Prompt for one shot.
    pub fn for_shot(&self, shot: Shot) -> &str {
        match shot {
            Shot::Portrait => &self.portrait,
            Shot::Product => &self.product,
            Shot::Lifestyle => &self.lifestyle,
        }
    }
}

/// What went wrong inside the pipeline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GenerationFailure {
    /// The describe call failed.
    Describe(RemoteError),
    /// An edit call failed.
    Edit(Shot, RemoteError),
    /// An edit call answered without an image.
    NoImage(Shot),
}

/// A failed pipeline run. Displays as
/// `Failed during image generation process: <cause>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenerationError {
    /// Underlying failure.
    pub failure: GenerationFailure,
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed during image generation process: ")?;
        match &self.failure {
            GenerationFailure::Describe(err) => write!(f, "{err}"),
            GenerationFailure::Edit(shot, err) => write!(f, "{} failed: {err}", shot.label()),
            GenerationFailure::NoImage(shot) => {
                write!(f, "Image editing failed to produce an image ({}).", shot.label())
            }
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<GenerationFailure> for GenerationError {
    fn from(failure: GenerationFailure) -> Self {
        Self { failure }
    }
}

/// Runs the describe-then-edit pipeline against a [GenerativeModel].
#[derive(Clone, Debug)]
pub struct PhotoShootClient<M> {
    model: M,
}

impl<M: GenerativeModel> PhotoShootClient<M> {
    /// Wraps a model.
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Generates `[portrait, product, lifestyle]`.
    ///
    /// Calls run one at a time; `on_progress` fires before each of them. The
    /// first failure stops the run.
    #[instrument(skip_all, fields(style = %style))]
    pub async fn generate_photo_shoot<F>(
        &self,
        person: &ImagePayload,
        accessory: &ImagePayload,
        scenario: &str,
        style: &str,
        mut on_progress: F,
    ) -> Result<[ImagePayload; 3], GenerationError>
    where
        F: FnMut(Progress) + Send,
    {
        on_progress(Progress::AnalyzingImages);
        let descriptions = self
            .model
            .describe(person, accessory)
            .await
            .map_err(GenerationFailure::Describe)?;

        let prompts = ShotPrompts::build(&descriptions, scenario, Style::resolve(style));

        let portrait = self
            .run_shot(Shot::Portrait, person, &prompts, &mut on_progress)
            .await?;
        let product = self
            .run_shot(Shot::Product, accessory, &prompts, &mut on_progress)
            .await?;
        let lifestyle = self
            .run_shot(Shot::Lifestyle, person, &prompts, &mut on_progress)
            .await?;

        info!("photo shoot generated");
        Ok([portrait, product, lifestyle])
    }

    async fn run_shot<F>(
        &self,
        shot: Shot,
        base: &ImagePayload,
        prompts: &ShotPrompts,
        on_progress: &mut F,
    ) -> Result<ImagePayload, GenerationError>
    where
        F: FnMut(Progress) + Send,
    {
        on_progress(shot.progress());
        let parts = self
            .model
            .edit(base, prompts.for_shot(shot))
            .await
            .map_err(|err| GenerationFailure::Edit(shot, err))?;

        parts
            .into_iter()
            .find_map(|part| match part {
                ContentPart::Image(image) => Some(image),
                ContentPart::Text(_) => None,
            })
            .ok_or_else(|| GenerationFailure::NoImage(shot).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, ScriptedModel, sample_png};

    fn descriptions() -> Descriptions {
        Descriptions {
            person: "PERSON-DESC".to_string(),
            accessory: "ACCESSORY-DESC".to_string(),
        }
    }

    #[test]
    fn unknown_styles_fall_back_to_editorial() {
        assert_eq!(Style::resolve("Vaporwave"), Style::Editorial);
        assert_eq!(Style::resolve(""), Style::Editorial);
        assert_eq!(Style::resolve("Cinematográfico"), Style::Cinematic);
        assert_eq!(Style::resolve("Minimalista"), Style::Minimalist);

        let fallback = ShotPrompts::build(&descriptions(), "a beach", Style::resolve("Vaporwave"));
        let editorial = Style::Editorial.prompt_phrase();
        assert!(fallback.portrait.contains(editorial));
        assert!(fallback.product.contains(editorial));
        assert!(fallback.lifestyle.contains(editorial));
    }

    #[test]
    fn prompts_carry_descriptions_and_scenario() {
        let prompts = ShotPrompts::build(&descriptions(), "a night street in Tokyo", Style::Retro);
        for shot in Shot::ALL {
            let prompt = prompts.for_shot(shot);
            assert!(prompt.contains("ACCESSORY-DESC"));
            assert!(prompt.contains(Style::Retro.prompt_phrase()));
            assert!(prompt.ends_with(PROMPT_SUFFIX));
        }
        assert!(prompts.portrait.contains("PERSON-DESC"));
        assert!(prompts.portrait.contains("light-gray studio backdrop"));
        assert!(prompts.product.contains("pure white"));
        assert!(!prompts.product.contains("PERSON-DESC"));
        assert!(prompts.lifestyle.contains("a night street in Tokyo"));
        assert!(prompts.lifestyle.contains("natural and ambient"));
    }

    #[tokio::test]
    async fn runs_in_order_and_returns_three_images() {
        let person = sample_png(40, 60);
        let accessory = sample_png(30, 30);
        let model = ScriptedModel::succeeding();
        let log = model.log();
        let client = PhotoShootClient::new(model);

        let mut progress = Vec::new();
        let images = client
            .generate_photo_shoot(&person, &accessory, "a park", "Retro", |step| {
                progress.push(step);
                log.lock().unwrap().push(Call::Progress(step));
            })
            .await
            .expect("generate");

        assert_eq!(
            progress,
            vec![
                Progress::AnalyzingImages,
                Progress::CreatingStudioPortrait,
                Progress::CreatingProductPhoto,
                Progress::CreatingLifestyleScene,
            ]
        );
        let calls = client.model().calls();
        assert_eq!(
            calls,
            vec![
                Call::Progress(Progress::AnalyzingImages),
                Call::Describe,
                Call::Progress(Progress::CreatingStudioPortrait),
                Call::Edit(person.clone()),
                Call::Progress(Progress::CreatingProductPhoto),
                Call::Edit(accessory.clone()),
                Call::Progress(Progress::CreatingLifestyleScene),
                Call::Edit(person.clone()),
            ]
        );
        assert_eq!(images, client.model().outputs());
    }

    #[tokio::test]
    async fn describe_failure_skips_every_edit() {
        let client = PhotoShootClient::new(ScriptedModel::failing_describe());
        let err = client
            .generate_photo_shoot(&sample_png(8, 8), &sample_png(8, 8), "x", "Editorial", |_| {})
            .await
            .expect_err("describe fails");
        assert!(matches!(err.failure, GenerationFailure::Describe(_)));
        assert!(
            err.to_string()
                .starts_with("Failed during image generation process: ")
        );
        assert_eq!(client.model().calls(), vec![Call::Describe]);
    }

    #[tokio::test]
    async fn edit_without_image_stops_the_pipeline() {
        let client = PhotoShootClient::new(ScriptedModel::text_only_edit(Shot::Product));
        let err = client
            .generate_photo_shoot(&sample_png(8, 8), &sample_png(9, 9), "x", "Editorial", |_| {})
            .await
            .expect_err("no image");
        assert_eq!(err.failure, GenerationFailure::NoImage(Shot::Product));
        let edits = client
            .model()
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Edit(_)))
            .count();
        assert_eq!(edits, 2, "lifestyle edit must never run");
    }

    #[tokio::test]
    async fn first_image_part_wins() {
        let model = ScriptedModel::succeeding().with_leading_text();
        let client = PhotoShootClient::new(model);
        let images = client
            .generate_photo_shoot(&sample_png(8, 8), &sample_png(8, 8), "x", "Retro", |_| {})
            .await
            .expect("generate");
        assert_eq!(images, client.model().outputs());
    }
}
