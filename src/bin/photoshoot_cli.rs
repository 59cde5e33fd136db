use anyhow::{Context, Result, anyhow};
use clap::Parser;
use photoshoot::cli::{GeminiOptions, StorageOptions};
use photoshoot::config::setup_logging;
use photoshoot::constants::DEFAULT_STYLE;
use photoshoot::controller::Controller;
use photoshoot::db::{DbStore, connect_db};
use photoshoot::error::PhotoShootError;
use photoshoot::history::HistoryStore;
use photoshoot::payload::ImagePayload;
use photoshoot::shoot::{PhotoShootClient, Style};
use std::fs;
use std::path::{Path, PathBuf};

/// Run one photo shoot from the command line.
///
/// Minimal UX:
///   photoshoot_cli me.jpg handbag.png "a rainy street in Paris at night"
#[derive(Parser, Debug)]
#[command(name = "photoshoot_cli")]
#[command(
    about = "Generate a studio portrait, a product photo and a lifestyle scene from two photos"
)]
struct Args {
    /// Photo of the person (PNG, JPEG or WebP)
    person: PathBuf,

    /// Photo of the accessory (PNG, JPEG or WebP)
    accessory: PathBuf,

    /// Scene for the lifestyle shot
    scenario: String,

    /// Visual style: Editorial, Cinematográfico, Retro or Minimalista
    #[arg(long, default_value = DEFAULT_STYLE)]
    style: String,

    /// Output directory for the three images
    #[arg(long, default_value = "./photoshoot-output", env = "PHOTOSHOOT_OUT_DIR")]
    out_dir: PathBuf,

    /// Enable debug logging
    #[arg(long, env = "PHOTOSHOOT_DEBUG")]
    debug: bool,

    #[command(flatten)]
    storage: StorageOptions,

    #[command(flatten)]
    gemini: GeminiOptions,
}

fn read_image(path: &Path) -> Result<ImagePayload> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    ImagePayload::sniff(&bytes).with_context(|| format!("Unusable image {}", path.display()))
}

fn output_path(out_dir: &Path, title: &str, image: &ImagePayload) -> PathBuf {
    let slug = title.to_ascii_lowercase().replace(' ', "-");
    out_dir.join(format!("{slug}.{}", image.file_extension()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug).map_err(|err| anyhow!("Failed to set up logging: {err}"))?;

    if Style::from_name(&args.style).is_none() {
        eprintln!("Unknown style {:?}, using {}", args.style, DEFAULT_STYLE);
    }

    let person = read_image(&args.person)?;
    let accessory = read_image(&args.accessory)?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let db = connect_db(&args.storage.database_path)
        .await
        .with_context(|| format!("Failed to open {}", args.storage.database_path))?;
    let store = DbStore::new(db, args.storage.quota())
        .await
        .context("Failed to migrate the database")?;
    let history = HistoryStore::load(store).await;

    let mut controller = Controller::new(PhotoShootClient::new(args.gemini.client()), history);
    controller.set_person_image(Some(person));
    controller.set_accessory_image(Some(accessory));
    controller.set_scenario(&args.scenario);
    controller.set_style(&args.style);

    let mut progress = controller.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            if let Some(step) = *progress.borrow_and_update() {
                eprintln!("{step}");
            }
        }
    });

    let saved = match controller.generate().await {
        Ok(()) => true,
        // the photos are fine, only history missed out
        Err(PhotoShootError::Persistence(err)) => {
            eprintln!("Warning: {err}");
            false
        }
        Err(PhotoShootError::Resize(err)) => {
            eprintln!("Warning: not saved to history: {err}");
            false
        }
        Err(err) => return Err(anyhow!(err)),
    };

    for card in &controller.working().generated_images {
        let Some(image) = card.src.as_ref() else {
            return Err(anyhow!("{} was not generated", card.title));
        };
        let path = output_path(&args.out_dir, &card.title, image);
        let bytes = image
            .decode()
            .with_context(|| format!("Failed to decode {}", card.title))?;
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Saved: {}", path.display());
    }

    if let Some(session) = controller.history().first().filter(|_| saved) {
        eprintln!("Session {} recorded in {}", session.id, args.storage.database_path);
    }

    drop(controller);
    reporter.await.context("Progress reporter failed")?;
    Ok(())
}
