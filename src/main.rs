use clap::Parser;
use photoshoot::config::setup_logging;
use photoshoot::controller::Controller;
use photoshoot::db::DbStore;
use photoshoot::history::HistoryStore;
use photoshoot::shoot::PhotoShootClient;
use tracing::{error, info};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = photoshoot::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let db = match photoshoot::db::connect_db(&cli.storage.database_path).await {
        Ok(db) => db,
        Err(err) => {
            error!("Database connection error: {}", err);
            return;
        }
    };

    let store = match DbStore::new(db, cli.storage.quota()).await {
        Ok(store) => store,
        Err(err) => {
            error!("Database migration error: {}", err);
            return;
        }
    };

    let history = HistoryStore::load(store).await;
    info!("Loaded {} session(s) from history", history.len());

    let client = PhotoShootClient::new(cli.gemini.client());
    let controller = Controller::new(client, history);

    if let Err(err) =
        photoshoot::web::setup_server(&cli.listen_address, cli.port, controller).await
    {
        error!("Application error: {}", err);
    }
}
