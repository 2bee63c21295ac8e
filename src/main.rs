use std::sync::Arc;

use tower_http::cors::CorsLayer;

use penguin_bot::api::{self, AppState};
use penguin_bot::bot::{Bot, BotSettings};
use penguin_bot::chat::BroadcastSink;
use penguin_bot::config::Config;
use penguin_bot::creature::CreatureRegistry;
use penguin_bot::metrics;
use penguin_bot::scheduler::SpawnScheduler;
use penguin_bot::scores::ScoreStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    metrics::register_metrics();

    let registry = match CreatureRegistry::load_dir(&config.creatures_dir) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to load creatures: {e}");
            std::process::exit(1);
        }
    };
    if registry.is_empty() {
        tracing::warn!(
            "No creatures found in {}, spawns will do nothing",
            config.creatures_dir.display()
        );
    }

    let scores = match ScoreStore::load(&config.userdata_file) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to load scores: {e}");
            std::process::exit(1);
        }
    };

    let sink = Arc::new(BroadcastSink::new());
    let scheduler = SpawnScheduler::with_random_interval(
        config.spawn_interval_secs.clone(),
        &mut rand::thread_rng(),
    );
    let bot = Arc::new(Bot::new(
        Arc::new(registry),
        scores,
        sink.clone(),
        scheduler,
        BotSettings::from_config(&config),
    ));

    let state = AppState {
        bot,
        sink,
        bot_token: Arc::from(config.bot_token.as_str()),
    };
    let app = api::router(state).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Penguin bot listening on {addr}");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
