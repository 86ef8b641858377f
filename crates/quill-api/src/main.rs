mod auth;
mod config;
mod error;
mod media;
mod rate_limit;
mod routes;

use std::sync::Arc;

use config::AppConfig;
use media::MediaStore;
use quill_core::search::SearchAggregator;
use quill_core::services::BlogService;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("quill_api=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting quill-api with config: {:?}", config);

    let media = MediaStore::from_config(&config);
    if !media.uploads_enabled() {
        tracing::warn!("R2 is not configured; image uploads will be refused");
    }
    let blog = BlogService::open_path(&config.db_path, config.database_sync.clone(), media)
        .await?
        .with_search(SearchAggregator::new(config.search_truncation));

    let state = AppState::new(config.clone(), blog);
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("quill-api listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
