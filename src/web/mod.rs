//! Web server module

mod geojson;
mod routes;

use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;

use crate::cache::QueryCache;
use crate::config::Config;
use crate::db::Database;
use crate::news::NewsClient;

pub struct AppState {
    pub db: Database,
    pub cache: QueryCache,
    pub news: NewsClient,
    pub config: Config,
}

pub async fn start_server(config: Config, db: Database) -> Result<()> {
    let news = NewsClient::new(&config.news);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let static_dir = config.server.static_dir.clone();

    let state = Arc::new(AppState {
        db,
        cache: QueryCache::new(),
        news,
        config,
    });

    // Warm the world-level sequence so the first chart load is a cache hit
    routes::warm_cache(&state).await;

    let app = Router::new()
        // Case data APIs
        .route("/cases/totals", get(routes::cases_totals))
        .route("/cases/totals_sequence", get(routes::cases_totals_sequence))
        .route("/cases/date", get(routes::cases_by_date))
        .route("/cases/first_days", get(routes::cases_first_days))
        // Filter dropdown listings
        .route("/list/countries", get(routes::list_countries))
        .route("/list/provinces", get(routes::list_provinces))
        .route("/list/admin2", get(routes::list_admin2))
        .route("/list/dates", get(routes::list_dates))
        // Map and news
        .route("/geojson", get(routes::geojson_cases))
        .route("/news", get(routes::news_headlines))
        // Chart and map assets
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
