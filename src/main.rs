//! COVID-19 case statistics dashboard backend
//!
//! Serves JSON APIs over a relational table of daily case counts per region:
//! - dense day-by-day totals sequences with daily deltas for the line chart
//! - location and date listings for the filter dropdowns
//! - per-date case rows and GeoJSON for the map
//! - aggregated news headlines
//!
//! All data fetches go through a short-lived query cache.

mod cache;
mod config;
mod db;
mod error;
mod news;
mod series;
mod web;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// RUST_LOG directives win when set; otherwise the configured level applies.
fn log_filter(env_directives: Option<String>, config_level: &str) -> EnvFilter {
    match env_directives {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(config_level),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    // Load configuration first so logging can honor the configured level
    let config = config::Config::load()?;

    // Initialize logging based on LOG_FORMAT env var
    // Use LOG_FORMAT=gcp for structured Cloud Logging on App Engine
    let filter = log_filter(std::env::var("RUST_LOG").ok(), &config.logging.level);
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting corona dashboard...");
    info!("Configuration loaded");

    // Initialize database
    let db = db::Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");

    // Start web server (blocking)
    web::start_server(config, db).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_directives_override_the_configured_level() {
        assert_eq!(log_filter(Some("debug".into()), "warn").to_string(), "debug");
        assert_eq!(log_filter(None, "warn").to_string(), "warn");
    }
}
