//! JSON API handlers, wired through the query cache
//!
//! Cache keys are canonical serializations of the endpoint name and its
//! request parameters, so identical requests within the TTL share one fetch.
//! Producers capture cheap clones (the pool handle, owned params) so the
//! computed value can outlive the request that triggered it.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::{geojson, AppState};
use crate::cache::cache_key;
use crate::db::{Datapoint, LocationFilter, LIVE_DATE};
use crate::error::{Error, Result};
use crate::news::{Article, NewsClient};
use crate::series::{self, CaseSeries};

fn default_date() -> String {
    LIVE_DATE.to_string()
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CasesQuery {
    #[serde(default)]
    pub admin0: String,
    #[serde(default)]
    pub admin1: String,
    #[serde(default)]
    pub admin2: String,
    #[serde(default = "default_date")]
    pub date: String,
}

impl CasesQuery {
    fn filter(&self) -> LocationFilter {
        LocationFilter {
            admin0: self.admin0.clone(),
            admin1: self.admin1.clone(),
            admin2: self.admin2.clone(),
        }
    }
}

/// API: Totals for one location and date
pub async fn cases_totals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CasesQuery>,
) -> Result<Json<Vec<Datapoint>>> {
    let key = cache_key(
        "totals",
        &[&query.admin0, &query.admin1, &query.admin2, &query.date],
    );
    let db = state.db.clone();
    let filter = query.filter();
    let date = query.date.clone();
    let rows = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            db.totals(&filter, &date).await
        })
        .await?;
    Ok(Json((*rows).clone()))
}

/// API: Dense day-by-day series with daily deltas, for the chart renderer.
/// The most recent day on record is provisional and left out.
pub async fn cases_totals_sequence(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CasesQuery>,
) -> Result<Json<CaseSeries>> {
    let key = cache_key(
        "totals_sequence",
        &[&query.admin0, &query.admin1, &query.admin2],
    );
    let db = state.db.clone();
    let filter = query.filter();
    let series = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            let records = db.totals_sequence(&filter).await?;
            series::reconstruct(&records, true)
        })
        .await?;
    Ok(Json((*series).clone()))
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    #[serde(default = "default_date")]
    pub date: String,
}

/// API: Located rows for a date, for the map
pub async fn cases_by_date(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Datapoint>>> {
    let key = cache_key("cases_date", &[&query.date]);
    let db = state.db.clone();
    let date = query.date;
    let rows = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            db.cases_by_date(&date).await
        })
        .await?;
    Ok(Json((*rows).clone()))
}

/// API: First day of infection per location
pub async fn cases_first_days(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Datapoint>>> {
    let key = cache_key("first_days", &[]);
    let db = state.db.clone();
    let rows = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            db.first_days().await
        })
        .await?;
    Ok(Json((*rows).clone()))
}

/// The listing flags arrive as free-form query text; only the literal `1`
/// turns them on, anything else (including garbage) means off.
fn flag_is_set(value: &str) -> bool {
    value == "1"
}

#[derive(Debug, Deserialize)]
pub struct CountriesQuery {
    #[serde(default = "default_date")]
    pub date: String,
    #[serde(default)]
    pub need_admin1: String,
}

/// API: Countries with data on a date
pub async fn list_countries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CountriesQuery>,
) -> Result<Json<Vec<String>>> {
    let need_admin1 = flag_is_set(&query.need_admin1);
    let key = cache_key(
        "countries",
        &[&query.date, if need_admin1 { "1" } else { "0" }],
    );
    let db = state.db.clone();
    let date = query.date;
    let rows = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            db.list_countries(&date, need_admin1).await
        })
        .await?;
    Ok(Json((*rows).clone()))
}

#[derive(Debug, Deserialize)]
pub struct ProvincesQuery {
    pub admin0: Option<String>,
    #[serde(default)]
    pub need_admin2: String,
}

/// API: Provinces for a country; empty without an admin0
pub async fn list_provinces(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProvincesQuery>,
) -> Result<Json<Vec<String>>> {
    let admin0 = match query.admin0 {
        Some(admin0) => admin0,
        None => return Ok(Json(Vec::new())),
    };
    let need_admin2 = flag_is_set(&query.need_admin2);
    let key = cache_key("provinces", &[&admin0, if need_admin2 { "1" } else { "0" }]);
    let db = state.db.clone();
    let rows = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            db.list_provinces(&admin0, need_admin2).await
        })
        .await?;
    Ok(Json((*rows).clone()))
}

#[derive(Debug, Deserialize)]
pub struct Admin2Query {
    pub admin0: Option<String>,
    pub admin1: Option<String>,
}

/// API: Counties for a country and province; empty without both
pub async fn list_admin2(
    State(state): State<Arc<AppState>>,
    Query(query): Query<Admin2Query>,
) -> Result<Json<Vec<String>>> {
    let (admin0, admin1) = match (query.admin0, query.admin1) {
        (Some(admin0), Some(admin1)) => (admin0, admin1),
        _ => return Ok(Json(Vec::new())),
    };
    let key = cache_key("admin2", &[&admin0, &admin1]);
    let db = state.db.clone();
    let rows = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            db.list_admin2(&admin0, &admin1).await
        })
        .await?;
    Ok(Json((*rows).clone()))
}

/// API: All dates on record, most recent first
pub async fn list_dates(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    let key = cache_key("dates", &[]);
    let db = state.db.clone();
    let rows = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            db.list_dates().await
        })
        .await?;
    Ok(Json((*rows).clone()))
}

#[derive(Debug, Deserialize)]
pub struct GeojsonQuery {
    pub date: Option<String>,
}

/// API: GeoJSON FeatureCollection for the map (15-minute cache)
pub async fn geojson_cases(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GeojsonQuery>,
) -> Result<Json<Value>> {
    let date = query
        .date
        .unwrap_or_else(|| Utc::now().date_naive().to_string());
    let key = cache_key("geojson", &[&date]);
    let db = state.db.clone();
    let value = state
        .cache
        .get_or_compute(&key, state.config.cache.geojson_ttl(), || async move {
            let rows = db.geojson_datapoints(&date).await?;
            Ok::<_, Error>(geojson::feature_collection(&rows))
        })
        .await?;
    Ok(Json((*value).clone()))
}

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    #[serde(default = "default_category")]
    pub category: String,
}

/// API: Top coronavirus headlines (1-hour cache). A failed fetch answers
/// with an empty list and leaves the cache untouched, so the next request
/// retries the News API.
pub async fn news_headlines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NewsQuery>,
) -> Json<Vec<Article>> {
    let category = NewsClient::normalize_category(&query.category).to_string();
    let key = cache_key("news", &[&category]);
    let news = state.news.clone();
    let result = state
        .cache
        .get_or_compute(&key, state.config.cache.news_ttl(), || async move {
            news.top_headlines(&category).await
        })
        .await;

    match result {
        Ok(articles) => Json(articles.iter().take(10).cloned().collect()),
        Err(e) => {
            tracing::warn!("news fetch failed: {}", e);
            Json(Vec::new())
        }
    }
}

/// Warm the world-level sequence cache (called on startup)
pub async fn warm_cache(state: &Arc<AppState>) {
    tracing::info!("Warming totals sequence cache...");

    let key = cache_key("totals_sequence", &["", "", ""]);
    let db = state.db.clone();
    let result = state
        .cache
        .get_or_compute(&key, state.config.cache.data_ttl(), || async move {
            let records = db.totals_sequence(&LocationFilter::default()).await?;
            series::reconstruct(&records, true)
        })
        .await;

    match result {
        Ok(_) => tracing::info!("Cache warmed"),
        // An empty table on first boot is expected
        Err(e) => tracing::warn!("Cache warm skipped: {}", e),
    }
}
