//! Database module
//!
//! Thin data-access layer over sqlite. Rows are already filtered and ordered
//! here; the series reconstruction consumes them as-is.

mod schema;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::series::DailyRecord;

/// The `entry_date` value of the rolling most-recent row for each location.
/// Date-sequence queries exclude it; point-in-time queries default to it.
pub const LIVE_DATE: &str = "live";

/// One aggregate row per (location, date). Empty admin strings mean the row
/// aggregates everything below that level; the world row has all three empty.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Datapoint {
    pub admin0: String,
    pub admin1: String,
    pub admin2: String,
    pub entry_date: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub total: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub active: i64,
    pub is_first_day: bool,
}

/// Location selector for totals queries. An empty field selects the
/// aggregate row at that level; the special value `all` drops the predicate
/// entirely.
#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    pub admin0: String,
    pub admin1: String,
    pub admin2: String,
}

impl LocationFilter {
    fn apply(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if self.admin0 != "all" {
            builder.push(" AND admin0 = ").push_bind(self.admin0.clone());
        }
        if self.admin1 != "all" {
            builder.push(" AND admin1 = ").push_bind(self.admin1.clone());
        }
        if self.admin2 != "all" {
            builder.push(" AND admin2 = ").push_bind(self.admin2.clone());
        }
    }
}

const DATAPOINT_COLUMNS: &str = "admin0, admin1, admin2, entry_date, latitude, longitude, \
                                 total, deaths, recovered, active, is_first_day";

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.url)).await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        // Enable WAL mode for better concurrency
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;

        sqlx::query(schema::CREATE_DATAPOINTS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_ENTRY_DATE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_FIRST_DAY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Writes come from the separate collection pipeline in production; this
    /// is the seam tests use to stage rows.
    #[cfg(test)]
    pub async fn insert_datapoint(&self, dp: &Datapoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO datapoints
                (admin0, admin1, admin2, entry_date, latitude, longitude,
                 total, deaths, recovered, active, is_first_day)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&dp.admin0)
        .bind(&dp.admin1)
        .bind(&dp.admin2)
        .bind(&dp.entry_date)
        .bind(dp.latitude)
        .bind(dp.longitude)
        .bind(dp.total)
        .bind(dp.deaths)
        .bind(dp.recovered)
        .bind(dp.active)
        .bind(dp.is_first_day)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rows for one location on one date (default: the live row)
    pub async fn totals(&self, filter: &LocationFilter, date: &str) -> Result<Vec<Datapoint>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {DATAPOINT_COLUMNS} FROM datapoints WHERE 1=1"
        ));
        filter.apply(&mut builder);
        builder.push(" AND entry_date = ").push_bind(date.to_string());

        let rows = builder
            .build_query_as::<Datapoint>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// The full dated history for one location, ordered ascending, with the
    /// live sentinel row excluded. Output feeds the series reconstruction.
    pub async fn totals_sequence(&self, filter: &LocationFilter) -> Result<Vec<DailyRecord>> {
        let mut builder = QueryBuilder::new(
            "SELECT entry_date, total, deaths, recovered, active FROM datapoints WHERE 1=1",
        );
        filter.apply(&mut builder);
        builder.push(" AND entry_date != ").push_bind(LIVE_DATE);
        builder.push(" ORDER BY entry_date");

        let rows: Vec<(String, i64, i64, i64, i64)> =
            builder.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(entry_date, total, deaths, recovered, active)| {
                Ok(DailyRecord {
                    entry_date: parse_entry_date(&entry_date)?,
                    total,
                    deaths,
                    recovered,
                    active,
                })
            })
            .collect()
    }

    /// Distinct countries with data on a date, alphabetical
    pub async fn list_countries(&self, date: &str, need_admin1: bool) -> Result<Vec<String>> {
        let mut query =
            String::from("SELECT DISTINCT admin0 FROM datapoints WHERE admin0 != '' AND entry_date = ?");
        if need_admin1 {
            query.push_str(" AND admin1 != ''");
        }
        query.push_str(" ORDER BY admin0");

        let rows = sqlx::query_scalar(&query)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Distinct provinces for a country, alphabetical
    pub async fn list_provinces(&self, admin0: &str, need_admin2: bool) -> Result<Vec<String>> {
        let mut query =
            String::from("SELECT DISTINCT admin1 FROM datapoints WHERE admin0 = ? AND admin1 != ''");
        if need_admin2 {
            query.push_str(" AND admin2 != ''");
        }
        query.push_str(" ORDER BY admin1");

        let rows = sqlx::query_scalar(&query)
            .bind(admin0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Distinct counties for a country and province, alphabetical
    pub async fn list_admin2(&self, admin0: &str, admin1: &str) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar(
            "SELECT DISTINCT admin2 FROM datapoints WHERE admin0 = ? AND admin1 = ? AND admin2 != '' ORDER BY admin2",
        )
        .bind(admin0)
        .bind(admin1)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All dates on record, most recent first (the live sentinel sorts first)
    pub async fn list_dates(&self) -> Result<Vec<String>> {
        let rows =
            sqlx::query_scalar("SELECT DISTINCT entry_date FROM datapoints ORDER BY entry_date DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Located country/province rows for a date, for the map
    pub async fn cases_by_date(&self, date: &str) -> Result<Vec<Datapoint>> {
        let rows = sqlx::query_as(&format!(
            "SELECT {DATAPOINT_COLUMNS} FROM datapoints \
             WHERE entry_date = ? AND latitude != 0 AND longitude != 0 \
             AND admin2 = '' AND admin0 != ''"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// First-day-of-infection rows per location, ascending by date
    pub async fn first_days(&self) -> Result<Vec<Datapoint>> {
        let rows = sqlx::query_as(&format!(
            "SELECT {DATAPOINT_COLUMNS} FROM datapoints WHERE is_first_day = 1 ORDER BY entry_date"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Source rows for the GeoJSON layer: located country/province rows with
    /// a non-trivial case count
    pub async fn geojson_datapoints(&self, date: &str) -> Result<Vec<Datapoint>> {
        let rows = sqlx::query_as(&format!(
            "SELECT {DATAPOINT_COLUMNS} FROM datapoints \
             WHERE entry_date = ? AND latitude IS NOT NULL AND longitude IS NOT NULL \
             AND admin2 = '' AND admin0 != '' AND total > 10"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// Parse a stored entry date. Plain ISO dates become UTC midnight; values
/// carrying time-of-day noise keep it (the reconstructor normalizes back to
/// the calendar date).
fn parse_entry_date(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| Error::BadDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let db = Database { pool };
        db.run_migrations().await.unwrap();
        db
    }

    fn dp(admin0: &str, admin1: &str, admin2: &str, entry_date: &str, total: i64) -> Datapoint {
        Datapoint {
            admin0: admin0.to_string(),
            admin1: admin1.to_string(),
            admin2: admin2.to_string(),
            entry_date: entry_date.to_string(),
            latitude: None,
            longitude: None,
            total,
            deaths: 0,
            recovered: 0,
            active: total,
            is_first_day: false,
        }
    }

    #[tokio::test]
    async fn totals_selects_aggregate_row_by_default() {
        let db = test_db().await;
        db.insert_datapoint(&dp("", "", "", "live", 100)).await.unwrap();
        db.insert_datapoint(&dp("US", "", "", "live", 60)).await.unwrap();
        db.insert_datapoint(&dp("US", "", "", "2020-03-01", 40)).await.unwrap();

        let world = db.totals(&LocationFilter::default(), "live").await.unwrap();
        assert_eq!(world.len(), 1);
        assert_eq!(world[0].total, 100);
    }

    #[tokio::test]
    async fn totals_all_drops_the_filter() {
        let db = test_db().await;
        db.insert_datapoint(&dp("", "", "", "live", 100)).await.unwrap();
        db.insert_datapoint(&dp("US", "", "", "live", 60)).await.unwrap();
        db.insert_datapoint(&dp("IT", "", "", "live", 40)).await.unwrap();

        let filter = LocationFilter {
            admin0: "all".to_string(),
            ..Default::default()
        };
        let rows = db.totals(&filter, "live").await.unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn totals_sequence_orders_and_excludes_live() {
        let db = test_db().await;
        db.insert_datapoint(&dp("", "", "", "2020-03-03", 9)).await.unwrap();
        db.insert_datapoint(&dp("", "", "", "live", 99)).await.unwrap();
        db.insert_datapoint(&dp("", "", "", "2020-03-01", 5)).await.unwrap();

        let records = db.totals_sequence(&LocationFilter::default()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].total, 5);
        assert_eq!(records[1].total, 9);
        assert_eq!(
            records[0].entry_date.date_naive(),
            NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn listings_skip_empty_labels() {
        let db = test_db().await;
        db.insert_datapoint(&dp("", "", "", "live", 100)).await.unwrap();
        db.insert_datapoint(&dp("US", "", "", "live", 60)).await.unwrap();
        db.insert_datapoint(&dp("US", "Massachusetts", "", "live", 20)).await.unwrap();
        db.insert_datapoint(&dp("US", "Massachusetts", "Suffolk", "live", 5)).await.unwrap();
        db.insert_datapoint(&dp("IT", "", "", "live", 40)).await.unwrap();

        let countries = db.list_countries("live", false).await.unwrap();
        assert_eq!(countries, ["IT", "US"]);

        let with_admin1 = db.list_countries("live", true).await.unwrap();
        assert_eq!(with_admin1, ["US"]);

        let provinces = db.list_provinces("US", false).await.unwrap();
        assert_eq!(provinces, ["Massachusetts"]);

        let counties = db.list_admin2("US", "Massachusetts").await.unwrap();
        assert_eq!(counties, ["Suffolk"]);
    }

    #[tokio::test]
    async fn geojson_rows_require_location_and_threshold() {
        let db = test_db().await;
        let mut located = dp("US", "", "", "2020-03-01", 50);
        located.latitude = Some(38.9);
        located.longitude = Some(-77.0);
        db.insert_datapoint(&located).await.unwrap();

        let mut tiny = dp("IT", "", "", "2020-03-01", 3);
        tiny.latitude = Some(41.9);
        tiny.longitude = Some(12.5);
        db.insert_datapoint(&tiny).await.unwrap();

        // No coordinates
        db.insert_datapoint(&dp("FR", "", "", "2020-03-01", 80)).await.unwrap();

        let rows = db.geojson_datapoints("2020-03-01").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].admin0, "US");
    }

    #[test]
    fn entry_dates_parse_with_and_without_time() {
        let midnight = parse_entry_date("2020-03-01").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2020-03-01T00:00:00+00:00");

        let noisy = parse_entry_date("2020-03-01 17:30:00").unwrap();
        assert_eq!(noisy.date_naive(), midnight.date_naive());

        assert!(parse_entry_date("not-a-date").is_err());
    }
}
