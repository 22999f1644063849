//! Error types shared across the dashboard

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The reconstructor was handed zero records
    #[error("no records to reconstruct")]
    EmptyInput,

    #[error("data store error: {0}")]
    DataStore(#[from] sqlx::Error),

    #[error("news fetch failed: {0}")]
    News(#[from] reqwest::Error),

    #[error("unparseable entry_date '{0}' in data store")]
    BadDate(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            // An empty series is an expected outcome for locations with no
            // history yet; surfaced as an empty body, not a server error.
            Error::EmptyInput => Json(serde_json::json!({})).into_response(),
            Error::DataStore(e) => {
                tracing::error!("data store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response()
            }
            Error::BadDate(date) => {
                tracing::error!("bad entry_date in data store: {}", date);
                (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response()
            }
            Error::News(e) => {
                tracing::warn!("news fetch failed: {}", e);
                (StatusCode::BAD_GATEWAY, "news unavailable").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_input_surfaces_as_empty_json_not_5xx() {
        let response = Error::EmptyInput.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn data_store_failures_are_server_errors() {
        let response = Error::DataStore(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn bad_dates_are_server_errors() {
        let response = Error::BadDate("not-a-date".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
