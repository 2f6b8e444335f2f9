//! HTTP surface: a single GET route serving the merged feed.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::aggregate::{AggregateError, Aggregator};

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";
pub const CACHE_CONTROL: &str = "public, max-age=0, s-maxage=900, stale-while-revalidate=86400";

/// Errors that turn into the generic 500 response.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Details stay server-side
        tracing::error!(error = %self, "Unified feed error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Feed error",
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// `"0"` disables pretty printing; any other value, or none, enables it.
    pretty: Option<String>,
}

impl FeedQuery {
    fn pretty(&self) -> bool {
        self.pretty.as_deref() != Some("0")
    }
}

/// Builds the router serving the merged feed at `server.path`.
pub fn router(aggregator: Aggregator) -> Router {
    let path = aggregator.config().server.path.clone();

    Router::new()
        .route(&path, get(serve_feed))
        .layer(TraceLayer::new_for_http())
        .with_state(aggregator)
}

async fn serve_feed(
    State(aggregator): State<Aggregator>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let xml = aggregator.build_document(query.pretty()).await?;

    Ok((
        [
            (header::CONTENT_TYPE, RSS_CONTENT_TYPE),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        xml,
    )
        .into_response())
}
