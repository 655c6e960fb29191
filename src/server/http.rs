//! Control surface
//!
//! Thin HTTP translation layer over the stream manager: it extracts the
//! target URL, forwards to get-or-create, and maps the error taxonomy onto
//! status codes. No lifecycle logic lives here.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::RequestError;
use crate::stream::{StreamManager, StreamPhase};

/// Build the control surface router
pub fn router(manager: Arc<StreamManager>) -> Router {
    Router::new()
        .route("/stream", get(get_stream))
        .route("/streams", get(list_streams))
        .with_state(manager)
}

#[derive(Deserialize)]
struct StreamQuery {
    url: Option<String>,
}

#[derive(Serialize)]
struct StreamResponse {
    address: String,
}

#[derive(Serialize)]
struct StreamListing {
    id: String,
    url: String,
    phase: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

async fn get_stream(
    State(manager): State<Arc<StreamManager>>,
    Query(query): Query<StreamQuery>,
) -> Result<Json<StreamResponse>, RequestError> {
    let url = query
        .url
        .ok_or_else(|| RequestError::MissingParameter("url parameter is required".to_string()))?;
    let address = manager.get_or_create(&url).await?;
    Ok(Json(StreamResponse { address }))
}

async fn list_streams(State(manager): State<Arc<StreamManager>>) -> Json<Vec<StreamListing>> {
    let mut listings = Vec::new();
    for context in manager.registry().snapshot().await {
        let phase = match context.phase().await {
            StreamPhase::Initializing => "initializing",
            StreamPhase::Active => "active",
            StreamPhase::Closing => "closing",
            StreamPhase::Removed => "removed",
        };
        listings.push(StreamListing {
            id: context.id().as_str().to_string(),
            url: context.url().to_string(),
            phase: phase.to_string(),
        });
    }
    Json(listings)
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match &self {
            RequestError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            RequestError::CreationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RequestError::CreationFailed(_) => StatusCode::BAD_GATEWAY,
            RequestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.category(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
