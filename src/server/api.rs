use crate::models::chat::ChatRequest;
use crate::relay::Relay;
use std::convert::Infallible;
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    extract::{ DefaultBodyLimit, State },
    response::{ sse::{ Event, Sse }, IntoResponse, Response },
    http::StatusCode,
    Json,
};
use futures::{ Stream, StreamExt };
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{ AllowHeaders, AllowMethods, AllowOrigin, CorsLayer };
use log::{ info, warn };

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Failures reported through the HTTP status, before any event is streamed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: self.to_string() }),
        ).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
}

/// Any origin, method and header, with credentials. Origin and headers are
/// mirrored because a literal `*` cannot be combined with credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_router(relay: Arc<Relay>) -> Router {
    let app_state = AppState { relay };

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        // conversations carry no size cap
        .layer(DefaultBodyLimit::disable())
        .layer(cors_layer())
        .with_state(app_state)
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejecting /chat body: {}", e);
        ApiError::from(e)
    })?;
    info!("POST /chat with {} messages", request.messages.len());

    let events = state.relay
        .stream_raw(request.messages)
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame.to_sse_data())));

    Ok(Sse::new(events))
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}
