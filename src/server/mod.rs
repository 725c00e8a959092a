//! Axum HTTP adapter over the [`Gateway`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use tracing::{error, info, warn};

use crate::auth::{HEADER_SIGNATURE, HEADER_TIMESTAMP};
use crate::gateway::{Gateway, RawRequest};

/// Builds the HTTP router. Deliveries are accepted at `/` and at
/// `/slack/events` so either can be used as the request URL.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/", post(handle))
        .route("/slack/events", post(handle))
        .with_state(gateway)
}

/// Binds `addr` and serves until the listener fails.
pub async fn run_server(gateway: Arc<Gateway>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "server", %addr, "listening for webhook deliveries");
    serve(listener, gateway).await
}

pub async fn serve(listener: tokio::net::TcpListener, gateway: Arc<Gateway>) -> std::io::Result<()> {
    axum::serve(listener, router(gateway)).await
}

async fn handle(State(gateway): State<Arc<Gateway>>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = header_value(&headers, header::CONTENT_TYPE.as_str());
    let signature = header_value(&headers, HEADER_SIGNATURE);
    let timestamp = header_value(&headers, HEADER_TIMESTAMP);

    // Dispatch is synchronous (listeners may do blocking HTTP), so it
    // runs off the async worker threads.
    let result = tokio::task::spawn_blocking(move || {
        gateway.dispatch(&RawRequest {
            body: &body,
            content_type: content_type.as_deref(),
            signature: signature.as_deref(),
            timestamp: timestamp.as_deref(),
        })
    })
    .await;

    match result {
        Ok(Ok(ack)) => {
            let status = StatusCode::from_u16(ack.status).unwrap_or(StatusCode::OK);
            match ack.body {
                Some(body) => {
                    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
                }
                None => status.into_response(),
            }
        }
        Ok(Err(err)) => {
            let status = StatusCode::from_u16(err.status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            warn!(target: "server", %status, error = %err, "request rejected");
            // Error details stay in the logs; callers get a terse reason.
            let reason = match status {
                StatusCode::UNAUTHORIZED => "unauthorized",
                StatusCode::BAD_REQUEST => "bad request",
                _ => "internal error",
            };
            (status, reason).into_response()
        }
        Err(join_err) => {
            error!(target: "server", error = %join_err, "dispatch task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
