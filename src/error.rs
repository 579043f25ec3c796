// ABOUTME: Error types for the Rexec client runtime
// Covers authentication, network, server-reported, and transport failures

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: StatusCode, message: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl ClientError {
    /// Message suitable for showing to the user. Server-reported messages
    /// are passed through verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Error body shape the backend uses for non-success responses.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

/// Extract the server-provided error message from a response body, falling
/// back to a generic message when the body is empty or not the expected
/// shape.
pub(crate) fn parse_error_body(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.error.filter(|m| !m.trim().is_empty()) {
            return message;
        }
    }
    format!("Request failed with status {}", status.as_u16())
}
