//! Chat relay endpoint
//!
//! Every request is answered with `200 {"response": ...}`. Model failures are
//! folded into the response text rather than surfaced as HTTP errors, which
//! is what existing clients of the relay expect.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::RelayState;
use crate::{Error, Result};
use crate::llm::ChatModel;
use crate::persona::persona_messages;

/// Body of `POST /chat`
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// JSON body extractor that also accepts requests without a content type
///
/// Bodies labelled with a non-JSON media type, and bodies that do not parse
/// as `T`, are rejected with 422.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        parse_json_body(&headers, &body)
            .map(JsonBody)
            .map_err(|e| unprocessable(&e.to_string()))
    }
}

/// Parse a request body as JSON when its content type allows it
///
/// # Errors
///
/// Returns [`Error::Config`] for a non-JSON content type and
/// [`Error::Serialization`] when the body does not match `T`
pub fn parse_json_body<T: serde::de::DeserializeOwned>(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<T> {
    if let Some(value) = headers.get(header::CONTENT_TYPE) {
        let content_type = value.to_str().unwrap_or_default();
        if !is_json_content_type(content_type) {
            return Err(Error::Config(format!(
                "expected a JSON body, got content type {content_type:?}"
            )));
        }
    }

    Ok(serde_json::from_slice(body)?)
}

/// `application/json` or any `application/*+json` type, ignoring parameters
fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence
        .strip_prefix("application/")
        .is_some_and(|subtype| subtype == "json" || subtype.ends_with("+json"))
}

fn unprocessable(detail: &str) -> Response {
    tracing::debug!(detail, "rejected chat body");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({ "detail": detail })),
    )
        .into_response()
}

/// Reply to `POST /chat`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

/// What came back from the model for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The model's reply text
    Reply(String),
    /// The model call failed; carries a human-readable reason
    Failed(String),
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        let response = match outcome {
            ChatOutcome::Reply(text) => text,
            ChatOutcome::Failed(reason) => format!("Error processing request: {reason}"),
        };
        Self { response }
    }
}

/// Ask the model to answer one message in persona
///
/// No history is kept; each call sends the persona prompt and the message.
pub async fn relay_chat(model: &dyn ChatModel, message: &str) -> ChatOutcome {
    match model.complete(&persona_messages(message)).await {
        Ok(reply) => ChatOutcome::Reply(reply),
        Err(e) => {
            tracing::warn!(error = %e, "model call failed");
            let reason = match e {
                Error::Llm(detail) => detail,
                other => other.to_string(),
            };
            ChatOutcome::Failed(reason)
        }
    }
}

async fn chat(
    State(state): State<Arc<RelayState>>,
    JsonBody(request): JsonBody<ChatRequest>,
) -> Json<ChatResponse> {
    tracing::debug!(chars = request.message.len(), "chat request");

    let outcome = relay_chat(state.model.as_ref(), &request.message).await;
    Json(outcome.into())
}

/// Build the chat router
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}
