//! Shared test utilities

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use persona_voicebot::api::{self, RelayState};
use persona_voicebot::{ChatMessage, ChatModel, Error, Result};

/// Chat model that answers from a script and records what it was sent
#[derive(Default)]
pub struct FakeModel {
    reply: Option<String>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeModel {
    /// A model that always answers `reply`
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A model whose every call fails
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(messages.to_vec());

        self.reply
            .clone()
            .ok_or_else(|| Error::Llm("Groq API error 401 Unauthorized: invalid key".to_string()))
    }
}

/// Build a relay router around a fake model
pub fn test_router(model: Arc<FakeModel>) -> Router {
    let state = Arc::new(RelayState::new(model, "fake-model"));
    api::router(state, None)
}

/// Serve the relay on an ephemeral local port
pub async fn spawn_relay(model: Arc<FakeModel>) -> SocketAddr {
    serve(test_router(model)).await
}

/// Serve any router on an ephemeral local port
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("no local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server failed");
    });

    addr
}

/// Read a response body as JSON
pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
