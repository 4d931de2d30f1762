//! HTTP relay between browser or voice clients and the chat model

pub mod chat;
pub mod health;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::RelayConfig;
use crate::llm::{ChatModel, GroqClient};

pub use chat::{ChatOutcome, ChatRequest, ChatResponse, relay_chat};

/// Shared state for relay handlers, built once at startup
pub struct RelayState {
    pub model: Arc<dyn ChatModel>,
    pub model_name: String,
}

impl RelayState {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    /// Build state backed by the configured Groq model
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(Arc::new(GroqClient::from_config(config)), config.model.clone())
    }
}

/// Build the relay router
///
/// Cross-origin requests from anywhere are accepted, with credentials.
pub fn router(state: Arc<RelayState>, static_dir: Option<&PathBuf>) -> Router {
    let mut router = Router::new()
        .merge(health::router())
        .merge(chat::router(state));

    if let Some(static_dir) = static_dir {
        let index_file = static_dir.join("index.html");
        let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

        router = router.fallback_service(serve_dir);
        tracing::info!(path = %static_dir.display(), "serving static files");
    }

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// Relay HTTP server
pub struct RelayServer {
    state: Arc<RelayState>,
    addr: String,
    static_dir: Option<PathBuf>,
}

impl RelayServer {
    #[must_use]
    pub fn new(state: RelayState, config: &RelayConfig) -> Self {
        Self {
            state: Arc::new(state),
            addr: config.bind_addr(),
            static_dir: config.static_dir.clone(),
        }
    }

    /// Serve until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind relay on {}: {e}", self.addr)))?;

        tracing::info!(
            service = "Voice Chatbot Backend",
            version = env!("CARGO_PKG_VERSION"),
            model = %self.state.model_name,
            addr = %self.addr,
            "relay listening"
        );

        let app = router(self.state, self.static_dir.as_ref());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("relay stopped");
        Ok(())
    }
}
