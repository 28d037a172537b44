use crate::sse::{self, AppState};
use axum::{routing::post, Router};
use simdrive_orchestrator::RunCoordinator;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub struct ApiServer {
    state: AppState,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    #[must_use]
    pub fn new(coordinator: Arc<RunCoordinator>, static_dir: Option<PathBuf>) -> Self {
        Self {
            state: AppState::new(coordinator),
            static_dir,
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let mut router = Router::new()
            .route("/run-puppeteer", post(sse::run_simulation))
            .route("/api/simulations", post(sse::run_simulation));

        match &self.static_dir {
            Some(dir) if dir.is_dir() => {
                router = router.fallback_service(ServeDir::new(dir));
            }
            Some(dir) => {
                tracing::warn!(dir = %dir.display(), "static directory missing, front-end not served");
            }
            None => {}
        }

        router
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
