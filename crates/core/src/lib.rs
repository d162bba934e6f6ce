pub mod config;
pub mod generator;
pub mod handlers;
pub mod managers;
pub mod test_utils;

use busbar_shared::BusbarError;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

use config::AppConfig;
use managers::{FlowStore, HostedServerManager, ServerCatalog};

pub struct AppState {
    pub flow: FlowStore,
    pub catalog: ServerCatalog,
    pub host: Arc<HostedServerManager>,
    pub config: AppConfig,
    pub shutdown: Arc<Notify>,
}

pub enum AppError {
    Busbar(BusbarError),
    Internal(anyhow::Error),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, err_type, message) = match self {
            AppError::Busbar(e) => {
                let status = match &e {
                    BusbarError::NotFound(_) => StatusCode::NOT_FOUND,
                    BusbarError::NotRunning(_) => StatusCode::CONFLICT,
                    BusbarError::Validation(_) => StatusCode::BAD_REQUEST,
                    BusbarError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    BusbarError::Protocol(_) => StatusCode::BAD_GATEWAY,
                    BusbarError::Workspace(_)
                    | BusbarError::Spawn(_)
                    | BusbarError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, format!("{:?}", e), e.to_string())
            }
            AppError::Internal(e) => {
                // Log full error server-side only; return generic message to client
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError".to_string(),
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = axum::Json(serde_json::json!({
            "status": "error",
            "error": {
                "type": err_type,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<BusbarError> for AppError {
    fn from(err: BusbarError) -> Self {
        AppError::Busbar(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Build the full HTTP surface. Shared with the integration tests so they
/// exercise the same router the binary serves.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};
    use tower_http::cors::CorsLayer;

    let api_routes = axum::Router::new()
        .route("/nodes", get(handlers::flow::get_nodes).post(handlers::flow::create_node))
        .route("/edges", get(handlers::flow::get_edges).post(handlers::flow::create_edge))
        .route(
            "/flow",
            get(handlers::flow::get_flow)
                .post(handlers::flow::save_flow)
                .delete(handlers::flow::clear_flow),
        )
        .route("/mcp/server", post(handlers::servers::create_server))
        .route("/mcp/servers", get(handlers::servers::list_servers))
        .route(
            "/mcp/server/:id",
            get(handlers::servers::get_server).delete(handlers::servers::delete_server),
        )
        .route("/mcp/flow-to-server", post(handlers::servers::flow_to_server))
        .route("/mcp/generate/:id", post(handlers::servers::generate_server))
        .route("/mcp/export/:id", post(handlers::servers::export_server))
        .route(
            "/mcp/deploy/:id",
            post(handlers::hosted::deploy_server).delete(handlers::hosted::stop_server),
        )
        .route("/mcp/deploy/:id/restart", post(handlers::hosted::restart_server))
        .route("/mcp/hosted", get(handlers::hosted::list_hosted))
        .route("/mcp/hosted/:id/status", get(handlers::hosted::hosted_status))
        .route("/mcp/:id/tools/call", post(handlers::hosted::call_tool));

    axum::Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .with_state(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(state.config.cors_origins.clone())
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::PUT,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        )
}

/// Entry point for the backend server.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("+---------------------------------------+");
    info!("|            Busbar Backend             |");
    info!(
        "|             Version {:<10}        |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+---------------------------------------+");
    info!(
        "📍 Runtime: {}, workspace root: {}",
        config.runtime,
        config.workspace_root.display()
    );

    let shutdown = Arc::new(Notify::new());
    let host = Arc::new(HostedServerManager::new(config.host_settings()));

    let app_state = Arc::new(AppState {
        flow: FlowStore::default(),
        catalog: ServerCatalog::default(),
        host: host.clone(),
        config: config.clone(),
        shutdown: shutdown.clone(),
    });

    let app = build_router(app_state);

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 Ctrl-C received. Stopping server...");
                shutdown.notify_waiters();
            }
        });
    }

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.bind_address, config.port)).await?;
    info!(
        "🚀 Busbar backend is listening on http://{}:{}",
        config.bind_address, config.port
    );

    let shutdown_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal.notified().await;
        })
        .await?;

    // No child process or workspace may outlive the supervisor.
    host.cleanup_all().await;
    Ok(())
}
