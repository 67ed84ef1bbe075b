// HTTP server - serves the lyric form page and its JSON API
//
// The page is public; every `/api/*` request needs the bearer token. The
// token comes from config or is generated at startup and handed to the
// browser through the startup URL.

pub mod page;
pub mod routes;

use axum::{
    Router,
    extract::{Request, State},
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::{Html, Response},
    routing::get,
};
use rand::Rng;
use rand::thread_rng;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ai::{CompletionClient, CredentialManager, build_client};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::form::FormState;
use crate::history::SubmissionLog;

/// Shared state for the server
pub struct AppState {
    pub config: AppConfig,
    pub form: FormState,
    pub log: Mutex<SubmissionLog>,
    access_token: String,
    /// `None` until an API key is available
    client: RwLock<Option<Arc<dyn CompletionClient>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        form: FormState,
        log: SubmissionLog,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        let access_token = config
            .server
            .access_token
            .clone()
            .unwrap_or_else(generate_token);
        AppState {
            config,
            form,
            log: Mutex::new(log),
            access_token,
            client: RwLock::new(client),
        }
    }

    /// Bearer token required on `/api/*`
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn client(&self) -> Option<Arc<dyn CompletionClient>> {
        self.client
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_client(&self, client: Option<Arc<dyn CompletionClient>>) {
        *self
            .client
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = client;
    }

    /// Build a client for the configured provider from `api_key` and install it.
    pub fn install_api_key(&self, api_key: String) -> Result<()> {
        let client = build_client(&self.config.completion, api_key)?;
        self.set_client(Some(Arc::from(client)));
        Ok(())
    }

    /// Client to use for a submission, or the error explaining why there is none
    pub fn require_client(&self) -> Result<Arc<dyn CompletionClient>> {
        self.client().ok_or_else(|| {
            Error::MissingApiKey(self.config.completion.provider.display_name().to_string())
        })
    }
}

/// API key from config/env, else from the keychain
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    if let Some(key) = config.completion.configured_api_key(|name| std::env::var(name).ok()) {
        return Some(key);
    }
    match CredentialManager::retrieve_api_key(config.completion.provider) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(error = %e, "keychain unavailable, continuing without stored API key");
            None
        }
    }
}

/// Holds the running server's shutdown mechanism
pub struct RunningServer {
    pub shutdown_tx: oneshot::Sender<()>,
    pub addr: SocketAddr,
    pub handle: JoinHandle<()>,
}

impl RunningServer {
    /// Signal shutdown and wait for in-flight requests to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "server task failed");
        }
    }
}

/// Generate a cryptographically random 256-bit token (64 hex chars)
pub fn generate_token() -> String {
    let mut rng = thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen::<u8>()).collect();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

async fn serve_page() -> Html<String> {
    Html(page::render_page())
}

/// Compare without an early exit on the first differing byte
fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.len() == expected.len()
        && provided
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Auth middleware - validates the Bearer token on every API request.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if tokens_match(token, state.access_token()) => Ok(next.run(request).await),
        _ => {
            tracing::debug!(path = %request.uri().path(), "rejected request without valid token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Router with page, API and middleware. Separate from `start_server` for tests.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = routes::api_routes()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let router = Router::new()
        .route("/", get(serve_page))
        .route("/index.html", get(serve_page))
        .merge(api_routes);

    // The page calls the API from its own origin; other origins get no CORS headers
    let router = if state.config.server.cors_any_origin {
        tracing::warn!("CORS open to any origin");
        router.layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                .allow_origin(AllowOrigin::any()),
        )
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// Start the HTTP server. Returns the running server handle (for shutdown) or an error.
pub async fn start_server(state: Arc<AppState>) -> Result<RunningServer> {
    let host = state.config.server.host;
    let listener = try_bind(host, state.config.server.port).await?;
    let addr = listener.local_addr()?;
    let app = build_router(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tracing::info!(%addr, "server starting");

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("shutdown signal received, draining connections");
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server error");
        }
        tracing::info!("server stopped");
    });

    Ok(RunningServer { shutdown_tx, addr, handle })
}

/// Bind the preferred port, then the next ten, then an OS-assigned one
async fn try_bind(host: IpAddr, preferred_port: u16) -> Result<TcpListener> {
    if let Ok(listener) = TcpListener::bind(SocketAddr::new(host, preferred_port)).await {
        return Ok(listener);
    }

    for offset in 1..=10u16 {
        let port = preferred_port.saturating_add(offset);
        if let Ok(listener) = TcpListener::bind(SocketAddr::new(host, port)).await {
            tracing::warn!(preferred_port, port, "preferred port unavailable");
            return Ok(listener);
        }
    }

    let listener = TcpListener::bind(SocketAddr::new(host, 0)).await?;
    tracing::warn!(
        preferred_port,
        port = listener.local_addr()?.port(),
        "all preferred ports unavailable, using OS-assigned port"
    );
    Ok(listener)
}
