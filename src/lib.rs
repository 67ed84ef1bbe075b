// Modules
pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod history;
pub mod logging;
pub mod render;
pub mod server;

use std::sync::Arc;

use ai::CompletionClient;
use config::AppConfig;
use error::Result;
use form::FormState;
use history::SubmissionLog;
use server::AppState;

pub use error::Error;

/// Open the submission log and resolve the completion client.
///
/// A missing API key is not fatal: the page still loads and the key can be
/// supplied through the settings endpoint.
pub fn build_state(config: AppConfig) -> Result<Arc<AppState>> {
    let storage = history::open_storage(&config.history)?;
    let log = SubmissionLog::open(storage, config.history.limit)?;

    let client: Option<Arc<dyn CompletionClient>> = match server::resolve_api_key(&config) {
        Some(key) => Some(Arc::from(ai::build_client(&config.completion, key)?)),
        None => {
            tracing::warn!(
                provider = config.completion.provider.display_name(),
                env = config.completion.provider.api_key_env(),
                "no API key configured; submissions fail until one is set"
            );
            None
        }
    };

    Ok(Arc::new(AppState::new(config, FormState::default(), log, client)))
}

/// Serve until Ctrl-C, then shut down gracefully.
pub async fn run(config: AppConfig) -> Result<()> {
    let state = build_state(config)?;
    let url_token = state.access_token().to_string();
    let server = server::start_server(state).await?;

    // The page picks the token up from this URL
    println!("LyricDeck is running at http://{}/?token={}", server.addr, url_token);

    tokio::signal::ctrl_c().await?;
    tracing::info!("ctrl-c received");
    server.shutdown().await;
    Ok(())
}
