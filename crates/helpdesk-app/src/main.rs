//! Helpdesk application binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Open the SQLite conversation store
//! 3. Load the FAQ knowledge base
//! 4. Start the axum REST API server

mod cli;

use std::path::{Path, PathBuf};

use clap::Parser;

use helpdesk_api::auth;
use helpdesk_api::state::AppState;
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_storage::{Database, SqliteConversationStore};

use cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Populate the knowledge base.
///
/// An explicit seed file replaces the stored FAQs. Otherwise the configured
/// seed file, then the bundled defaults, are loaded into an empty store.
fn load_knowledge_base(
    store: &SqliteConversationStore,
    cli_seed: Option<&Path>,
    config_seed: Option<&str>,
) -> helpdesk_core::Result<()> {
    if let Some(path) = cli_seed {
        let count = helpdesk_storage::seed_from_file(store, path)?;
        tracing::info!(path = %path.display(), count, "Knowledge base replaced from seed file");
        return Ok(());
    }

    let stored = store.faq_count()?;
    if stored > 0 {
        tracing::info!(count = stored, "Using stored knowledge base");
        return Ok(());
    }

    if let Some(path) = config_seed {
        let path = resolve_data_dir(path);
        let count = helpdesk_storage::seed_from_file(store, &path)?;
        tracing::info!(path = %path.display(), count, "Knowledge base loaded from configured seed");
        return Ok(());
    }

    let count = helpdesk_storage::seed_defaults_if_empty(store)?;
    tracing::info!(count, "Knowledge base loaded from bundled defaults");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let config_result = HelpdeskConfig::load(&config_file);

    let mut config = match &config_result {
        Ok(config) => config.clone(),
        Err(_) => HelpdeskConfig::default(),
    };
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.server.port = args.resolve_port(config.server.port);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Helpdesk v{}", env!("CARGO_PKG_VERSION"));
    match config_result {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("helpdesk.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Auth token.
    if config.server.require_auth && config.server.api_token.is_none() {
        let token = auth::load_or_generate_token(&data_dir.join("api_token"));
        config.server.api_token = Some(token);
    }

    let state = AppState::new(config.clone(), db);

    load_knowledge_base(
        &state.store,
        args.seed_faqs.as_deref(),
        config.conversation.faq_seed_path.as_deref(),
    )?;

    // === API server ===

    if let Err(e) = helpdesk_api::start_server(&config, state, shutdown_signal()).await {
        tracing::error!(error = %e, "API server failed");
        tracing::error!(
            "Is another instance running? Try: HELPDESK_PORT={} helpdesk",
            config.server.port.saturating_add(1)
        );
        return Err(e.into());
    }

    tracing::info!("Helpdesk stopped");
    Ok(())
}
