//! autoreduce-api - REST entry point for autoreduction run submission
//!
//! Serves the authenticated run and batch endpoints, and provides the admin
//! commands used to provision API users and their tokens.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use autoreduce_common::api::auth::get_or_create_token;
use autoreduce_common::config::{ApiConfig, CliOverrides, ConfigSource};
use autoreduce_common::db::{create_user, find_user_by_username, init_database, set_user_active};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use autoreduce_api::{build_router, AppState};

/// Command-line arguments for autoreduce-api
#[derive(Parser, Debug)]
#[command(name = "autoreduce-api")]
#[command(about = "Authenticated REST API for autoreduction run submission")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an API user
    CreateUser {
        username: String,
        /// Mark the user as staff
        #[arg(long)]
        staff: bool,
        /// Create the user disabled; its tokens are rejected
        #[arg(long)]
        inactive: bool,
    },
    /// Print the user's API token, creating it if needed
    CreateToken { username: String },
    /// Disable a user; their token is rejected from then on
    DeactivateUser { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = CliOverrides {
        config_file: args.config.clone(),
        host: args.host.clone(),
        port: args.port,
        database_path: args.database.clone(),
    };
    let (config, source) = ApiConfig::load(&overrides).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting autoreduce-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match source {
        ConfigSource::File(path) => info!("Configuration: {}", path.display()),
        ConfigSource::Defaults => warn!("No configuration file found, using defaults"),
    }

    info!("Database: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::CreateUser {
            username,
            staff,
            inactive,
        } => {
            let user = create_user(&pool, &username, staff, !inactive)
                .await
                .context("Failed to create user")?;
            info!(id = user.id, username = %user.username, "User created");
            println!("Created user '{}' (id {})", user.username, user.id);
            Ok(())
        }
        Command::DeactivateUser { username } => {
            let Some(user) = find_user_by_username(&pool, &username).await? else {
                bail!("No user named '{}'", username);
            };
            set_user_active(&pool, user.id, false)
                .await
                .context("Failed to deactivate user")?;
            info!(id = user.id, username = %user.username, "User deactivated");
            println!("Deactivated user '{}'", user.username);
            Ok(())
        }
        Command::CreateToken { username } => {
            let Some(user) = find_user_by_username(&pool, &username).await? else {
                bail!("No user named '{}'", username);
            };
            let key = get_or_create_token(&pool, user.id)
                .await
                .context("Failed to create token")?;
            println!("{}", key);
            Ok(())
        }
    }
}

async fn serve(pool: sqlx::SqlitePool, config: ApiConfig) -> Result<()> {
    let bind_address = config.bind_address();
    info!(
        production = config.production,
        allowed_hosts = ?config.allowed_hosts,
        archive_root = %config.archive_root.display(),
        verify_data_files = config.verify_data_files,
        "Server configuration"
    );

    let app = build_router(AppState::from_pool(pool, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
