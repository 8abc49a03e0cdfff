mod config;

use std::net::SocketAddr;

use langify_api::{AppStateInner, accounts, router, sessions};
use langify_db::Database;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "langify=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.has_placeholder_secret() {
        warn!("LANGIFY_JWT_SECRET is unset or a placeholder; tokens are forgeable. Set it before deploying.");
    }

    let db = match &config.db_path {
        Some(path) => {
            info!("Opening store at {}", path.display());
            Database::open(path)?
        }
        None => {
            info!("Using in-memory store; data is lost on exit");
            Database::in_memory()?
        }
    };

    let state = AppStateInner::new(db, config.jwt_secret.clone())
        .with_calendar(config.calendar)
        .into_shared();

    if config.seed_demo {
        let seed_state = state.clone();
        let admin_password = config.demo_admin_password.clone();
        tokio::task::spawn_blocking(move || {
            accounts::seed_demo_accounts(&seed_state, &admin_password)
        })
        .await??;
    }

    tokio::spawn(sessions::run_expiry_loop(
        state.clone(),
        config.session_sweep_secs,
    ));

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Langify server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("Received Ctrl+C, shutting down...");
    }
}
