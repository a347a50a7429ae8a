use clap::Parser;
use color_eyre::eyre::WrapErr;
use dotenv::dotenv;
use tabstream::config::CliOpts;
use tabstream::db::MySqlConnector;
use tabstream::http::{AppState, create_router};
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("tabstream=info,tabstreamd=info,tower_http=info")
        }))
        .init();

    let cli = CliOpts::parse();
    let opts = cli.opts().wrap_err("invalid database URL")?;
    let config = cli.config();
    tracing::info!(
        database = %opts.endpoint(),
        default_ceiling = config.default_ceiling,
        max_query_bytes = config.max_query_bytes,
        query_timeout = ?config.query_timeout,
        "starting tabstreamd"
    );

    let state = AppState::new(MySqlConnector::new(opts), config);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let listener = tokio::net::TcpListener::bind(cli.listen_addr())
        .await
        .wrap_err_with(|| format!("failed to bind {}", cli.listen_addr()))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::warn!("Ctrl+C received, starting graceful shutdown");
        },
        () = terminate => {
            tracing::warn!("SIGTERM received, starting graceful shutdown");
        },
    }
}
