//! API server entry point.

use api::config::Config;
use ledger::{InMemoryLedger, Ledger, LedgerError, PostgresLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{RetryPolicy, retry};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Connects to PostgreSQL and applies the ledger migration.
async fn connect_ledger(url: &str, config: &Config) -> Result<PostgresLedger, LedgerError> {
    // Pool setup has its own acquire timeout.
    let policy = RetryPolicy {
        attempt_timeout: None,
        ..config.connect_policy()
    };
    let pool = retry(&policy, || async {
        PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(LedgerError::from)
    })
    .await
    .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

    let ledger = PostgresLedger::new(pool);
    ledger.run_migrations().await?;
    Ok(ledger)
}

async fn serve<L: Ledger + 'static>(config: Config, ledger: L, metrics_handle: PrometheusHandle) {
    let state = api::create_default_state(ledger, &config);

    if let Err(e) = api::probe_collaborators(&state.onboarding, &config.connect_policy()).await {
        tracing::error!(error = %e, "collaborators unreachable, aborting startup");
        std::process::exit(1);
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the ledger backend and serve
    match config.database_url.clone() {
        Some(url) => {
            let ledger = match connect_ledger(&url, &config).await {
                Ok(ledger) => ledger,
                Err(e) => {
                    tracing::error!(error = %e, "ledger database unreachable, aborting startup");
                    std::process::exit(1);
                }
            };
            tracing::info!("using PostgreSQL ledger");
            serve(config, ledger, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory ledger");
            serve(config, InMemoryLedger::new(), metrics_handle).await;
        }
    }
}
