mod auth;
mod background;
mod handlers;
mod openapi;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use fbstat_core::DatabaseMonitor;
use fbstat_core::collector::{FileSource, GstatConfig, GstatSource, StatisticsSource};
use fbstat_core::metrics::{GaugeRegistry, ValueStore};

use auth::{AccessLogLayer, Credentials};
use openapi::ApiDoc;
use state::{SharedState, WebAppInner};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "fbstat-web", about = "Firebird gstat metrics server", version = fbstat_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:9184", env = "FBSTAT_LISTEN")]
    listen: String,

    /// Refresh interval in seconds.
    #[arg(long, default_value = "3600", env = "FBSTAT_INTERVAL")]
    interval: u64,

    /// gstat binary (overrides FBSTAT_GSTAT).
    #[arg(long)]
    gstat: Option<String>,

    /// Timeout for one gstat run, in seconds.
    #[arg(long, default_value = "300", env = "FBSTAT_TIMEOUT")]
    timeout: u64,

    /// Replay a saved report instead of running gstat.
    /// Connection settings are then not required.
    #[arg(long, env = "FBSTAT_REPORT")]
    report: Option<PathBuf>,

    /// Database identifier for --report (default: the file name).
    #[arg(long, requires = "report")]
    database: Option<String>,

    /// Basic Auth username required for on-demand refresh (PUT).
    /// If set, --auth-password is also required.
    #[arg(long, env = "FBSTAT_AUTH_USER", requires = "auth_password")]
    auth_user: Option<String>,

    /// Basic Auth password.
    #[arg(long, env = "FBSTAT_AUTH_PASSWORD", requires = "auth_user")]
    auth_password: Option<String>,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("fbstat_web=info,fbstat_core=info")
                }),
        )
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    if args.interval == 0 {
        error!("--interval must be at least 1 second");
        process::exit(2);
    }

    let source = create_source(&args);
    info!(
        version = fbstat_core::VERSION,
        database = source.database(),
        interval_secs = args.interval,
        "starting"
    );

    let registry = Arc::new(GaugeRegistry::new());
    let monitor = DatabaseMonitor::new(registry.clone(), Arc::new(ValueStore::new()));
    let interval = Duration::from_secs(args.interval);

    let state: SharedState = Arc::new(WebAppInner {
        monitor,
        registry,
        source,
        interval,
    });

    // Background refresh loop
    {
        let state_clone = state.clone();
        tokio::spawn(async move {
            background::tick_loop(state_clone, interval).await;
        });
    }

    let refresh_creds = match (&args.auth_user, &args.auth_password) {
        (Some(user), Some(password)) => {
            info!("basic auth enabled for refresh");
            Some(Arc::new(Credentials {
                user: user.clone(),
                password: password.clone(),
            }))
        }
        _ => None,
    };

    // Router
    let mut app = Router::new()
        .route("/api/v1/health", get(handlers::handle_health))
        .route("/api/v1/status", get(handlers::handle_status))
        .route(
            "/api/v1/metrics/database",
            get(handlers::handle_database_report).put(handlers::handle_refresh),
        )
        .route("/metrics", get(handlers::handle_metrics))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    if let Some(creds) = refresh_creds {
        app = app.layer(axum::middleware::from_fn_with_state(
            creds,
            auth::refresh_auth_middleware,
        ));
    }

    let app = app
        .layer(AccessLogLayer)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(2);
        }
    };
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn create_source(args: &Args) -> Box<dyn StatisticsSource> {
    if let Some(ref path) = args.report {
        let database = args.database.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });
        info!(path = %path.display(), "replaying saved report");
        return Box::new(FileSource::new(database, path));
    }

    let mut config = match GstatConfig::from_env() {
        Ok(config) => config.with_timeout(Duration::from_secs(args.timeout)),
        Err(e) => {
            error!(error = %e, "invalid connection configuration (set FBSTAT_DATABASE or --report)");
            process::exit(2);
        }
    };
    if let Some(ref gstat) = args.gstat {
        config = config.with_gstat_path(gstat);
    }
    info!(config = ?config, "using gstat");
    Box::new(GstatSource::new(config))
}
