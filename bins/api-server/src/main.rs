use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::OnceLock;

use assist_core::config::AppConfig as EnvConfig;
use axum::Router;
use openai_client::{OpenAiClient, StructuredCompletion};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

mod config;
mod routes;

use config::load_app_config;
use routes::api_routes;
use routes::profile::StoredProfile;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Clone)]
pub struct AppState {
    completion: Option<Arc<dyn StructuredCompletion>>,
    profile: Arc<RwLock<StoredProfile>>,
}

impl AppState {
    pub fn new(completion: Option<Arc<dyn StructuredCompletion>>) -> Self {
        Self {
            completion,
            profile: Arc::new(RwLock::new(StoredProfile::default())),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_app_config().unwrap_or_else(|err| {
        eprintln!("failed to load config: {err}, using defaults");
        Default::default()
    });
    init_tracing(&settings.log_dir());

    let env_config = EnvConfig::load_from_env()?;
    let completion: Option<Arc<dyn StructuredCompletion>> =
        match OpenAiClient::from_app_config(&env_config) {
            Ok(client) => {
                info!(
                    base_url = %client.config().base_url,
                    auth = ?client.auth_scheme(),
                    "OpenAI client ready"
                );
                Some(Arc::new(client))
            }
            Err(err) => {
                tracing::warn!(%err, "OpenAI client not initialised; extraction disabled");
                None
            }
        };

    let bind_addr = settings.bind_addr()?;

    let router = Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .with_state(AppState::new(completion))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any));

    info!("Starting API server on {bind_addr}");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(log_dir: &Path) {
    if let Err(err) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log directory {log_dir:?}: {err}");
    }

    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(log_dir, "api-server.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let env_filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    let fmt_stdout = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
    let fmt_file = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_stdout)
        .with(fmt_file);

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing already initialised");
    }
}
