use anyhow::{anyhow, Context, Result};
use clap::Parser;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use study_control::ControlPlane;
use study_metrics::{MetricsService, TracingService};
use study_models::Config;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "studyforge-server")]
#[command(about = "Course material ingestion and quiz generation API")]
struct Args {
    /// TOML configuration file; missing files fall back to defaults
    #[arg(long, default_value = "configs/default.toml")]
    config: PathBuf,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,
}

/// The filesystem path behind a `sqlite:` URL, if it names a file.
fn sqlite_file(db_url: &str) -> Option<&Path> {
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(Path::new(path))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(Some(&args.config))
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    TracingService::init(&config.logging)?;
    info!("Starting StudyForge server");

    fs::create_dir_all(&config.data.work_dir)
        .with_context(|| format!("creating work dir {}", config.data.work_dir))?;

    if let Some(parent) = sqlite_file(&config.data.db_url).and_then(Path::parent) {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create DB parent directory {:?}: {}", parent, e);
        }
    }
    let options = SqliteConnectOptions::from_str(&config.data.db_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    info!("Database connected");

    let metrics = Arc::new(MetricsService::new()?);
    let control = Arc::new(ControlPlane::from_config(pool, metrics, config.clone()).await?);

    info!(
        "Starting StudyForge on {}:{}, uploads under {}",
        config.server.bind, config.server.port, config.data.work_dir
    );
    let server = tokio::spawn(study_api::start_server(control));

    serve_until(server, signal::ctrl_c()).await?;
    info!("StudyForge server shutdown complete");
    Ok(())
}

type ServerTask = JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>;

/// Run until the server stops or `shutdown` resolves. A server that fails,
/// including failing to bind, is an error.
async fn serve_until(
    server: ServerTask,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    tokio::select! {
        joined = server => match joined {
            Ok(Ok(())) => {
                info!("API server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(anyhow!("API server error: {}", e)),
            Err(e) => Err(anyhow!("API server task failed: {}", e)),
        },
        result = shutdown => {
            match result {
                Ok(()) => info!("Received shutdown signal"),
                Err(err) => warn!("Unable to listen for shutdown signal: {}", err),
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_resolve_to_files() {
        assert_eq!(
            sqlite_file("sqlite://data/studyforge.db"),
            Some(Path::new("data/studyforge.db"))
        );
        assert_eq!(
            sqlite_file("sqlite:/var/lib/sf.db?mode=rwc"),
            Some(Path::new("/var/lib/sf.db"))
        );
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("postgres://db"), None);
    }

    #[tokio::test]
    async fn server_failure_is_an_error() {
        let server: ServerTask = tokio::spawn(async {
            Err(std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use").into())
        });
        let err = serve_until(server, std::future::pending()).await.unwrap_err();
        assert_eq!(err.to_string(), "API server error: address in use");
    }

    #[tokio::test]
    async fn shutdown_signal_ends_cleanly() {
        let server: ServerTask = tokio::spawn(std::future::pending());
        serve_until(server, async { Ok(()) }).await.unwrap();
    }
}
