use clap::Parser;
use draftview_server::{build_services, watch_structures, ws, ServerConfig, DEFAULT_CONFIG_NAME};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Draftview - live preview server for unsaved content edits
#[derive(Parser, Debug)]
#[command(name = "draftview-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_NAME)]
    config: PathBuf,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Do not reload the structure file when it changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let services = build_services(&config)?;
    tracing::info!(
        content = %config.content_dir.display(),
        structures = services.structures.len(),
        persistent = config.cache_dir.is_some(),
        "preview services ready"
    );

    let _watcher = if args.no_watch || !config.structure_file.exists() {
        None
    } else {
        match watch_structures(config.structure_file.clone(), services.structures.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "structure file will not be reloaded");
                None
            }
        }
    };

    let app = ws::router(services.handler);
    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!(addr = %config.listen, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
