//! Process entry point: loads configuration, wires every `fwdr-*` crate into a single
//! [`fwdr_smtp::Listener`], and drives it until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use fwdr_common::config::{Config, InstanceMode};
use fwdr_common::{internal, Signal};
use fwdr_maildb::HttpMaildbClient;
use fwdr_pipeline::Pipeline;
use fwdr_resolver::{local::LocalDomainResolver, remote::RemoteDomainResolver, DomainResolver};
use fwdr_session::RateLimiter;
use fwdr_smtp::Listener;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let config_content = std::fs::read_to_string(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to read config from {}: {e}", config_path.display()))?;
    let config = Config::from_toml(&config_content)?;
    config.validate().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    run(config).await
}

/// Finds the configuration file using the following precedence (§10.3):
/// 1. `FWDR_CONFIG` environment variable
/// 2. `./fwdr.toml` (current working directory)
/// 3. `/etc/fwdr/fwdr.toml` (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("FWDR_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("FWDR_CONFIG points to a non-existent file: {}", path.display());
    }

    let default_paths = [PathBuf::from("./fwdr.toml"), PathBuf::from("/etc/fwdr/fwdr.toml")];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths.iter().map(|p| format!("  - {}", p.display())).collect::<Vec<_>>().join("\n");
    anyhow::bail!("no configuration file found. Tried:\n  - FWDR_CONFIG environment variable\n{paths_tried}")
}

async fn run(config: Config) -> anyhow::Result<()> {
    fwdr_common::logging::init();
    internal!("fwdr starting up");

    let config = Arc::new(config);
    let rate_limiter = Arc::new(RateLimiter::new());
    let resolver = build_resolver(&config);
    let maildb = Arc::new(HttpMaildbClient::new());

    let pipeline = Arc::new(Pipeline::new(config.clone(), rate_limiter, resolver, maildb));

    let listener = Listener::new(
        format!("127.0.0.1:{}", config.port_forwarding).parse()?,
        config.instance_hostname.clone(),
        pipeline.clone(),
        pipeline,
    );

    let (shutdown_tx, _) = broadcast::channel(16);
    let serve_shutdown = shutdown_tx.clone();
    let serving = tokio::spawn(async move { listener.serve(serve_shutdown).await });

    shutdown().await?;
    internal!("shutdown signal received, draining listener");
    let _ = shutdown_tx.send(Signal::Shutdown);

    serving.await??;

    internal!("fwdr shut down");
    Ok(())
}

fn build_resolver(config: &Config) -> Arc<dyn DomainResolver> {
    match config.instance_mode {
        InstanceMode::Local => Arc::new(LocalDomainResolver::new(config.root.clone())),
        InstanceMode::Server => {
            let server_id = config.server_id.clone().unwrap_or_default();
            let server_jwt = config.server_jwt.clone().unwrap_or_default();
            Arc::new(RemoteDomainResolver::new(server_id, server_jwt))
        }
    }
}

/// Waits for `SIGTERM` or `CTRL+C`, whichever comes first (§5 "Graceful shutdown").
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!("CTRL+C entered");
        }
        _ = terminate.recv() => {
            internal!("SIGTERM received");
        }
    }

    Ok(())
}
