//! Build relay CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Load configuration** — read `.env` (if present) and the process
//!    environment into an [`config::AppConfig`].
//! 2. **Wire observability** — install a `tracing-subscriber` JSON layer and,
//!    when configured, an OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure** — create the Unity, BunnyCDN and scratch
//!    adapters and inject them into a [`pipeline::BuildRelay`].
//! 4. **Select trigger mode**:
//!    - `serve` (default) — run the webhook listener until SIGINT/SIGTERM.
//!    - `relay --payload <file>` — relay one notification read from a JSON
//!      file, wait for it, and print the report.

mod config;
mod observability;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use bunny::BunnyCdnClient;
use clap::{Parser, Subcommand};
use listener::WebhookListener;
use pipeline::{BuildRelay, RelayLauncher};
use scratch::LocalScratch;
use tracing::{error, info};
use unity::UnityCloudBuildClient;

use crate::config::AppConfig;

/// Relays finished cloud builds to the CDN.
#[derive(Parser)]
#[command(name = "build-relay", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for build-success webhooks (default)
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Relay a single notification read from a JSON file
    Relay {
        /// Path to a build-success webhook payload
        #[arg(long)]
        payload: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let telemetry = observability::init()?;
    if let Ok(path) = &dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    let result = run(cli).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "build-relay exited with an error");
    }

    telemetry.shutdown();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    let relay = build_relay(&config)?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port.unwrap_or(config.port)));
            WebhookListener::new(Arc::new(relay), config.ack_mode)
                .serve(addr, shutdown_signal())
                .await?;
            info!("listener stopped");
        }
        Command::Relay { payload } => {
            let notification = read_payload(&payload).await?;
            let report = relay.launch(notification).wait().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Reads a webhook payload file for the `relay` command.
async fn read_payload(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn build_relay(config: &AppConfig) -> anyhow::Result<BuildRelay> {
    let provider = UnityCloudBuildClient::new(config.unity.clone())
        .context("failed to create Unity Cloud Build client")?;
    let cdn =
        BunnyCdnClient::new(config.bunny.clone()).context("failed to create BunnyCDN client")?;
    let scratch = LocalScratch::new(config.scratch_dir.clone());
    info!(
        scratch = %scratch.root().display(),
        zone = %config.bunny.storage_zone,
        prefix = %config.relay.cdn_path_prefix(),
        marker_naming = ?config.relay.marker_naming(),
        "relay configured"
    );

    Ok(BuildRelay::new(
        config.relay.clone(),
        Arc::new(provider),
        Arc::new(cdn),
        Arc::new(scratch),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn payload_file_is_read_as_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"platform": "standalonelinux64"}}"#).unwrap();

        let payload = read_payload(file.path()).await.unwrap();

        assert_eq!(payload["platform"], "standalonelinux64");
    }

    #[tokio::test]
    async fn payload_file_that_is_not_json_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "platform=linux").unwrap();

        let err = read_payload(file.path()).await.unwrap_err();

        assert!(err.to_string().ends_with("is not valid JSON"), "{err:#}");
    }

    #[tokio::test]
    async fn missing_payload_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = read_payload(&path).await.unwrap_err();

        assert!(err.to_string().starts_with("failed to read"), "{err:#}");
    }

    #[test]
    fn relay_command_takes_a_payload_path() {
        let cli = Cli::try_parse_from(["build-relay", "relay", "--payload", "build.json"]).unwrap();

        assert!(matches!(
            cli.command,
            Some(Command::Relay { payload }) if payload == Path::new("build.json")
        ));
    }
}
