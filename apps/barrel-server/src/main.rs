//! Barrel server binary.
//!
//! Boots the filesystem store, applies bucket presets, and serves the S3
//! pipeline over HTTP (or HTTPS when `--key`/`--cert` are given). Exits 0 on
//! a clean shutdown and 1 when startup fails.

mod cli;

use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use barrel_core::config::BucketPreset;
use barrel_core::store::SubresourceKind;
use barrel_core::{FilesystemStore, ServiceConfig, cors, website};
use barrel_http::{S3Service, ServiceState};
use barrel_model::types::{CorsConfiguration, WebsiteConfiguration};
use barrel_xml::{from_xml, root_element_name};

use crate::cli::Cli;

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--silent` lowers the default filter
/// from `info` to `error`.
fn init_tracing(silent: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let default = if silent { "error" } else { "info" };
        EnvFilter::try_new(default).context("invalid log filter")?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Open the store and apply bucket presets.
async fn bootstrap(config: ServiceConfig) -> Result<Arc<ServiceState>> {
    let store = FilesystemStore::open(&config.directory)
        .await
        .with_context(|| format!("cannot open data directory {}", config.directory.display()))?;

    for preset in &config.configure_buckets {
        configure_bucket(&store, preset)
            .await
            .with_context(|| format!("failed to configure bucket {}", preset.name))?;
    }

    Ok(Arc::new(ServiceState::new(store, config)))
}

/// Create a preset bucket and ingest its config documents.
async fn configure_bucket(store: &FilesystemStore, preset: &BucketPreset) -> Result<()> {
    store.create_bucket(&preset.name).await?;
    info!(bucket = %preset.name, "created preconfigured bucket");

    for path in &preset.config_files {
        let xml = tokio::fs::read(path)
            .await
            .with_context(|| format!("cannot read config file {}", path.display()))?;

        match root_element_name(&xml)?.as_str() {
            "CORSConfiguration" => {
                let config: CorsConfiguration = from_xml(&xml)?;
                cors::validate_config(&config).map_err(|err| anyhow::anyhow!("{err}"))?;
                store
                    .put_subresource(
                        &preset.name,
                        None,
                        SubresourceKind::Cors,
                        &String::from_utf8_lossy(&xml),
                    )
                    .await?;
                info!(bucket = %preset.name, file = %path.display(), "applied CORS configuration");
            }
            "WebsiteConfiguration" => {
                let config: WebsiteConfiguration = from_xml(&xml)?;
                website::validate_config(&config).map_err(|err| anyhow::anyhow!("{err}"))?;
                store
                    .put_subresource(
                        &preset.name,
                        None,
                        SubresourceKind::Website,
                        &String::from_utf8_lossy(&xml),
                    )
                    .await?;
                info!(bucket = %preset.name, file = %path.display(), "applied website configuration");
            }
            other => bail!("unsupported bucket configuration document: <{other}>"),
        }
    }

    Ok(())
}

/// Build the TLS acceptor from PEM key and certificate files.
fn build_tls_acceptor(config: &ServiceConfig) -> Result<Option<TlsAcceptor>> {
    let (Some(key_path), Some(cert_path)) = (&config.key_path, &config.cert_path) else {
        return Ok(None);
    };

    let certs = rustls_pemfile::certs(&mut BufReader::new(
        std::fs::File::open(cert_path)
            .with_context(|| format!("cannot read certificate {}", cert_path.display()))?,
    ))
    .collect::<Result<Vec<_>, _>>()
    .context("invalid certificate file")?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(
        std::fs::File::open(key_path)
            .with_context(|| format!("cannot read private key {}", key_path.display()))?,
    ))
    .context("invalid private key file")?
    .context("no private key found in key file")?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("certificate/key pair rejected")?;

    Ok(Some(TlsAcceptor::from(Arc::new(tls_config))))
}

/// Accept connections until ctrl-c, then drain gracefully.
async fn serve(state: Arc<ServiceState>) -> Result<()> {
    let bind_target = state.config.bind_target();
    let listener = TcpListener::bind(&bind_target)
        .await
        .with_context(|| format!("failed to bind to {bind_target}"))?;
    let tls = build_tls_acceptor(&state.config)?;

    info!(
        address = %bind_target,
        scheme = state.scheme(),
        endpoint = %state.config.service_endpoint,
        "barrel is listening",
    );

    let service = S3Service::new(state);
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.with_remote_ip(peer_addr.ip().to_string());
                match &tls {
                    Some(acceptor) => {
                        let acceptor = acceptor.clone();
                        let http = http.clone();
                        let watcher = graceful.watcher();
                        tokio::spawn(async move {
                            let tls_stream = match acceptor.accept(stream).await {
                                Ok(s) => s,
                                Err(e) => {
                                    warn!(peer_addr = %peer_addr, error = %e, "TLS handshake failed");
                                    return;
                                }
                            };
                            let conn = http.serve_connection(TokioIo::new(tls_stream), svc);
                            if let Err(e) = watcher.watch(conn.into_owned()).await {
                                error!(peer_addr = %peer_addr, error = %e, "connection error");
                            }
                        });
                    }
                    None => {
                        let conn = http.serve_connection(TokioIo::new(stream), svc);
                        let conn = graceful.watch(conn.into_owned());
                        tokio::spawn(async move {
                            if let Err(e) = conn.await {
                                error!(peer_addr = %peer_addr, error = %e, "connection error");
                            }
                        });
                    }
                }
            }

            () = &mut shutdown => {
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.silent)?;

    let config = cli.into_config();
    let state = match bootstrap(config).await {
        Ok(state) => state,
        Err(err) => {
            error!(error = %err, "startup failed");
            return Err(err);
        }
    };

    serve(state).await
}
