mod cli;
mod config;
mod disk_volume;
mod fileserver;
mod runtime;
mod syncer;
mod tcp_transport;

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use log::info;

use cli::DaemonArgs;
use disk_volume::DiskVolume;
use fileserver::HttpUploadUrlMinter;
use runtime::{build_price_formula, load_runtime};
use syncer::Syncer;
use tcp_transport::TcpTransport;

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonArgs::parse();
    let runtime = load_runtime(&args).await?;
    init_logging(runtime.debug);

    info!("starting node '{}' with volume {}", runtime.name, runtime.volume_root.display());

    let volume = Arc::new(
        DiskVolume::open(runtime.volume_root.clone())
            .await
            .wrap_err("failed to open volume")?,
    );
    info!("volume id: {}", volume.id());

    let transport = TcpTransport::new(runtime.name.clone(), runtime.peers.clone());
    transport
        .listen(runtime.bind_port)
        .await
        .wrap_err("failed to start tcp transport listener")?;
    info!("tcp transport listening on port {}", runtime.bind_port);

    let formula = build_price_formula(&runtime.price);
    let url_minter = Arc::new(HttpUploadUrlMinter {
        addr: runtime.http_addr.clone(),
        port: runtime.http_port,
        volume_id: volume.id().to_string(),
    });

    let syncer = Syncer::start(
        &runtime.http_addr,
        runtime.http_port,
        volume,
        transport,
        formula,
        url_minter,
    )
    .await?;

    wait_for_shutdown_signal().await;
    info!("shutting down");
    syncer.stop().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
