use anyhow::{Context, Result};
use clap::Parser;
use screenloom::{
    create_router, AppState, Config, DeviceProvider, ExportStage, SessionOrchestrator,
    SyntheticDevices,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "screenloom", version, about = "Screen recorder with webcam overlay")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/screenloom")]
    config: String,

    /// Use generated screen, camera and audio instead of hardware
    #[arg(long)]
    synthetic: bool,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

fn devices(synthetic: bool) -> Arc<dyn DeviceProvider> {
    if synthetic {
        return Arc::new(SyntheticDevices::default());
    }

    #[cfg(feature = "native-devices")]
    {
        Arc::new(screenloom::devices::NativeDevices::new())
    }

    #[cfg(not(feature = "native-devices"))]
    {
        warn!("Built without native-devices; using synthetic devices");
        Arc::new(SyntheticDevices::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    let settings = cfg.recorder_settings();

    info!("screenloom v{}", env!("CARGO_PKG_VERSION"));
    info!("Recordings: {}", settings.output_dir.display());
    info!(
        "Defaults: {} fps, webcam {}px {}, {:?} pacing",
        settings.fps, settings.webcam.size, settings.webcam.position, settings.pacing
    );

    let devices = devices(args.synthetic);
    info!("Capture devices: {}", devices.name());

    let exporter = ExportStage::ffmpeg(
        &cfg.ffmpeg.binary,
        Duration::from_secs(cfg.ffmpeg.mux_timeout_secs),
    );
    let recorder = SessionOrchestrator::new(settings, devices, exporter);
    let app = create_router(AppState::new(recorder));

    let port = args.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{}:{}", cfg.service.http.bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}
