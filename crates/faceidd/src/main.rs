use anyhow::{Context, Result};
use faceid_core::Config;
use tracing_subscriber::EnvFilter;

mod dbus_interface;
mod engine;

const BUS_NAME: &str = "org.freedesktop.FaceId1";
const OBJECT_PATH: &str = "/org/freedesktop/FaceId1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("faceidd starting");

    let config = Config::load().context("failed to load configuration")?;
    tracing::info!(
        model = %config.model_path.display(),
        gallery = %config.gallery_dir.display(),
        probe = %config.probe_path.display(),
        detection_threshold = config.thresholds.detection,
        verification_threshold = config.thresholds.verification,
        "configuration loaded"
    );

    let (engine, model) = engine::spawn_engine(&config).context("failed to start engine")?;

    let service = dbus_interface::FaceIdService {
        engine,
        model,
        gallery_dir: config.gallery_dir.clone(),
        probe_path: config.probe_path.clone(),
        thresholds: config.thresholds,
    };

    let _connection = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on the session bus")?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "faceidd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("faceidd shutting down");

    Ok(())
}
