use anyhow::{Context, Result};

#[zbus::proxy(
    interface = "org.freedesktop.FaceId1",
    default_service = "org.freedesktop.FaceId1",
    default_path = "/org/freedesktop/FaceId1",
    gen_blocking = false
)]
trait FaceId {
    async fn verify(&self) -> zbus::Result<String>;
    async fn verify_probe(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

async fn proxy() -> Result<FaceIdProxy<'static>> {
    let connection = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    FaceIdProxy::new(&connection)
        .await
        .context("faceidd is not reachable")
}

pub async fn verify() -> Result<String> {
    Ok(proxy().await?.verify().await?)
}

pub async fn verify_probe() -> Result<String> {
    Ok(proxy().await?.verify_probe().await?)
}

pub async fn status() -> Result<String> {
    Ok(proxy().await?.status().await?)
}
