use anyhow::Context;

use lotstock_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    lotstock_observability::init_with(&settings.log.filter, settings.log.json);

    let services = lotstock_api::app::services::build_services(&settings)
        .await
        .context("failed to initialize services")?;
    let app = lotstock_api::app::build_app(services);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        environment = %settings.environment,
        "listening on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;
    Ok(())
}
