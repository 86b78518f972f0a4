use anyhow::Context;

use storefront_infra::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    storefront_observability::init(settings.log_format);

    let services = storefront_api::app::services::build_services(&settings)
        .await
        .context("failed to initialise order storage")?;
    let app = storefront_api::app::build_app(&settings, services);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
