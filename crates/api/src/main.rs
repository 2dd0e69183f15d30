use std::sync::Arc;

use anyhow::Context;

use labstock_api::app::{build_app, services::AppServices};
use labstock_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    labstock_observability::init_with(config.log_format);

    if config.jwt_secret_is_default {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let services = AppServices::from_config(&config)
        .await
        .context("failed to initialise stores")?;
    let app = build_app(Arc::new(services), config.jwt_secret.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
