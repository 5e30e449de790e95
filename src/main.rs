use std::sync::Arc;

use anyhow::Context;

mod config;
mod error;
mod extract;
mod models;
mod routes;
mod source;
mod summarize;
#[cfg(test)]
mod test_support;

use config::Config;
use routes::AppState;
use source::Resolver;
use summarize::Gateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Fail at startup, not per request, when the credential is missing.
    let config = Config::from_env()?;

    let state = AppState {
        resolver: Arc::new(Resolver::new(&config).context("failed to build fetch client")?),
        gateway: Arc::new(Gateway::new(&config).context("failed to build OpenAI client")?),
    };
    let app = routes::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(model = %config.openai_model, "listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
