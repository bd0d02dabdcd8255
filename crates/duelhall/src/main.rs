use duelhall::prelude::*;

#[tokio::main]
async fn main() -> Result<(), DuelError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let remote = JikanCatalog::new(config.jikan_url.clone());
    let animations = WaifuAnimations::new(config.waifu_url.clone());

    let server = DuelServerBuilder::new()
        .config(config)
        .build(remote, animations)
        .await?;
    tracing::info!(addr = %server.local_addr()?, "duelhall ready");

    server.run().await
}
