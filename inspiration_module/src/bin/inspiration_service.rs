use inspiration_module::service::{run_server, ServiceConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_target(false).init();
    dotenvy::dotenv().ok();

    let config = ServiceConfig::from_env()?;
    info!(
        "starting inspiration service store={:?} data_root={} temp_dir={}",
        config.store_kind,
        config.data_root.display(),
        config.temp_dir.display()
    );

    run_server(config, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    })
    .await
}
