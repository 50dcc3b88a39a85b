use myapp_operator::{Operator, OperatorConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = OperatorConfig::from_env()?;
    info!("myapp-operator starting with {:?}", config);

    Operator::new(config).run().await?;
    Ok(())
}
