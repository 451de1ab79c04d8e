use anyhow::{Context, Result};
use script_executor::Config;
use tracing::info;

pub async fn run(config: &Config, name: &str) -> Result<i32> {
    let command = config
        .command(name)
        .with_context(|| format!("Failed to resolve script '{}'", name))?;

    info!(script = name, "running configured script");
    super::supervise(command).await
}
