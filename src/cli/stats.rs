use super::load_config;
use shroud::pipeline::ContributionPipeline;

/// Print aggregate counts from the ledger
pub async fn execute(config: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let pipeline = ContributionPipeline::from_config(&config)?;

    let stats = pipeline.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stats_on_memory_ledger() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "[ledger]\nbackend = \"memory\"\n").unwrap();

        execute(Some(config.display().to_string())).await.unwrap();
    }
}
