use shroud::config::{default_blob_path, default_config_path, PipelineConfig};
use std::path::PathBuf;

/// Write a commented default configuration file
pub fn execute(
    path: Option<String>,
    blob_path: Option<String>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(default_config_path);
    let blob_path = blob_path.map(PathBuf::from).unwrap_or_else(default_blob_path);

    if config_path.exists() && !force {
        return Err(format!(
            "Config file already exists: {} (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }

    PipelineConfig::create_default(&config_path, &blob_path)?;

    println!("✅ Wrote {}", config_path.display());
    println!("   Blob store: {}", blob_path.display());
    println!("   Ledger: in-process mock (set [ledger] backend = \"json-rpc\" for a real ledger)");
    Ok(())
}
