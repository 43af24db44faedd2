use super::key::{determine_key_source, read_encryption_key};
use super::load_config;
use shroud::ledger::LedgerMode;
use shroud::pipeline::ContributionPipeline;
use shroud::record::RawRecord;
use shroud::storage::Durability;
use std::io::Read;

/// Anonymize, encrypt, store and submit one record, then wait for finality
pub async fn execute(
    category: String,
    record: String,
    config: Option<String>,
    key_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let raw = read_record(&record)?;
    let key = read_encryption_key(determine_key_source(key_file))?;

    let pipeline = ContributionPipeline::from_config(&config)?;
    let result = match pipeline.submit(&raw, &category, &key).await {
        Ok(result) => result,
        Err(e) => {
            if let Some(id) = e.confirmation_id() {
                eprintln!("Confirmation id: {}", id);
                if e.is_retryable() {
                    eprintln!("Poll again with: shroud confirm --confirmation-id {}", id);
                }
            }
            return Err(e.into());
        }
    };

    if result.durability == Durability::Ephemeral {
        eprintln!("⚠️  Stored in an ephemeral blob store; content is gone when this process exits");
    }
    if result.ledger == LedgerMode::Simulated {
        eprintln!("⚠️  Finalized by a simulated in-process ledger; contribution id and reward are not on chain");
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Read a JSON record object from a file, or stdin for "-"
fn read_record(source: &str) -> Result<RawRecord, Box<dyn std::error::Error>> {
    let json = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| format!("Failed to read record file '{}': {}", source, e))?
    };

    RawRecord::from_json(&json).map_err(|e| format!("Record is not a JSON object: {}", e).into())
}
