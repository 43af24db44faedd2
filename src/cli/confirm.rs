use super::load_config;
use shroud::config::parse_duration;
use shroud::ledger::{ConfirmationId, LedgerMode};
use shroud::pipeline::ContributionPipeline;

/// Poll the ledger for a previously accepted submission; never resubmits
pub async fn execute(
    confirmation_id: String,
    config: Option<String>,
    timeout: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;

    let mut pipeline = ContributionPipeline::from_config(&config)?;
    if let Some(timeout) = timeout {
        pipeline = pipeline.with_confirmation_timeout(parse_duration(&timeout)?);
    }

    if pipeline.ledger().mode() == LedgerMode::Simulated {
        eprintln!("⚠️  Polling a simulated in-process ledger; it only knows submissions made by this process");
    }

    let result = pipeline
        .await_confirmation(&ConfirmationId::new(confirmation_id))
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
