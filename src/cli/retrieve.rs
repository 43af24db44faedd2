use super::key::{determine_key_source, read_encryption_key};
use super::load_config;
use shroud::crypto::IntegrityDigest;
use shroud::ledger::ContributionId;
use shroud::pipeline::ContributionPipeline;
use shroud::storage::ContentReference;

/// Fetch, verify and decrypt a stored contribution
pub async fn execute(
    reference: Option<String>,
    digest: Option<String>,
    contribution_id: Option<u64>,
    config: Option<String>,
    key_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let expected: Option<IntegrityDigest> = digest
        .as_deref()
        .map(str::parse::<IntegrityDigest>)
        .transpose()?;
    let pipeline = ContributionPipeline::from_config(&config)?;
    let key = read_encryption_key(determine_key_source(key_file))?;

    let record = match (reference, contribution_id) {
        (Some(reference), _) => {
            pipeline
                .retrieve(&ContentReference::new(reference), &key, expected)
                .await?
        }
        (None, Some(id)) => pipeline.retrieve_contribution(ContributionId(id), &key).await?,
        (None, None) => return Err("Either --reference or --contribution-id is required".into()),
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
