//! Reverse-ETL job: scores active prospects from `dim_accounts` with a local
//! language model and appends the results to `sfdc_account_enrichment`.

use gtm_reverse_etl::config::Config;
use gtm_reverse_etl::enrichment::EnrichmentPipeline;
use gtm_reverse_etl::llm_client::OllamaClient;
use gtm_reverse_etl::warehouse::PgWarehouse;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gtm_reverse_etl=info,ai_lead_scoring=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let scorer = OllamaClient::new(&config.llm)?;
    tracing::info!("✓ LLM client ready: {} (model {})", config.llm.host, scorer.model());

    let warehouse = PgWarehouse::connect(&config.warehouse).await.map_err(|e| {
        tracing::error!("Warehouse connection failed: {}", e);
        e
    })?;
    tracing::info!("✓ Connected to warehouse: {}", config.warehouse.redacted_url());

    let summary = EnrichmentPipeline::new(&warehouse, &scorer, &config.scoring)
        .run()
        .await
        .map_err(|e| {
            tracing::error!("Reverse ETL run aborted: {}", e);
            e
        })?;

    for skip in &summary.skipped {
        tracing::warn!("Skipped {} ({}): {}", skip.company_name, skip.contact_id, skip.reason);
    }

    tracing::info!(
        "Reverse ETL AI pipeline complete: {} fetched, {} scored, {} skipped, {} written in {}s",
        summary.fetched,
        summary.scored(),
        summary.skipped.len(),
        summary.inserted,
        (summary.finished_at - summary.started_at).num_seconds()
    );

    Ok(())
}
