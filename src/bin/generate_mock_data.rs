//! Loads a fresh batch of synthetic GTM data into the warehouse landing tables
//! and refreshes the `dim_accounts` view.

use chrono::Utc;
use gtm_reverse_etl::config::Config;
use gtm_reverse_etl::db::Database;
use gtm_reverse_etl::generator::{generate_batch, load_batch};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gtm_reverse_etl=info,generate_mock_data=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = Database::connect(&config.warehouse).await?;
    tracing::info!("Connected to warehouse: {}", config.warehouse.redacted_url());

    let mut rng = match config.generator.seed {
        Some(seed) => {
            tracing::info!("Using fixed seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    tracing::info!(
        "Generating mock GTM data for {} contacts...",
        config.generator.contact_count
    );
    let batch = generate_batch(&mut rng, Utc::now(), config.generator.contact_count);

    let result = load_batch(&db, &config.warehouse, &batch).await;
    db.close().await;

    let summary = result.map_err(|e| {
        tracing::error!("Mock data load failed: {}", e);
        e
    })?;

    tracing::info!(
        "Data loaded successfully! {} contacts, {} web visits, {} opportunities",
        summary.contacts,
        summary.web_visits,
        summary.opportunities
    );

    Ok(())
}
