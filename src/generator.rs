//! Synthetic GTM data: HubSpot contacts and web visits plus Salesforce
//! opportunities for a sustainable-commuting partnership program.

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::config::WarehouseConfig;
use crate::db::{execute_on, Database};
use crate::errors::{AppError, ResultExt};
use crate::models::{Contact, Opportunity, PipelineStage, WebVisit};
use crate::warehouse::{
    create_accounts_view_sql, create_raw_tables_sql, create_schema_sql, insert_rows,
    truncate_raw_tables_sql,
};

pub const UTM_SOURCES: [&str; 5] = [
    "LinkedIn B2B",
    "Local Chamber of Commerce",
    "Google Ads (Eco)",
    "Direct",
    "Partner Referral",
];

pub const PAGES: [&str; 4] = [
    "/corporate-partnerships",
    "/co2-impact-calculator",
    "/carpool-subsidy-pricing",
    "/book-demo",
];

pub const INSTITUTION_TYPES: [&str; 4] = [
    "University",
    "Corporate Office",
    "Hospital System",
    "Large Restaurant Group",
];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Priya", "Mateo", "Chen", "Fatima", "Liam", "Sofia", "Noah", "Amara",
    "Diego", "Hana", "Elena", "Kwame", "Ingrid", "Omar",
];

const LAST_NAMES: [&str; 16] = [
    "Nguyen", "Okafor", "Schmidt", "Garcia", "Patel", "Kowalski", "Haddad", "Murphy", "Silva",
    "Tanaka", "Johansson", "Reyes", "Cohen", "Mensah", "Dubois", "Larsen",
];

const CITIES: [&str; 16] = [
    "Springfield", "Riverton", "Lakewood", "Fairview", "Georgetown", "Ashland", "Milford",
    "Clayton", "Dayton", "Franklin", "Greenville", "Kingston", "Madison", "Oakdale", "Salem",
    "Winchester",
];

const OPPORTUNITY_PROBABILITY: f64 = 0.40;
const MAX_VISITS_PER_CONTACT: u32 = 5;
const VISIT_WINDOW_DAYS: i64 = 30;
const CREATED_WINDOW_SECS: i64 = 365 * 24 * 60 * 60;
/// ARR bounds in cents: 5,000.00 to 50,000.00.
const ARR_CENTS_RANGE: std::ops::RangeInclusive<i64> = 500_000..=5_000_000;

/// One generated batch, ready to load.
#[derive(Debug, Clone, Default)]
pub struct MockBatch {
    pub contacts: Vec<Contact>,
    pub web_visits: Vec<WebVisit>,
    pub opportunities: Vec<Opportunity>,
}

/// Rows written by [`load_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub contacts: u64,
    pub web_visits: u64,
    pub opportunities: u64,
}

/// Generates `contact_count` contacts with their visits and opportunities.
///
/// Pure function of `rng` and `now`; a seeded RNG gives a reproducible batch.
pub fn generate_batch<R: Rng + ?Sized>(
    rng: &mut R,
    now: DateTime<Utc>,
    contact_count: usize,
) -> MockBatch {
    let mut batch = MockBatch::default();

    for _ in 0..contact_count {
        let contact_id = random_uuid(rng);
        let created_at = now - Duration::seconds(rng.gen_range(0..=CREATED_WINDOW_SECS));

        batch.contacts.push(Contact {
            contact_id,
            first_name: pick(rng, &FIRST_NAMES).to_string(),
            last_name: pick(rng, &LAST_NAMES).to_string(),
            company_name: format!("{} {}", pick(rng, &CITIES), pick(rng, &INSTITUTION_TYPES)),
            created_at,
        });

        for _ in 0..rng.gen_range(1..=MAX_VISITS_PER_CONTACT) {
            batch.web_visits.push(WebVisit {
                visit_id: random_uuid(rng),
                contact_id,
                utm_source: pick(rng, &UTM_SOURCES).to_string(),
                page_visited: pick(rng, &PAGES).to_string(),
                visit_timestamp: created_at + Duration::days(rng.gen_range(0..=VISIT_WINDOW_DAYS)),
            });
        }

        if rng.gen_bool(OPPORTUNITY_PROBABILITY) {
            let stage = *pick(rng, &PipelineStage::ALL);
            let created_date = created_at + Duration::days(rng.gen_range(5..=45));
            let close_date = stage
                .is_closed()
                .then(|| created_date + Duration::days(rng.gen_range(10..=90)));
            let arr_cents: i64 = rng.gen_range(ARR_CENTS_RANGE);

            batch.opportunities.push(Opportunity {
                opportunity_id: random_uuid(rng),
                contact_id,
                stage,
                arr_amount: BigDecimal::new(BigInt::from(arr_cents), 2),
                created_date,
                close_date,
            });
        }
    }

    batch
}

fn pick<'a, R: Rng + ?Sized, T>(rng: &mut R, items: &'a [T]) -> &'a T {
    // Every caller passes a non-empty constant table.
    &items[rng.gen_range(0..items.len())]
}

fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid()
}

/// Recreates the landing tables' contents from `batch` and refreshes
/// `dim_accounts`, all in one transaction.
pub async fn load_batch(
    db: &Database,
    config: &WarehouseConfig,
    batch: &MockBatch,
) -> Result<LoadSummary, AppError> {
    let mut tx = db.begin().await?;

    tracing::info!("Creating landing tables in schema {}", config.raw_schema);
    execute_on(&mut tx, &create_schema_sql(&config.raw_schema)).await?;
    execute_on(&mut tx, &create_schema_sql(&config.analytics_schema)).await?;
    for sql in create_raw_tables_sql(&config.raw_schema) {
        execute_on(&mut tx, &sql).await?;
    }

    // Clear old data so the generator can be rerun safely
    execute_on(&mut tx, &truncate_raw_tables_sql(&config.raw_schema)).await?;

    tracing::info!("Inserting mock GTM data into the warehouse...");
    let summary = LoadSummary {
        contacts: insert_rows(&mut tx, &config.raw_schema, &batch.contacts).await?,
        web_visits: insert_rows(&mut tx, &config.raw_schema, &batch.web_visits).await?,
        opportunities: insert_rows(&mut tx, &config.raw_schema, &batch.opportunities).await?,
    };

    tracing::info!("Refreshing {}.dim_accounts", config.analytics_schema);
    execute_on(
        &mut tx,
        &create_accounts_view_sql(&config.raw_schema, &config.analytics_schema),
    )
    .await?;

    tx.commit().await.context("Failed to commit mock data load")?;

    Ok(summary)
}
