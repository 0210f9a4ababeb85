//! Warehouse access: named-column bulk inserts, DDL for the landing,
//! analytics and outbound tables, and the [`Warehouse`] seam used by the
//! enrichment orchestrator.

use async_trait::async_trait;
use sqlx::query_builder::Separated;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::config::WarehouseConfig;
use crate::db::Database;
use crate::errors::{AppError, ResultExt};
use crate::models::{Contact, Enrichment, Opportunity, PipelineStage, Prospect, WebVisit};

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;
const MAX_ROWS_PER_STATEMENT: usize = 1_000;

pub const CONTACTS_TABLE: &str = "raw_hubspot_contacts";
pub const WEB_VISITS_TABLE: &str = "raw_hubspot_web_visits";
pub const OPPORTUNITIES_TABLE: &str = "raw_sfdc_opportunities";
pub const ACCOUNTS_VIEW: &str = "dim_accounts";
pub const ENRICHMENT_TABLE: &str = "sfdc_account_enrichment";

/// A record written to a warehouse table.
///
/// Binds are emitted in the order of `COLUMNS`, so a record can never be
/// shifted into the wrong column by tuple position.
pub trait TableRow {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>);
}

impl TableRow for Contact {
    const TABLE: &'static str = CONTACTS_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "contact_id",
        "first_name",
        "last_name",
        "company_name",
        "created_at",
    ];

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.contact_id.to_string())
            .push_bind(self.first_name.clone())
            .push_bind(self.last_name.clone())
            .push_bind(self.company_name.clone())
            .push_bind(self.created_at);
    }
}

impl TableRow for WebVisit {
    const TABLE: &'static str = WEB_VISITS_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "visit_id",
        "contact_id",
        "utm_source",
        "page_visited",
        "visit_timestamp",
    ];

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.visit_id.to_string())
            .push_bind(self.contact_id.to_string())
            .push_bind(self.utm_source.clone())
            .push_bind(self.page_visited.clone())
            .push_bind(self.visit_timestamp);
    }
}

impl TableRow for Opportunity {
    const TABLE: &'static str = OPPORTUNITIES_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "opportunity_id",
        "contact_id",
        "stage",
        "arr_amount",
        "created_date",
        "close_date",
    ];

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.opportunity_id.to_string())
            .push_bind(self.contact_id.to_string())
            .push_bind(self.stage.as_str())
            .push_bind(self.arr_amount.clone())
            .push_bind(self.created_date)
            .push_bind(self.close_date);
    }
}

impl TableRow for Enrichment {
    const TABLE: &'static str = ENRICHMENT_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "contact_id",
        "ai_lead_score",
        "ai_efficiency_pitch",
        "scored_at",
    ];

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.contact_id.clone())
            .push_bind(self.ai_lead_score)
            .push_bind(self.ai_efficiency_pitch.clone())
            .push_bind(self.scored_at);
    }
}

/// Rows per INSERT statement for a record type.
pub(crate) fn rows_per_statement<R: TableRow>() -> usize {
    (MAX_BIND_PARAMS / R::COLUMNS.len()).min(MAX_ROWS_PER_STATEMENT)
}

/// Builds one multi-row INSERT for `rows`. Callers keep `rows` within
/// [`rows_per_statement`].
pub(crate) fn build_insert<R: TableRow>(
    schema: &str,
    rows: &[R],
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {}.{} ({}) ",
        schema,
        R::TABLE,
        R::COLUMNS.join(", ")
    ));
    builder.push_values(rows, |mut row, record| record.bind_columns(&mut row));
    builder
}

/// Bulk-inserts `rows`, chunked below the bind-parameter ceiling.
/// Issues no statement for an empty slice.
pub async fn insert_rows<R: TableRow>(
    conn: &mut PgConnection,
    schema: &str,
    rows: &[R],
) -> Result<u64, AppError> {
    let mut inserted = 0;
    for chunk in rows.chunks(rows_per_statement::<R>()) {
        let result = build_insert(schema, chunk)
            .build()
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Bulk insert into {}.{} failed", schema, R::TABLE))?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

// ============ DDL ============

pub(crate) fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", schema)
}

pub(crate) fn create_raw_tables_sql(schema: &str) -> [String; 3] {
    [
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.{CONTACTS_TABLE} (
                contact_id VARCHAR NOT NULL,
                first_name VARCHAR,
                last_name VARCHAR,
                company_name VARCHAR,
                created_at TIMESTAMPTZ
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.{WEB_VISITS_TABLE} (
                visit_id VARCHAR NOT NULL,
                contact_id VARCHAR NOT NULL,
                utm_source VARCHAR,
                page_visited VARCHAR,
                visit_timestamp TIMESTAMPTZ
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.{OPPORTUNITIES_TABLE} (
                opportunity_id VARCHAR NOT NULL,
                contact_id VARCHAR NOT NULL,
                stage VARCHAR,
                arr_amount NUMERIC(12, 2),
                created_date TIMESTAMPTZ,
                close_date TIMESTAMPTZ
            )
            "#
        ),
    ]
}

pub(crate) fn truncate_raw_tables_sql(schema: &str) -> String {
    format!(
        "TRUNCATE TABLE {schema}.{CONTACTS_TABLE}, {schema}.{WEB_VISITS_TABLE}, {schema}.{OPPORTUNITIES_TABLE}"
    )
}

/// `dim_accounts`: one row per contact with its visit count and the stage of
/// its most recently created opportunity (NULL when it has none).
pub(crate) fn create_accounts_view_sql(raw_schema: &str, analytics_schema: &str) -> String {
    format!(
        r#"
        CREATE OR REPLACE VIEW {analytics_schema}.{ACCOUNTS_VIEW} AS
        SELECT
            c.contact_id,
            c.company_name,
            COALESCE(v.total_web_visits, 0)::BIGINT AS total_web_visits,
            o.stage AS current_pipeline_stage
        FROM {raw_schema}.{CONTACTS_TABLE} c
        LEFT JOIN (
            SELECT contact_id, COUNT(*) AS total_web_visits
            FROM {raw_schema}.{WEB_VISITS_TABLE}
            GROUP BY contact_id
        ) v ON v.contact_id = c.contact_id
        LEFT JOIN LATERAL (
            SELECT op.stage
            FROM {raw_schema}.{OPPORTUNITIES_TABLE} op
            WHERE op.contact_id = c.contact_id
            ORDER BY op.created_date DESC
            LIMIT 1
        ) o ON TRUE
        "#
    )
}

pub(crate) fn create_enrichment_table_sql(schema: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}.{ENRICHMENT_TABLE} (
            contact_id VARCHAR NOT NULL,
            ai_lead_score INT NOT NULL,
            ai_efficiency_pitch VARCHAR NOT NULL,
            scored_at TIMESTAMPTZ NOT NULL
        )
        "#
    )
}

pub(crate) fn select_prospects_sql(analytics_schema: &str) -> String {
    format!(
        r#"
        SELECT
            contact_id,
            company_name,
            total_web_visits::BIGINT AS web_visit_count,
            current_pipeline_stage AS pipeline_stage
        FROM {analytics_schema}.{ACCOUNTS_VIEW}
        WHERE current_pipeline_stage = ANY($1)
        LIMIT $2
        "#
    )
}

// ============ Orchestrator seam ============

/// Warehouse operations the enrichment orchestrator needs.
///
/// Every error is fatal for the run.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Up to `limit` prospects whose stage is in `stages`.
    async fn fetch_prospects(
        &self,
        stages: &[PipelineStage],
        limit: u32,
    ) -> Result<Vec<Prospect>, AppError>;

    /// Idempotently creates the outbound schema and enrichment table.
    async fn ensure_enrichment_table(&self) -> Result<(), AppError>;

    /// Appends `rows` in one committed batch; returns rows inserted.
    async fn insert_enrichments(&self, rows: &[Enrichment]) -> Result<u64, AppError>;

    async fn close(&self);
}

/// [`Warehouse`] backed by a Postgres connection.
pub struct PgWarehouse {
    db: Database,
    config: WarehouseConfig,
}

impl PgWarehouse {
    pub async fn connect(config: &WarehouseConfig) -> Result<Self, AppError> {
        let db = Database::connect(config).await?;
        Ok(Self {
            db,
            config: config.clone(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn fetch_prospects(
        &self,
        stages: &[PipelineStage],
        limit: u32,
    ) -> Result<Vec<Prospect>, AppError> {
        let stage_names: Vec<String> = stages.iter().map(|s| s.as_str().to_string()).collect();

        sqlx::query_as::<_, Prospect>(&select_prospects_sql(&self.config.analytics_schema))
            .bind(stage_names)
            .bind(i64::from(limit))
            .fetch_all(&self.db.pool)
            .await
            .context("Failed to fetch prospects from dim_accounts")
    }

    async fn ensure_enrichment_table(&self) -> Result<(), AppError> {
        self.db
            .execute(&create_schema_sql(&self.config.outbound_schema))
            .await?;
        self.db
            .execute(&create_enrichment_table_sql(&self.config.outbound_schema))
            .await?;
        Ok(())
    }

    async fn insert_enrichments(&self, rows: &[Enrichment]) -> Result<u64, AppError> {
        let mut tx = self.db.begin().await?;
        let inserted = insert_rows(&mut tx, &self.config.outbound_schema, rows).await?;
        tx.commit()
            .await
            .context("Failed to commit enrichment batch")?;
        Ok(inserted)
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
