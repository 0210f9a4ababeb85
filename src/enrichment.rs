//! Reverse-ETL lead scoring workflow
//!
//! 1. Fetch up to N eligible prospects from `dim_accounts`
//! 2. Ensure the outbound enrichment table exists
//! 3. Score each prospect with the language model, one at a time
//! 4. Bulk-insert the successful enrichments in one committed batch
//! 5. Close the warehouse connection

use crate::config::ScoringConfig;
use crate::errors::{AppError, ScoringError};
use crate::llm_client::LeadScorer;
use crate::models::{Enrichment, Prospect};
use crate::prompt::build_scoring_prompt;
use crate::warehouse::Warehouse;
use chrono::{DateTime, Utc};

/// A prospect that could not be scored in this run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedProspect {
    pub contact_id: String,
    pub company_name: String,
    pub reason: ScoringError,
}

/// Outcome of scoring a single prospect.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Scored(Enrichment),
    Skipped(SkippedProspect),
}

/// Result of one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub fetched: usize,
    pub enrichments: Vec<Enrichment>,
    pub skipped: Vec<SkippedProspect>,
    /// Rows written by the bulk insert (0 when nothing was scored).
    pub inserted: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn scored(&self) -> usize {
        self.enrichments.len()
    }
}

/// Sequential scoring pipeline over a [`Warehouse`] and a [`LeadScorer`].
pub struct EnrichmentPipeline<'a, W: Warehouse, S: LeadScorer> {
    warehouse: &'a W,
    scorer: &'a S,
    config: &'a ScoringConfig,
}

impl<'a, W: Warehouse, S: LeadScorer> EnrichmentPipeline<'a, W, S> {
    pub fn new(warehouse: &'a W, scorer: &'a S, config: &'a ScoringConfig) -> Self {
        Self {
            warehouse,
            scorer,
            config,
        }
    }

    /// Runs the workflow and closes the warehouse connection, on success and
    /// on fatal errors alike.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let result = self.execute().await;
        self.warehouse.close().await;
        result
    }

    async fn execute(&self) -> Result<RunSummary, AppError> {
        let started_at = Utc::now();

        tracing::info!("Step 1: Fetching active prospects from dim_accounts");
        let mut prospects = self
            .warehouse
            .fetch_prospects(&self.config.allowed_stages, self.config.batch_limit)
            .await?;
        prospects.truncate(self.config.batch_limit as usize);
        let fetched = prospects.len();
        tracing::info!("Fetched {} prospect(s)", fetched);

        tracing::info!("Step 2: Ensuring enrichment table exists");
        self.warehouse.ensure_enrichment_table().await?;

        tracing::info!("Step 3: Scoring {} prospect(s) with the LLM", fetched);
        let mut enrichments = Vec::with_capacity(fetched);
        let mut skipped = Vec::new();
        for prospect in &prospects {
            match self.score_prospect(prospect).await {
                RowOutcome::Scored(enrichment) => enrichments.push(enrichment),
                RowOutcome::Skipped(skip) => skipped.push(skip),
            }
        }

        let inserted = if enrichments.is_empty() {
            tracing::info!("Step 4: No enrichments to write");
            0
        } else {
            tracing::info!(
                "Step 4: Pushing {} enrichment(s) back to the warehouse",
                enrichments.len()
            );
            self.warehouse.insert_enrichments(&enrichments).await?
        };

        Ok(RunSummary {
            fetched,
            enrichments,
            skipped,
            inserted,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Builds the prompt and makes exactly one scoring call.
    pub async fn score_prospect(&self, prospect: &Prospect) -> RowOutcome {
        let prompt = build_scoring_prompt(prospect);

        match self.scorer.score(&prompt).await {
            Ok(result) => {
                tracing::info!("Scored {}: {}", prospect.company_name, result.score);
                RowOutcome::Scored(Enrichment::from_score(prospect, result, Utc::now()))
            }
            Err(reason) => {
                tracing::warn!(
                    "Failed to score {} ({}): {}",
                    prospect.company_name,
                    prospect.contact_id,
                    reason
                );
                RowOutcome::Skipped(SkippedProspect {
                    contact_id: prospect.contact_id.clone(),
                    company_name: prospect.company_name.clone(),
                    reason,
                })
            }
        }
    }
}
