use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Pipeline ============

/// Sales-funnel position as spelled in the CRM and the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    #[serde(rename = "Prospecting")]
    Prospecting,
    #[serde(rename = "Qualification")]
    Qualification,
    #[serde(rename = "Pilot Program")]
    PilotProgram,
    #[serde(rename = "Closed Won")]
    ClosedWon,
    #[serde(rename = "Closed Lost")]
    ClosedLost,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Prospecting,
        PipelineStage::Qualification,
        PipelineStage::PilotProgram,
        PipelineStage::ClosedWon,
        PipelineStage::ClosedLost,
    ];

    /// Warehouse spelling of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Prospecting => "Prospecting",
            PipelineStage::Qualification => "Qualification",
            PipelineStage::PilotProgram => "Pilot Program",
            PipelineStage::ClosedWon => "Closed Won",
            PipelineStage::ClosedLost => "Closed Lost",
        }
    }

    /// Closed opportunities carry a close date.
    pub fn is_closed(&self) -> bool {
        matches!(self, PipelineStage::ClosedWon | PipelineStage::ClosedLost)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage text that does not match any known [`PipelineStage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pipeline stage '{}'", self.0)
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for PipelineStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s.trim())
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

impl TryFrom<String> for PipelineStage {
    type Error = UnknownStage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============ Reverse ETL ============

/// Account snapshot read from `dim_accounts`. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Prospect {
    pub contact_id: String,
    pub company_name: String,
    pub web_visit_count: i64,
    #[sqlx(try_from = "String")]
    pub pipeline_stage: PipelineStage,
}

/// Strict JSON payload the model must return.
///
/// Score is expected in [1,100] but is kept exactly as returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: i32,
    pub pitch: String,
}

/// One row of `sfdc_account_enrichment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub contact_id: String,
    pub ai_lead_score: i32,
    pub ai_efficiency_pitch: String,
    pub scored_at: DateTime<Utc>,
}

impl Enrichment {
    pub fn from_score(prospect: &Prospect, result: ScoreResult, scored_at: DateTime<Utc>) -> Self {
        Self {
            contact_id: prospect.contact_id.clone(),
            ai_lead_score: result.score,
            ai_efficiency_pitch: result.pitch,
            scored_at,
        }
    }
}

// ============ Raw GTM records ============

/// HubSpot contact landing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub contact_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub created_at: DateTime<Utc>,
}

/// HubSpot web visit landing row.
#[derive(Debug, Clone, PartialEq)]
pub struct WebVisit {
    pub visit_id: Uuid,
    pub contact_id: Uuid,
    pub utm_source: String,
    pub page_visited: String,
    pub visit_timestamp: DateTime<Utc>,
}

/// Salesforce opportunity landing row.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    pub opportunity_id: Uuid,
    pub contact_id: Uuid,
    pub stage: PipelineStage,
    /// Annual value of the commuter subsidy contract.
    pub arr_amount: BigDecimal,
    pub created_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_round_trips_warehouse_spelling() {
        for stage in PipelineStage::ALL {
            assert_eq!(stage.as_str().parse::<PipelineStage>().unwrap(), stage);
        }
        assert_eq!(
            "Pilot Program".parse::<PipelineStage>().unwrap(),
            PipelineStage::PilotProgram
        );
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let err = PipelineStage::try_from("Negotiation".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "unknown pipeline stage 'Negotiation'");
        assert!("prospecting".parse::<PipelineStage>().is_err());
    }

    #[test]
    fn test_stage_serde_uses_display_names() {
        let json = serde_json::to_string(&PipelineStage::ClosedWon).unwrap();
        assert_eq!(json, "\"Closed Won\"");
        let stage: PipelineStage = serde_json::from_str("\"Qualification\"").unwrap();
        assert_eq!(stage, PipelineStage::Qualification);
    }

    #[test]
    fn test_only_closed_stages_are_closed() {
        let closed: Vec<_> = PipelineStage::ALL
            .into_iter()
            .filter(PipelineStage::is_closed)
            .collect();
        assert_eq!(
            closed,
            vec![PipelineStage::ClosedWon, PipelineStage::ClosedLost]
        );
    }

    #[test]
    fn test_score_result_requires_both_keys() {
        let ok: ScoreResult = serde_json::from_str(r#"{"score": 73, "pitch": "x"}"#).unwrap();
        assert_eq!(ok.score, 73);
        assert!(serde_json::from_str::<ScoreResult>(r#"{"pitch": "x"}"#).is_err());
        assert!(serde_json::from_str::<ScoreResult>(r#"{"score": 12}"#).is_err());
        assert!(serde_json::from_str::<ScoreResult>(r#"{"score": "high", "pitch": "x"}"#).is_err());
    }

    #[test]
    fn test_enrichment_keeps_score_as_returned() {
        let prospect = Prospect {
            contact_id: "c9".to_string(),
            company_name: "Delta Deli".to_string(),
            web_visit_count: 2,
            pipeline_stage: PipelineStage::Prospecting,
        };
        let now = Utc::now();
        let enrichment = Enrichment::from_score(
            &prospect,
            ScoreResult {
                score: 140,
                pitch: "Cut commute costs.".to_string(),
            },
            now,
        );
        assert_eq!(enrichment.contact_id, "c9");
        assert_eq!(enrichment.ai_lead_score, 140);
        assert_eq!(enrichment.ai_efficiency_pitch, "Cut commute costs.");
        assert_eq!(enrichment.scored_at, now);
    }
}
