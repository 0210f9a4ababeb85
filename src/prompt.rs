//! Scoring prompt template.
//!
//! The heuristic (stage and visit weighting) is described to the model in
//! prose only. Nothing here computes or checks a score.

use crate::models::Prospect;

/// Builds the lead-scoring prompt for one prospect.
pub fn build_scoring_prompt(prospect: &Prospect) -> String {
    format!(
        r#"You are an expert B2B SaaS Sales Analyst for a sustainable transportation platform.
Analyze the following prospect:
- Contact ID: {contact_id}
- Company: {company}
- Behavioral Data: {visits} recent website visits.
- Pipeline Stage: {stage}

Task:
1. Calculate a dynamic Lead Score (1-100). Do NOT use a hardcoded number.
   - Give a higher base score if the stage is 'Qualification' vs 'Prospecting'.
   - Add 5 points for every recent website visit.
2. Write exactly one sentence as a sales hook for the rep, focusing on bridging operational efficiency gaps and sustainable commuting.

Output strictly as JSON with exactly two keys: {{"score": integer, "pitch": "string"}}"#,
        contact_id = prospect.contact_id,
        company = prospect.company_name,
        visits = prospect.web_visit_count,
        stage = prospect.pipeline_stage,
    )
}
