/// Property-based tests using proptest
/// Invariants of the prompt, the score parser and the generator
use chrono::{Duration, TimeZone, Utc};
use gtm_reverse_etl::generator::generate_batch;
use gtm_reverse_etl::llm_client::parse_score_payload;
use gtm_reverse_etl::models::{PipelineStage, Prospect};
use gtm_reverse_etl::prompt::build_scoring_prompt;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn stage_strategy() -> impl Strategy<Value = PipelineStage> {
    prop::sample::select(PipelineStage::ALL.to_vec())
}

// Property: the prompt always carries every prospect field verbatim
proptest! {
    #[test]
    fn prompt_contains_prospect_fields(
        contact_id in "[a-f0-9-]{1,36}",
        company in "[A-Za-z ]{1,40}",
        visits in 0i64..1000,
        stage in stage_strategy()
    ) {
        let prospect = Prospect {
            contact_id: contact_id.clone(),
            company_name: company.clone(),
            web_visit_count: visits,
            pipeline_stage: stage,
        };
        let prompt = build_scoring_prompt(&prospect);

        let contact_line = format!("Contact ID: {}", contact_id);
        let company_line = format!("Company: {}", company);
        let visits_line = format!("{} recent website visits", visits);
        let stage_line = format!("Pipeline Stage: {}", stage);
        prop_assert!(prompt.contains(&contact_line));
        prop_assert!(prompt.contains(&company_line));
        prop_assert!(prompt.contains(&visits_line));
        prop_assert!(prompt.contains(&stage_line));
    }
}

// Property: score parsing never panics and keeps whatever integer it was given
proptest! {
    #[test]
    fn score_parsing_never_panics(content in "\\PC*") {
        let _ = parse_score_payload(&content);
    }

    #[test]
    fn any_i32_score_is_kept(score in any::<i32>(), pitch in "[A-Za-z ,.]{0,80}") {
        let content = serde_json::json!({ "score": score, "pitch": &pitch }).to_string();
        let result = parse_score_payload(&content).unwrap();
        prop_assert_eq!(result.score, score);
        prop_assert_eq!(result.pitch, pitch);
    }

    #[test]
    fn stage_names_parse_back(stage in stage_strategy()) {
        prop_assert_eq!(stage.as_str().parse::<PipelineStage>().unwrap(), stage);
    }
}

// Property: generated batches respect their shape for any seed
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn generated_batch_invariants(seed in any::<u64>(), count in 0usize..40) {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let batch = generate_batch(&mut StdRng::seed_from_u64(seed), now, count);

        prop_assert_eq!(batch.contacts.len(), count);
        prop_assert!(batch.web_visits.len() >= count);
        prop_assert!(batch.web_visits.len() <= count * 5);
        prop_assert!(batch.opportunities.len() <= count);

        for contact in &batch.contacts {
            prop_assert!(contact.created_at <= now);
            prop_assert!(contact.created_at >= now - Duration::days(365));
        }
        for opp in &batch.opportunities {
            prop_assert_eq!(opp.close_date.is_some(), opp.stage.is_closed());
        }
    }
}
