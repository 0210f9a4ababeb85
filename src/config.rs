use std::time::Duration;

use url::Url;

use crate::models::PipelineStage;

/// Process-wide configuration, built once at startup and passed by reference
/// into every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub llm: LlmConfig,
    pub scoring: ScoringConfig,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Full `postgres://` connection URL, credentials included.
    pub database_url: String,
    /// Schema holding the raw_* landing tables.
    pub raw_schema: String,
    /// Schema holding the `dim_accounts` view.
    pub analytics_schema: String,
    /// Schema holding `sfdc_account_enrichment`.
    pub outbound_schema: String,
}

impl WarehouseConfig {
    /// Connection URL with the password masked, safe to log.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.database_url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("****"));
                }
                url.to_string()
            }
            Err(_) => "<unparseable url>".to_string(),
        }
    }
}

/// Settings for the Ollama chat endpoint and its decoding options.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub host: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f64,
    pub top_p: f64,
    pub num_predict: u32,
    pub seed: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout: Duration::from_secs(90),
            temperature: 0.5,
            top_p: 0.9,
            num_predict: 500,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Maximum number of prospects fetched per run.
    pub batch_limit: u32,
    /// Stages eligible for scoring.
    pub allowed_stages: Vec<PipelineStage>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            batch_limit: 10,
            allowed_stages: vec![PipelineStage::Prospecting, PipelineStage::Qualification],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub contact_count: usize,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            contact_count: 100,
            seed: None,
        }
    }
}

impl Config {
    /// Loads `.env` (if present) and reads configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = match get("DATABASE_URL").or_else(|| get("WAREHOUSE_URL")) {
            Some(url) => {
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                }
                url
            }
            None => build_database_url(&get)?,
        };

        let warehouse = WarehouseConfig {
            database_url,
            raw_schema: schema_name(get("WAREHOUSE_SCHEMA"), "public", "WAREHOUSE_SCHEMA")?,
            analytics_schema: schema_name(
                get("ANALYTICS_SCHEMA"),
                "analytics",
                "ANALYTICS_SCHEMA",
            )?,
            outbound_schema: schema_name(
                get("OUTBOUND_SCHEMA"),
                "reverse_etl_outbound",
                "OUTBOUND_SCHEMA",
            )?,
        };

        let defaults = LlmConfig::default();
        let host = match get("OLLAMA_HOST") {
            Some(host) => {
                if !host.starts_with("http://") && !host.starts_with("https://") {
                    anyhow::bail!("OLLAMA_HOST must start with http:// or https://");
                }
                host.trim_end_matches('/').to_string()
            }
            None => defaults.host.clone(),
        };
        let timeout_secs: u64 = match get("OLLAMA_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| anyhow::anyhow!("OLLAMA_TIMEOUT_SECS must be a positive integer"))?,
            None => defaults.timeout.as_secs(),
        };
        let llm = LlmConfig {
            host,
            model: get("OLLAMA_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(timeout_secs),
            ..defaults
        };

        let mut scoring = ScoringConfig::default();
        if let Some(raw) = get("SCORING_BATCH_LIMIT") {
            scoring.batch_limit = raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow::anyhow!("SCORING_BATCH_LIMIT must be a positive integer"))?;
        }

        let mut generator = GeneratorConfig::default();
        if let Some(raw) = get("MOCK_CONTACT_COUNT") {
            generator.contact_count = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("MOCK_CONTACT_COUNT must be a non-negative integer"))?;
        }
        if let Some(raw) = get("MOCK_DATA_SEED") {
            generator.seed = Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("MOCK_DATA_SEED must be an unsigned integer"))?,
            );
        }

        let config = Self {
            warehouse,
            llm,
            scoring,
            generator,
        };

        // Log without sensitive values
        tracing::debug!("Warehouse URL: {}", config.warehouse.redacted_url());
        tracing::debug!(
            "Schemas: raw={}, analytics={}, outbound={}",
            config.warehouse.raw_schema,
            config.warehouse.analytics_schema,
            config.warehouse.outbound_schema
        );
        tracing::debug!("Ollama: {} (model {})", config.llm.host, config.llm.model);

        Ok(config)
    }
}

fn build_database_url<F>(get: &F) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let require = |key: &str| {
        get(key).ok_or_else(|| {
            anyhow::anyhow!(
                "{} environment variable required when DATABASE_URL is not set",
                key
            )
        })
    };

    let host = require("WAREHOUSE_HOST")?;
    let user = require("WAREHOUSE_USER")?;
    let password = require("WAREHOUSE_PASSWORD")?;
    let database = require("WAREHOUSE_DATABASE")?;
    let port: u16 = get("WAREHOUSE_PORT")
        .unwrap_or_else(|| "5432".to_string())
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("WAREHOUSE_PORT must be a valid number between 1-65535"))?;

    let mut url = Url::parse("postgres://localhost")?;
    url.set_host(Some(&host))
        .map_err(|e| anyhow::anyhow!("WAREHOUSE_HOST is not a valid host: {}", e))?;
    url.set_port(Some(port))
        .map_err(|_| anyhow::anyhow!("WAREHOUSE_PORT cannot be applied"))?;
    url.set_username(&user)
        .map_err(|_| anyhow::anyhow!("WAREHOUSE_USER cannot be applied"))?;
    url.set_password(Some(&password))
        .map_err(|_| anyhow::anyhow!("WAREHOUSE_PASSWORD cannot be applied"))?;
    url.set_path(&database);

    Ok(url.to_string())
}

/// Postgres keywords that cannot name a schema unquoted (reserved, plus
/// those only allowed as function or type names).
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant", "group",
    "having", "ilike", "in", "initially", "inner", "intersect", "into", "is", "isnull", "join",
    "lateral", "leading", "left", "like", "limit", "localtime", "localtimestamp", "natural",
    "not", "notnull", "null", "offset", "on", "only", "or", "order", "outer", "overlaps",
    "placing", "primary", "references", "returning", "right", "select", "session_user",
    "similar", "some", "symmetric", "system_user", "table", "tablesample", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "verbose", "when",
    "where", "window", "with",
];

/// Schema names are interpolated into DDL, so only plain identifiers pass.
fn schema_name(value: Option<String>, default: &str, key: &str) -> anyhow::Result<String> {
    let name = value.unwrap_or_else(|| default.to_string());
    if !is_sql_identifier(&name) {
        anyhow::bail!("{} must be a plain SQL identifier, got '{}'", key, name);
    }
    if is_reserved_keyword(&name) {
        anyhow::bail!("{} cannot be the reserved word '{}'", key, name);
    }
    if name.to_ascii_lowercase().starts_with("pg_") {
        anyhow::bail!("{} cannot use the system prefix pg_, got '{}'", key, name);
    }
    Ok(name)
}

pub(crate) fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn is_reserved_keyword(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED_KEYWORDS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_database_url() {
        let config = Config::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://etl:secret@db:5432/gtm",
        )]))
        .unwrap();

        assert_eq!(config.warehouse.raw_schema, "public");
        assert_eq!(config.warehouse.analytics_schema, "analytics");
        assert_eq!(config.warehouse.outbound_schema, "reverse_etl_outbound");
        assert_eq!(config.llm, LlmConfig::default());
        assert_eq!(config.llm.host, "http://localhost:11434");
        assert_eq!(config.llm.timeout, Duration::from_secs(90));
        assert_eq!(config.scoring.batch_limit, 10);
        assert_eq!(
            config.scoring.allowed_stages,
            vec![PipelineStage::Prospecting, PipelineStage::Qualification]
        );
        assert_eq!(config.generator.contact_count, 100);
        assert_eq!(config.generator.seed, None);
    }

    #[test]
    fn test_builds_url_from_parts_and_encodes_password() {
        let config = Config::from_lookup(lookup(&[
            ("WAREHOUSE_HOST", "warehouse.internal"),
            ("WAREHOUSE_USER", "loader"),
            ("WAREHOUSE_PASSWORD", "p@ss/word"),
            ("WAREHOUSE_DATABASE", "gtm"),
            ("WAREHOUSE_PORT", "6543"),
        ]))
        .unwrap();

        let url = Url::parse(&config.warehouse.database_url).unwrap();
        assert_eq!(url.scheme(), "postgres");
        assert_eq!(url.host_str(), Some("warehouse.internal"));
        assert_eq!(url.port(), Some(6543));
        assert_eq!(url.username(), "loader");
        assert_eq!(url.path(), "/gtm");
        assert!(!config.warehouse.database_url.contains("p@ss/word"));
    }

    #[test]
    fn test_missing_warehouse_credentials_fail() {
        let err = Config::from_lookup(lookup(&[
            ("WAREHOUSE_HOST", "db"),
            ("WAREHOUSE_USER", "loader"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("WAREHOUSE_PASSWORD"));
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "mysql://db/gtm")])).unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://db/gtm"),
            ("OLLAMA_HOST", "http://gpu-box:11434/"),
            ("OLLAMA_MODEL", "mistral"),
            ("OLLAMA_TIMEOUT_SECS", "30"),
            ("SCORING_BATCH_LIMIT", "25"),
            ("MOCK_CONTACT_COUNT", "7"),
            ("MOCK_DATA_SEED", "1234"),
            ("OUTBOUND_SCHEMA", "crm_sync"),
        ]))
        .unwrap();

        assert_eq!(config.llm.host, "http://gpu-box:11434");
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.timeout, Duration::from_secs(30));
        assert_eq!(config.llm.seed, 42);
        assert_eq!(config.scoring.batch_limit, 25);
        assert_eq!(config.generator.contact_count, 7);
        assert_eq!(config.generator.seed, Some(1234));
        assert_eq!(config.warehouse.outbound_schema, "crm_sync");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = ("DATABASE_URL", "postgres://db/gtm");
        assert!(Config::from_lookup(lookup(&[base, ("OLLAMA_HOST", "localhost:11434")])).is_err());
        assert!(Config::from_lookup(lookup(&[base, ("SCORING_BATCH_LIMIT", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[base, ("OLLAMA_TIMEOUT_SECS", "soon")])).is_err());
        assert!(
            Config::from_lookup(lookup(&[base, ("ANALYTICS_SCHEMA", "analytics; drop")])).is_err()
        );
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/gtm"),
            ("OLLAMA_MODEL", "   "),
        ]))
        .unwrap();
        assert_eq!(config.llm.model, "llama3.1");
    }

    #[test]
    fn test_redacted_url_hides_password() {
        let config = Config::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://etl:secret@db:5432/gtm",
        )]))
        .unwrap();
        let redacted = config.warehouse.redacted_url();
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("etl"));
    }

    #[test]
    fn test_sql_identifier_rules() {
        assert!(is_sql_identifier("reverse_etl_outbound"));
        assert!(is_sql_identifier("_staging2"));
        assert!(!is_sql_identifier("2fast"));
        assert!(!is_sql_identifier("with space"));
        assert!(!is_sql_identifier(""));
    }

    #[test]
    fn test_reserved_words_rejected_as_schema_names() {
        let base = ("DATABASE_URL", "postgres://db/gtm");
        for name in ["user", "USER", "table", "Select", "current_schema"] {
            let err = Config::from_lookup(lookup(&[base, ("OUTBOUND_SCHEMA", name)])).unwrap_err();
            assert!(err.to_string().contains("reserved word"), "{} accepted", name);
        }
        assert!(Config::from_lookup(lookup(&[base, ("WAREHOUSE_SCHEMA", "pg_catalog")])).is_err());

        // Non-reserved keywords are fine as schema names.
        let config = Config::from_lookup(lookup(&[base, ("OUTBOUND_SCHEMA", "analytics_user")]))
            .unwrap();
        assert_eq!(config.warehouse.outbound_schema, "analytics_user");
        assert!(!is_reserved_keyword("public"));
        assert!(!is_reserved_keyword("schema"));
    }
}
