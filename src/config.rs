use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;

/// Process-wide configuration, built once in `main` and passed explicitly
/// into the services that need it. Core logic never reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the fixtures/predictions provider.
    pub provider_base_url: String,
    pub provider_api_key: String,
    pub provider_host: String,
    pub database_url: String,
    /// Key for the generation service; enrichment is unavailable without it.
    pub generation_api_key: Option<String>,
    pub generation_model: String,
    pub major_leagues_path: String,
    /// Max in-flight prediction requests per batch.
    pub prediction_batch_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let provider_api_key = match env::var("RAPIDAPI_KEY") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return Err(anyhow!("RAPIDAPI_KEY not set")),
        };

        Ok(Self {
            provider_base_url: env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api-football-v1.p.rapidapi.com".to_string()),
            provider_api_key,
            provider_host: env::var("PROVIDER_HOST")
                .unwrap_or_else(|_| "api-football-v1.p.rapidapi.com".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/fixturecast.db".to_string()),
            generation_api_key: env::var("LLM_API_KEY").ok().filter(|v| !v.trim().is_empty()),
            generation_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
            major_leagues_path: env::var("MAJOR_LEAGUES_PATH")
                .unwrap_or_else(|_| "major_leagues.json".to_string()),
            prediction_batch_size: env::var("PREDICTION_BATCH_SIZE")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
        })
    }
}

/// One entry of the major-league allow-list. Fixtures outside these leagues
/// are stored but never selected for prediction ingestion or enrichment.
#[derive(Debug, Clone, Deserialize)]
pub struct MajorLeague {
    pub id: i64,
    pub name: String,
}

/// Load the allow-list once at startup; read-only afterwards.
pub fn load_major_leagues(path: &str) -> Result<Vec<MajorLeague>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read major leagues file {}", path))?;
    let leagues: Vec<MajorLeague> =
        serde_json::from_str(&raw).context("failed to parse major leagues file")?;
    Ok(leagues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_leagues_parse() {
        let raw = r#"[{"id": 39, "name": "Premier League"}, {"id": 140, "name": "La Liga"}]"#;
        let leagues: Vec<MajorLeague> = serde_json::from_str(raw).unwrap();
        assert_eq!(leagues.len(), 2);
        assert_eq!(leagues[0].id, 39);
        assert_eq!(leagues[1].name, "La Liga");
    }
}
