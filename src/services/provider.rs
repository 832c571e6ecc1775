use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::Config;
use crate::error::IngestError;

// ── Provider response types: fixtures ────────────────────────────────────────
//
// Every field the provider may omit or null is an Option here; the one
// validating pass from raw document to record happens in the orchestrator,
// so a missing field surfaces as a single mapping failure instead of a
// deserialization error for the whole batch.

#[derive(Debug, Default, Deserialize)]
pub struct FixturesResponse {
    #[serde(default)]
    pub response: Vec<FixtureDoc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FixtureDoc {
    #[serde(default)]
    pub fixture: FixtureMeta,
    #[serde(default)]
    pub league: LeagueDoc,
    #[serde(default)]
    pub teams: TeamsDoc,
    #[serde(default)]
    pub score: ScoreDoc,
}

#[derive(Debug, Default, Deserialize)]
pub struct FixtureMeta {
    pub id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub venue: VenueDoc,
}

#[derive(Debug, Default, Deserialize)]
pub struct VenueDoc {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeagueDoc {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub logo: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamsDoc {
    #[serde(default)]
    pub home: TeamDoc,
    #[serde(default)]
    pub away: TeamDoc,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamDoc {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoreDoc {
    #[serde(default)]
    pub halftime: GoalsPair,
    #[serde(default)]
    pub fulltime: GoalsPair,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoalsPair {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

// ── Provider response types: predictions ─────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PredictionsResponse {
    #[serde(default)]
    pub response: Vec<PredictionDoc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionDoc {
    #[serde(default)]
    pub predictions: PredictionCore,
    #[serde(default)]
    pub comparison: ComparisonDoc,
    #[serde(default)]
    pub teams: PredictionTeams,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionCore {
    pub winner: Option<WinnerDoc>,
    pub win_or_draw: Option<bool>,
    pub under_over: Option<String>,
    #[serde(default)]
    pub goals: GoalsAdvice,
    pub advice: Option<String>,
    #[serde(default)]
    pub percent: PercentDoc,
}

#[derive(Debug, Default, Deserialize)]
pub struct WinnerDoc {
    #[allow(dead_code)]
    pub id: Option<i64>,
    pub name: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoalsAdvice {
    pub home: Option<String>,
    pub away: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PercentDoc {
    pub home: Option<String>,
    pub draw: Option<String>,
    pub away: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComparisonDoc {
    #[serde(default)]
    pub form: HomeAwayValue,
    #[serde(default)]
    pub att: HomeAwayValue,
    #[serde(default)]
    pub def: HomeAwayValue,
    #[serde(default)]
    pub poisson_distribution: HomeAwayValue,
    #[serde(default)]
    pub h2h: HomeAwayValue,
    #[serde(default)]
    pub goals: HomeAwayValue,
    #[serde(default)]
    pub total: HomeAwayValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeAwayValue {
    pub home: Option<String>,
    pub away: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionTeams {
    #[serde(default)]
    pub home: PredictionTeam,
    #[serde(default)]
    pub away: PredictionTeam,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionTeam {
    #[serde(default)]
    pub league: TeamLeagueStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamLeagueStats {
    #[serde(default)]
    pub fixtures: TeamFixtures,
    #[serde(default)]
    pub goals: TeamGoals,
    #[serde(default)]
    pub cards: TeamCards,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamFixtures {
    #[serde(default)]
    pub played: PlayedSplit,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlayedSplit {
    pub home: Option<i64>,
    pub away: Option<i64>,
    #[allow(dead_code)]
    pub total: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamGoals {
    #[serde(rename = "for", default)]
    pub scored: GoalsMinutes,
    #[serde(default)]
    pub against: GoalsMinutes,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoalsMinutes {
    /// Minute-bucket label ("0-15" .. "76-90", extended variants up to
    /// "106-120") to event counter. The map shape tolerates both schema
    /// variants; the aggregator only reads the six regulation buckets.
    #[serde(default)]
    pub minute: HashMap<String, MinuteBucket>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamCards {
    #[serde(default)]
    pub yellow: HashMap<String, MinuteBucket>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinuteBucket {
    pub total: Option<i64>,
    #[allow(dead_code)]
    pub percentage: Option<String>,
}

// ── ProviderClient ───────────────────────────────────────────────────────────

/// Client for the fixtures/predictions provider. Issues live requests with
/// credential headers; treats any non-success status as a failure. It never
/// paces itself; request spacing is the orchestrator's responsibility.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_host: String,
}

impl ProviderClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            api_key: config.provider_api_key.clone(),
            api_host: config.provider_host.clone(),
        })
    }

    /// All fixtures scheduled on a calendar date (UTC).
    pub async fn fetch_fixtures(&self, date: NaiveDate) -> Result<FixturesResponse, IngestError> {
        let url = format!("{}/v3/fixtures", self.base_url);
        self.get_json(&url, &[("date", date.format("%Y-%m-%d").to_string())])
            .await
    }

    /// The provider's pre-match prediction document for one fixture. An
    /// empty `response` list means the provider has nothing for this id.
    pub async fn fetch_prediction(
        &self,
        fixture_id: i64,
    ) -> Result<PredictionsResponse, IngestError> {
        let url = format!("{}/v3/predictions", self.base_url);
        self.get_json(&url, &[("fixture", fixture_id.to_string())])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, IngestError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.api_host)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Provider {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| IngestError::Provider {
            status: status.as_u16(),
            message: format!("malformed response body: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_doc_tolerates_missing_groups() {
        // A bare object still deserializes; validation happens at mapping time.
        let doc: FixtureDoc = serde_json::from_str("{}").unwrap();
        assert!(doc.fixture.id.is_none());
        assert!(doc.teams.home.id.is_none());
        assert!(doc.score.fulltime.home.is_none());
    }

    #[test]
    fn prediction_doc_reads_minute_buckets() {
        let raw = r#"{
            "predictions": {"win_or_draw": true, "advice": "Double chance"},
            "teams": {
                "home": {
                    "league": {
                        "fixtures": {"played": {"home": 7, "away": 6, "total": 13}},
                        "goals": {
                            "for": {"minute": {
                                "0-15": {"total": 3, "percentage": "20.00%"},
                                "76-90": {"total": null, "percentage": null},
                                "91-105": {"total": 1, "percentage": "6.67%"}
                            }},
                            "against": {"minute": {}}
                        }
                    }
                }
            }
        }"#;
        let doc: PredictionDoc = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.predictions.win_or_draw, Some(true));
        let minutes = &doc.teams.home.league.goals.scored.minute;
        assert_eq!(minutes.get("0-15").and_then(|b| b.total), Some(3));
        assert_eq!(minutes.get("76-90").and_then(|b| b.total), None);
        // Extended-bucket variant is carried but not required anywhere.
        assert_eq!(minutes.get("91-105").and_then(|b| b.total), Some(1));
        assert_eq!(doc.teams.home.league.fixtures.played.home, Some(7));
    }
}
