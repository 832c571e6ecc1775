//! Secondary-prediction enrichment.
//!
//! Flattens a fixture's stored prediction and stats into a metric summary,
//! sends it to the generation service with a fixed prompt, parses the
//! response against a strict five-group schema and appends the result. A
//! response that does not match the schema is a terminal failure for that
//! invocation: nothing is stored and nothing is retried.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::IngestError;
use crate::models::{MatchInsight, Prediction, PredictionStats};

const GENERATION_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const GENERATION_MAX_TOKENS: u32 = 4000;
const GENERATION_TEMPERATURE: f64 = 0.7;

// ── Expected response schema ─────────────────────────────────────────────────
//
// Every field is required: a response missing any of the five groups or any
// ranked entry is rejected wholesale.

#[derive(Debug, Deserialize)]
pub struct ModelInsight {
    pub predictions: ScoreGroup,
    pub match_predictions: MatchGroup,
    pub combo_predictions: ComboGroup,
    pub reasoning: ReasoningGroup,
}

#[derive(Debug, Deserialize)]
pub struct ScoreGroup {
    pub half_time_score: RankedPrediction,
    pub full_time_score: RankedPrediction,
}

#[derive(Debug, Deserialize)]
pub struct RankedPrediction {
    pub prediction: String,
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
pub struct MatchGroup {
    pub prediction_1: RankedPrediction,
    pub prediction_2: RankedPrediction,
    pub prediction_3: RankedPrediction,
    pub prediction_4: RankedPrediction,
    pub prediction_5: RankedPrediction,
}

#[derive(Debug, Deserialize)]
pub struct ComboGroup {
    pub combo_1: RankedPrediction,
    pub combo_2: RankedPrediction,
    pub combo_3: RankedPrediction,
    pub combo_4: RankedPrediction,
    pub combo_5: RankedPrediction,
}

#[derive(Debug, Deserialize)]
pub struct ReasoningGroup {
    pub offensive_analysis: String,
    pub defensive_analysis: String,
    pub form_analysis: String,
    pub key_insights: String,
}

// ── Generation client ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Thin client for the generation service: one prompt in, raw text out.
#[derive(Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GenerationClient {
    pub fn new(api_key: String, model: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            endpoint: GENERATION_ENDPOINT.to_string(),
            api_key,
            model,
        })
    }

    /// Point the client at a different endpoint.
    #[cfg(test)]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, IngestError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": GENERATION_MAX_TOKENS,
            "temperature": GENERATION_TEMPERATURE,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(IngestError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            IngestError::Parse(format!("generation response body unreadable: {}", e))
        })?;
        parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| IngestError::Parse("generation response had no content".to_string()))
    }
}

// ── Response parsing ─────────────────────────────────────────────────────────

/// The model wraps its JSON in prose or code fences often enough that we
/// take everything between the first `{` and the last `}`.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start <= end).then(|| &text[start..=end])
}

pub fn parse_insight(text: &str) -> Result<ModelInsight, IngestError> {
    let json = extract_json(text)
        .ok_or_else(|| IngestError::Parse("no JSON object in generation response".to_string()))?;
    serde_json::from_str(json).map_err(|e| IngestError::Parse(e.to_string()))
}

// ── Prompt assembly ──────────────────────────────────────────────────────────

fn opt_str(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("null")
}

fn opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}

pub fn build_prompt(
    home_team: &str,
    away_team: &str,
    prediction: &Prediction,
    stats: &PredictionStats,
) -> String {
    format!(
        r#"You are an expert football analyst. Using only the pre-match data below, produce betting-oriented predictions for this fixture.

## Fixture data
home_team_name: {home_team}
away_team_name: {away_team}
comp_form_home: {comp_form_home}
comp_form_away: {comp_form_away}
comp_att_home: {comp_att_home}
comp_att_away: {comp_att_away}
comp_def_home: {comp_def_home}
comp_def_away: {comp_def_away}
comp_poisson_home: {comp_poisson_home}
comp_poisson_away: {comp_poisson_away}
comp_h2h_home: {comp_h2h_home}
comp_h2h_away: {comp_h2h_away}
comp_goals_home: {comp_goals_home}
comp_goals_away: {comp_goals_away}
comp_total_home: {comp_total_home}
comp_total_away: {comp_total_away}
home_team_scored_home_first_half_average: {h_sh1}
home_team_scored_home_second_half_average: {h_sh2}
home_team_scored_away_first_half_average: {h_sa1}
home_team_scored_away_second_half_average: {h_sa2}
home_team_conceded_home_first_half_average: {h_ch1}
home_team_conceded_home_second_half_average: {h_ch2}
home_team_conceded_away_first_half_average: {h_ca1}
home_team_conceded_away_second_half_average: {h_ca2}
home_team_yellow_cards_first_half_average: {h_y1}
home_team_yellow_cards_second_half_average: {h_y2}
away_team_scored_home_first_half_average: {a_sh1}
away_team_scored_home_second_half_average: {a_sh2}
away_team_scored_away_first_half_average: {a_sa1}
away_team_scored_away_second_half_average: {a_sa2}
away_team_conceded_home_first_half_average: {a_ch1}
away_team_conceded_home_second_half_average: {a_ch2}
away_team_conceded_away_first_half_average: {a_ca1}
away_team_conceded_away_second_half_average: {a_ca2}
away_team_yellow_cards_first_half_average: {a_y1}
away_team_yellow_cards_second_half_average: {a_y2}

A value of null means the underlying data was not available; do not treat it as zero.

Respond with ONLY a JSON document in exactly this shape, confidences as percentages between 0 and 100:
{{
  "predictions": {{
    "half_time_score": {{"prediction": "1-0", "confidence": 60}},
    "full_time_score": {{"prediction": "2-1", "confidence": 55}}
  }},
  "match_predictions": {{
    "prediction_1": {{"prediction": "...", "confidence": 0}},
    "prediction_2": {{"prediction": "...", "confidence": 0}},
    "prediction_3": {{"prediction": "...", "confidence": 0}},
    "prediction_4": {{"prediction": "...", "confidence": 0}},
    "prediction_5": {{"prediction": "...", "confidence": 0}}
  }},
  "combo_predictions": {{
    "combo_1": {{"prediction": "...", "confidence": 0}},
    "combo_2": {{"prediction": "...", "confidence": 0}},
    "combo_3": {{"prediction": "...", "confidence": 0}},
    "combo_4": {{"prediction": "...", "confidence": 0}},
    "combo_5": {{"prediction": "...", "confidence": 0}}
  }},
  "reasoning": {{
    "offensive_analysis": "...",
    "defensive_analysis": "...",
    "form_analysis": "...",
    "key_insights": "..."
  }}
}}

Rank match_predictions and combo_predictions from most to least likely."#,
        home_team = home_team,
        away_team = away_team,
        comp_form_home = opt_str(&prediction.comp_form_home),
        comp_form_away = opt_str(&prediction.comp_form_away),
        comp_att_home = opt_str(&prediction.comp_att_home),
        comp_att_away = opt_str(&prediction.comp_att_away),
        comp_def_home = opt_str(&prediction.comp_def_home),
        comp_def_away = opt_str(&prediction.comp_def_away),
        comp_poisson_home = opt_str(&prediction.comp_poisson_home),
        comp_poisson_away = opt_str(&prediction.comp_poisson_away),
        comp_h2h_home = opt_str(&prediction.comp_h2h_home),
        comp_h2h_away = opt_str(&prediction.comp_h2h_away),
        comp_goals_home = opt_str(&prediction.comp_goals_home),
        comp_goals_away = opt_str(&prediction.comp_goals_away),
        comp_total_home = opt_str(&prediction.comp_total_home),
        comp_total_away = opt_str(&prediction.comp_total_away),
        h_sh1 = opt_f64(stats.home_team_scored_home_first_half_average),
        h_sh2 = opt_f64(stats.home_team_scored_home_second_half_average),
        h_sa1 = opt_f64(stats.home_team_scored_away_first_half_average),
        h_sa2 = opt_f64(stats.home_team_scored_away_second_half_average),
        h_ch1 = opt_f64(stats.home_team_conceded_home_first_half_average),
        h_ch2 = opt_f64(stats.home_team_conceded_home_second_half_average),
        h_ca1 = opt_f64(stats.home_team_conceded_away_first_half_average),
        h_ca2 = opt_f64(stats.home_team_conceded_away_second_half_average),
        h_y1 = opt_f64(stats.home_team_yellow_cards_first_half_average),
        h_y2 = opt_f64(stats.home_team_yellow_cards_second_half_average),
        a_sh1 = opt_f64(stats.away_team_scored_home_first_half_average),
        a_sh2 = opt_f64(stats.away_team_scored_home_second_half_average),
        a_sa1 = opt_f64(stats.away_team_scored_away_first_half_average),
        a_sa2 = opt_f64(stats.away_team_scored_away_second_half_average),
        a_ch1 = opt_f64(stats.away_team_conceded_home_first_half_average),
        a_ch2 = opt_f64(stats.away_team_conceded_home_second_half_average),
        a_ca1 = opt_f64(stats.away_team_conceded_away_first_half_average),
        a_ca2 = opt_f64(stats.away_team_conceded_away_second_half_average),
        a_y1 = opt_f64(stats.away_team_yellow_cards_first_half_average),
        a_y2 = opt_f64(stats.away_team_yellow_cards_second_half_average),
    )
}

fn insight_record(fixture_id: i64, insight: ModelInsight) -> MatchInsight {
    MatchInsight {
        id: Uuid::new_v4().to_string(),
        fixture_id,
        half_time_score: insight.predictions.half_time_score.prediction,
        half_time_confidence: insight.predictions.half_time_score.confidence,
        full_time_score: insight.predictions.full_time_score.prediction,
        full_time_confidence: insight.predictions.full_time_score.confidence,
        prediction_1: insight.match_predictions.prediction_1.prediction,
        prediction_1_confidence: insight.match_predictions.prediction_1.confidence,
        prediction_2: insight.match_predictions.prediction_2.prediction,
        prediction_2_confidence: insight.match_predictions.prediction_2.confidence,
        prediction_3: insight.match_predictions.prediction_3.prediction,
        prediction_3_confidence: insight.match_predictions.prediction_3.confidence,
        prediction_4: insight.match_predictions.prediction_4.prediction,
        prediction_4_confidence: insight.match_predictions.prediction_4.confidence,
        prediction_5: insight.match_predictions.prediction_5.prediction,
        prediction_5_confidence: insight.match_predictions.prediction_5.confidence,
        combo_1: insight.combo_predictions.combo_1.prediction,
        combo_1_confidence: insight.combo_predictions.combo_1.confidence,
        combo_2: insight.combo_predictions.combo_2.prediction,
        combo_2_confidence: insight.combo_predictions.combo_2.confidence,
        combo_3: insight.combo_predictions.combo_3.prediction,
        combo_3_confidence: insight.combo_predictions.combo_3.confidence,
        combo_4: insight.combo_predictions.combo_4.prediction,
        combo_4_confidence: insight.combo_predictions.combo_4.confidence,
        combo_5: insight.combo_predictions.combo_5.prediction,
        combo_5_confidence: insight.combo_predictions.combo_5.confidence,
        offensive_analysis: insight.reasoning.offensive_analysis,
        defensive_analysis: insight.reasoning.defensive_analysis,
        form_analysis: insight.reasoning.form_analysis,
        key_insights: insight.reasoning.key_insights,
        created_at: Utc::now(),
    }
}

// ── Adapter ──────────────────────────────────────────────────────────────────

/// Assembles the metric summary for one fixture, runs the generation
/// service, and appends the parsed result.
pub struct EnrichmentAdapter {
    generation: GenerationClient,
    pool: SqlitePool,
}

impl EnrichmentAdapter {
    pub fn new(generation: GenerationClient, pool: SqlitePool) -> Self {
        Self { generation, pool }
    }

    /// Whether at least one generation run already exists for a fixture.
    pub async fn has_insight(&self, fixture_id: i64) -> Result<bool, IngestError> {
        db::has_match_insight(&self.pool, fixture_id).await
    }

    pub async fn enrich_fixture(&self, fixture_id: i64) -> Result<MatchInsight, IngestError> {
        let (home_team, away_team) = db::get_fixture_teams(&self.pool, fixture_id)
            .await?
            .ok_or_else(|| {
                IngestError::Mapping(format!("no stored fixture with id {}", fixture_id))
            })?;
        let prediction = db::get_prediction(&self.pool, fixture_id)
            .await?
            .ok_or_else(|| {
                IngestError::Mapping(format!("no stored prediction for fixture {}", fixture_id))
            })?;
        let stats = db::get_prediction_stats(&self.pool, fixture_id)
            .await?
            .ok_or_else(|| {
                IngestError::Mapping(format!("no stored stats for fixture {}", fixture_id))
            })?;

        let prompt = build_prompt(&home_team, &away_team, &prediction, &stats);
        tracing::debug!("Requesting insight for fixture {}", fixture_id);
        let text = self.generation.generate(&prompt).await?;

        let record = insight_record(fixture_id, parse_insight(&text)?);
        db::insert_match_insight(&self.pool, &record).await?;
        tracing::info!("Stored insight {} for fixture {}", record.id, fixture_id);
        Ok(record)
    }
}
