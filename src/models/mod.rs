use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One scheduled or completed match, keyed by the provider's fixture id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub fixture_id: i64,
    pub kickoff: DateTime<Utc>,
    pub venue_id: Option<i64>,
    pub venue_name: Option<String>,
    pub venue_city: Option<String>,
    pub league_id: i64,
    pub league_name: String,
    pub league_country: String,
    pub league_logo: Option<String>,
    pub league_flag: Option<String>,
    pub home_team_id: i64,
    pub home_team_name: String,
    pub home_team_logo: Option<String>,
    pub away_team_id: i64,
    pub away_team_name: String,
    pub away_team_logo: Option<String>,
    pub ht_home_score: Option<i32>,
    pub ht_away_score: Option<i32>,
    pub ft_home_score: Option<i32>,
    pub ft_away_score: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Provider pre-match prediction, 1:1 with a fixture. The provider may
/// report no favorite, hence the nullable winner fields. Percentages and
/// comparison metrics arrive as provider-formatted strings ("45%") and are
/// stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prediction {
    pub fixture_id: i64,
    pub winner_team_name: Option<String>,
    pub winner_comment: Option<String>,
    pub win_or_draw: bool,
    pub under_over: Option<String>,
    pub goals_home: Option<String>,
    pub goals_away: Option<String>,
    pub advice: Option<String>,
    pub percent_home: Option<String>,
    pub percent_draw: Option<String>,
    pub percent_away: Option<String>,
    pub comp_form_home: Option<String>,
    pub comp_form_away: Option<String>,
    pub comp_att_home: Option<String>,
    pub comp_att_away: Option<String>,
    pub comp_def_home: Option<String>,
    pub comp_def_away: Option<String>,
    pub comp_poisson_home: Option<String>,
    pub comp_poisson_away: Option<String>,
    pub comp_h2h_home: Option<String>,
    pub comp_h2h_away: Option<String>,
    pub comp_goals_home: Option<String>,
    pub comp_goals_away: Option<String>,
    pub comp_total_home: Option<String>,
    pub comp_total_away: Option<String>,
}

/// Derived half-by-half per-game averages, 1:1 with a prediction.
///
/// A field is NULL exactly when the provider gave no minute-bucket data for
/// that half in that venue split. A zero average means "we observed zero
/// events", which is different from "no data" and must stay different
/// through to storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct PredictionStats {
    pub fixture_id: i64,
    pub home_team_scored_home_first_half_average: Option<f64>,
    pub home_team_scored_home_second_half_average: Option<f64>,
    pub home_team_scored_away_first_half_average: Option<f64>,
    pub home_team_scored_away_second_half_average: Option<f64>,
    pub home_team_conceded_home_first_half_average: Option<f64>,
    pub home_team_conceded_home_second_half_average: Option<f64>,
    pub home_team_conceded_away_first_half_average: Option<f64>,
    pub home_team_conceded_away_second_half_average: Option<f64>,
    pub home_team_yellow_cards_first_half_average: Option<f64>,
    pub home_team_yellow_cards_second_half_average: Option<f64>,
    pub away_team_scored_home_first_half_average: Option<f64>,
    pub away_team_scored_home_second_half_average: Option<f64>,
    pub away_team_scored_away_first_half_average: Option<f64>,
    pub away_team_scored_away_second_half_average: Option<f64>,
    pub away_team_conceded_home_first_half_average: Option<f64>,
    pub away_team_conceded_home_second_half_average: Option<f64>,
    pub away_team_conceded_away_first_half_average: Option<f64>,
    pub away_team_conceded_away_second_half_average: Option<f64>,
    pub away_team_yellow_cards_first_half_average: Option<f64>,
    pub away_team_yellow_cards_second_half_average: Option<f64>,
}

/// Model-generated secondary prediction. Append-only: each row is one
/// timestamped generation run, so several may coexist per fixture.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchInsight {
    pub id: String,
    pub fixture_id: i64,
    pub half_time_score: String,
    pub half_time_confidence: f64,
    pub full_time_score: String,
    pub full_time_confidence: f64,
    pub prediction_1: String,
    pub prediction_1_confidence: f64,
    pub prediction_2: String,
    pub prediction_2_confidence: f64,
    pub prediction_3: String,
    pub prediction_3_confidence: f64,
    pub prediction_4: String,
    pub prediction_4_confidence: f64,
    pub prediction_5: String,
    pub prediction_5_confidence: f64,
    pub combo_1: String,
    pub combo_1_confidence: f64,
    pub combo_2: String,
    pub combo_2_confidence: f64,
    pub combo_3: String,
    pub combo_3_confidence: f64,
    pub combo_4: String,
    pub combo_4_confidence: f64,
    pub combo_5: String,
    pub combo_5_confidence: f64,
    pub offensive_analysis: String,
    pub defensive_analysis: String,
    pub form_analysis: String,
    pub key_insights: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of one prediction batch: how many fixtures were stored, and the
/// ids that failed (no prediction returned, mapping failed, or the store
/// rejected the write) so the caller can retry them individually later.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub stored: u32,
    pub failed: Vec<i64>,
}

/// Per-date fixture counts: everything stored vs. major-league only.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureCounts {
    pub total: i64,
    pub major: i64,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
