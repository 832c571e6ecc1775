//! Fetch-and-store orchestration.
//!
//! Two modes: one date to N fixture upserts, and a set of fixture ids to
//! N prediction/stats upserts. Fan-out is concurrent, failures are per
//! record, and the aggregate counts are only reported once every dispatched
//! task has resolved.

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::db;
use crate::error::IngestError;
use crate::models::{BatchOutcome, Fixture, Prediction, PredictionStats};
use crate::services::provider::{FixtureDoc, PredictionDoc, ProviderClient};
use crate::services::retry::{retry, RetryPolicy};
use crate::services::stats::team_averages;

/// Seconds between successive prediction batches.
const BATCH_PAUSE_SECS: u64 = 1;
/// Seconds between successive daily fixture-date calls.
const DATE_PAUSE_SECS: u64 = 5;

// ── Document mapping ─────────────────────────────────────────────────────────
//
// The single validating step from raw provider documents to records. A
// missing required field fails that record only and never the batch.

fn require<T>(value: Option<T>, what: &str) -> Result<T, IngestError> {
    value.ok_or_else(|| IngestError::Mapping(format!("{} missing", what)))
}

pub fn map_fixture(doc: &FixtureDoc) -> Result<Fixture, IngestError> {
    let fixture_id = require(doc.fixture.id, "fixture id")?;
    let label = |what: &str| format!("fixture {}: {}", fixture_id, what);

    Ok(Fixture {
        fixture_id,
        kickoff: doc
            .fixture
            .date
            .ok_or_else(|| IngestError::Mapping(label("kickoff date missing")))?,
        venue_id: doc.fixture.venue.id,
        venue_name: doc.fixture.venue.name.clone(),
        venue_city: doc.fixture.venue.city.clone(),
        league_id: doc
            .league
            .id
            .ok_or_else(|| IngestError::Mapping(label("league id missing")))?,
        league_name: doc
            .league
            .name
            .clone()
            .ok_or_else(|| IngestError::Mapping(label("league name missing")))?,
        league_country: doc
            .league
            .country
            .clone()
            .ok_or_else(|| IngestError::Mapping(label("league country missing")))?,
        league_logo: doc.league.logo.clone(),
        league_flag: doc.league.flag.clone(),
        home_team_id: doc
            .teams
            .home
            .id
            .ok_or_else(|| IngestError::Mapping(label("home team id missing")))?,
        home_team_name: doc
            .teams
            .home
            .name
            .clone()
            .ok_or_else(|| IngestError::Mapping(label("home team name missing")))?,
        home_team_logo: doc.teams.home.logo.clone(),
        away_team_id: doc
            .teams
            .away
            .id
            .ok_or_else(|| IngestError::Mapping(label("away team id missing")))?,
        away_team_name: doc
            .teams
            .away
            .name
            .clone()
            .ok_or_else(|| IngestError::Mapping(label("away team name missing")))?,
        away_team_logo: doc.teams.away.logo.clone(),
        ht_home_score: doc.score.halftime.home,
        ht_away_score: doc.score.halftime.away,
        ft_home_score: doc.score.fulltime.home,
        ft_away_score: doc.score.fulltime.away,
        created_at: Utc::now(),
    })
}

pub fn map_prediction(fixture_id: i64, doc: &PredictionDoc) -> Prediction {
    let winner = doc.predictions.winner.as_ref();
    Prediction {
        fixture_id,
        winner_team_name: winner.and_then(|w| w.name.clone()),
        winner_comment: winner.and_then(|w| w.comment.clone()),
        win_or_draw: doc.predictions.win_or_draw.unwrap_or(false),
        under_over: doc.predictions.under_over.clone(),
        goals_home: doc.predictions.goals.home.clone(),
        goals_away: doc.predictions.goals.away.clone(),
        advice: doc.predictions.advice.clone(),
        percent_home: doc.predictions.percent.home.clone(),
        percent_draw: doc.predictions.percent.draw.clone(),
        percent_away: doc.predictions.percent.away.clone(),
        comp_form_home: doc.comparison.form.home.clone(),
        comp_form_away: doc.comparison.form.away.clone(),
        comp_att_home: doc.comparison.att.home.clone(),
        comp_att_away: doc.comparison.att.away.clone(),
        comp_def_home: doc.comparison.def.home.clone(),
        comp_def_away: doc.comparison.def.away.clone(),
        comp_poisson_home: doc.comparison.poisson_distribution.home.clone(),
        comp_poisson_away: doc.comparison.poisson_distribution.away.clone(),
        comp_h2h_home: doc.comparison.h2h.home.clone(),
        comp_h2h_away: doc.comparison.h2h.away.clone(),
        comp_goals_home: doc.comparison.goals.home.clone(),
        comp_goals_away: doc.comparison.goals.away.clone(),
        comp_total_home: doc.comparison.total.home.clone(),
        comp_total_away: doc.comparison.total.away.clone(),
    }
}

pub fn map_prediction_stats(fixture_id: i64, doc: &PredictionDoc) -> PredictionStats {
    let home = team_averages(&doc.teams.home);
    let away = team_averages(&doc.teams.away);
    PredictionStats {
        fixture_id,
        home_team_scored_home_first_half_average: home.scored_home_first_half,
        home_team_scored_home_second_half_average: home.scored_home_second_half,
        home_team_scored_away_first_half_average: home.scored_away_first_half,
        home_team_scored_away_second_half_average: home.scored_away_second_half,
        home_team_conceded_home_first_half_average: home.conceded_home_first_half,
        home_team_conceded_home_second_half_average: home.conceded_home_second_half,
        home_team_conceded_away_first_half_average: home.conceded_away_first_half,
        home_team_conceded_away_second_half_average: home.conceded_away_second_half,
        home_team_yellow_cards_first_half_average: home.yellow_cards_first_half,
        home_team_yellow_cards_second_half_average: home.yellow_cards_second_half,
        away_team_scored_home_first_half_average: away.scored_home_first_half,
        away_team_scored_home_second_half_average: away.scored_home_second_half,
        away_team_scored_away_first_half_average: away.scored_away_first_half,
        away_team_scored_away_second_half_average: away.scored_away_second_half,
        away_team_conceded_home_first_half_average: away.conceded_home_first_half,
        away_team_conceded_home_second_half_average: away.conceded_home_second_half,
        away_team_conceded_away_first_half_average: away.conceded_away_first_half,
        away_team_conceded_away_second_half_average: away.conceded_away_second_half,
        away_team_yellow_cards_first_half_average: away.yellow_cards_first_half,
        away_team_yellow_cards_second_half_average: away.yellow_cards_second_half,
    }
}

// ── Ingestor ─────────────────────────────────────────────────────────────────

/// Drives fixture ingestion for a date and prediction ingestion for a set of
/// fixture ids. Stateless between runs: no cursor, no last-successful-date.
/// Re-running any ingestion is safe because every write is a keyed upsert.
#[derive(Clone)]
pub struct Ingestor {
    provider: ProviderClient,
    pool: SqlitePool,
    batch_size: usize,
    retry_policy: RetryPolicy,
}

impl Ingestor {
    pub fn new(
        provider: ProviderClient,
        pool: SqlitePool,
        batch_size: usize,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            pool,
            batch_size: batch_size.max(1),
            retry_policy,
        }
    }

    /// One provider call for the date, then a concurrent upsert per fixture.
    /// Returns how many fixtures were stored; per-record failures are logged
    /// and excluded from the count without stopping the rest.
    pub async fn ingest_fixtures(&self, date: NaiveDate) -> Result<u32, IngestError> {
        tracing::info!("Fetching fixtures for {}", date);
        let fixtures = retry(self.retry_policy, "fixtures fetch", || {
            self.provider.fetch_fixtures(date)
        })
        .await?;

        let total = fixtures.response.len();
        let results =
            futures::future::join_all(fixtures.response.iter().map(|doc| self.store_fixture(doc)))
                .await;
        let stored = results.iter().filter(|r| r.is_ok()).count() as u32;

        tracing::info!("Stored {}/{} fixtures for {}", stored, total, date);
        Ok(stored)
    }

    async fn store_fixture(&self, doc: &FixtureDoc) -> Result<(), IngestError> {
        let record = map_fixture(doc).map_err(|e| {
            tracing::error!("Skipping fixture document: {}", e);
            e
        })?;
        retry(self.retry_policy, "fixture upsert", || {
            db::upsert_fixture(&self.pool, &record)
        })
        .await
        .map_err(|e| {
            tracing::error!("Error storing fixture {}: {}", record.fixture_id, e);
            e
        })
    }

    /// Prediction ingestion over a set of fixture ids with bounded fan-out:
    /// at most `batch_size` requests are in flight, completions are handled
    /// first-come, and batches are spaced to respect the provider quota.
    /// Returns the success count and the ids that failed so the caller can
    /// retry those specifically.
    pub async fn ingest_predictions(&self, fixture_ids: &[i64]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, chunk) in fixture_ids.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(Duration::from_secs(BATCH_PAUSE_SECS)).await;
            }

            let mut results = stream::iter(chunk.iter().copied())
                .map(|fixture_id| async move {
                    (fixture_id, self.ingest_one_prediction(fixture_id).await)
                })
                .buffer_unordered(chunk.len());

            while let Some((fixture_id, result)) = results.next().await {
                match result {
                    Ok(()) => outcome.stored += 1,
                    Err(e) => {
                        tracing::warn!("Prediction ingestion failed for fixture {}: {}", fixture_id, e);
                        outcome.failed.push(fixture_id);
                    }
                }
            }
        }

        // Completion order is first-come; the reported list is not.
        outcome.failed.sort_unstable();
        tracing::info!(
            "Prediction batch done: {} stored, {} failed",
            outcome.stored,
            outcome.failed.len()
        );
        outcome
    }

    async fn ingest_one_prediction(&self, fixture_id: i64) -> Result<(), IngestError> {
        let response = retry(self.retry_policy, "prediction fetch", || {
            self.provider.fetch_prediction(fixture_id)
        })
        .await?;

        let doc = response.response.first().ok_or_else(|| {
            IngestError::Mapping(format!("no prediction returned for fixture {}", fixture_id))
        })?;

        let prediction = map_prediction(fixture_id, doc);
        let stats = map_prediction_stats(fixture_id, doc);

        let (prediction_result, stats_result) = tokio::join!(
            retry(self.retry_policy, "prediction upsert", || {
                db::upsert_prediction(&self.pool, &prediction)
            }),
            retry(self.retry_policy, "prediction stats upsert", || {
                db::upsert_prediction_stats(&self.pool, &stats)
            }),
        );
        prediction_result?;
        stats_result?;
        Ok(())
    }

    /// Sequential daily fixture ingestion starting at `start`, spaced to
    /// respect the provider quota. A failing date is logged and skipped; the
    /// remaining dates still run. Returns the total stored across all dates.
    pub async fn ingest_date_range(&self, start: NaiveDate, days: u32) -> u32 {
        let mut total = 0u32;
        for offset in 0..days {
            if offset > 0 {
                tokio::time::sleep(Duration::from_secs(DATE_PAUSE_SECS)).await;
            }
            let date = start + chrono::Duration::days(i64::from(offset));
            match self.ingest_fixtures(date).await {
                Ok(stored) => total += stored,
                Err(e) => tracing::error!("Fixture ingestion failed for {}: {}", date, e),
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::init_database_with_pool(&pool).await.unwrap();
        pool
    }

    fn test_config(base_url: &str) -> Config {
        Config {
            provider_base_url: base_url.to_string(),
            provider_api_key: "test-key".to_string(),
            provider_host: "test-host".to_string(),
            database_url: "sqlite::memory:".to_string(),
            generation_api_key: None,
            generation_model: "test-model".to_string(),
            major_leagues_path: "major_leagues.json".to_string(),
            prediction_batch_size: 5,
        }
    }

    async fn test_ingestor(server: &MockServer, pool: SqlitePool) -> Ingestor {
        let config = test_config(&server.uri());
        let provider = ProviderClient::new(&config).unwrap();
        let no_delay = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        Ingestor::new(provider, pool, config.prediction_batch_size, no_delay)
    }

    fn fixture_doc(id: i64) -> serde_json::Value {
        json!({
            "fixture": {
                "id": id,
                "date": "2026-08-06T19:00:00+00:00",
                "venue": {"id": 550, "name": "Emirates Stadium", "city": "London"}
            },
            "league": {
                "id": 39, "name": "Premier League", "country": "England",
                "logo": "https://media.example/leagues/39.png", "flag": null
            },
            "teams": {
                "home": {"id": 42, "name": "Arsenal", "logo": null},
                "away": {"id": 49, "name": "Chelsea", "logo": null}
            },
            "score": {
                "halftime": {"home": null, "away": null},
                "fulltime": {"home": null, "away": null}
            }
        })
    }

    fn prediction_doc() -> serde_json::Value {
        json!({
            "predictions": {
                "winner": {"id": 42, "name": "Arsenal", "comment": "Win or draw"},
                "win_or_draw": true,
                "under_over": "-3.5",
                "goals": {"home": "-2.5", "away": "-1.5"},
                "advice": "Double chance: Arsenal or draw",
                "percent": {"home": "45%", "draw": "30%", "away": "25%"}
            },
            "comparison": {
                "form": {"home": "60%", "away": "40%"},
                "att": {"home": "55%", "away": "45%"},
                "def": {"home": "52%", "away": "48%"},
                "poisson_distribution": {"home": "58%", "away": "42%"},
                "h2h": {"home": "50%", "away": "50%"},
                "goals": {"home": "57%", "away": "43%"},
                "total": {"home": "54%", "away": "46%"}
            },
            "teams": {
                "home": {
                    "league": {
                        "fixtures": {"played": {"home": 2, "away": 2, "total": 4}},
                        "goals": {
                            "for": {"minute": {
                                "0-15": {"total": 2, "percentage": "50.00%"},
                                "16-30": {"total": 0, "percentage": null},
                                "31-45": {"total": null, "percentage": null}
                            }},
                            "against": {"minute": {}}
                        },
                        "cards": {"yellow": {"76-90": {"total": 4, "percentage": "100%"}}}
                    }
                },
                "away": {
                    "league": {
                        "fixtures": {"played": {"home": 0, "away": 0, "total": 0}},
                        "goals": {"for": {"minute": {}}, "against": {"minute": {}}},
                        "cards": {"yellow": {}}
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn fixture_ingestion_counts_only_stored_records() {
        let server = MockServer::start().await;
        let pool = test_pool().await;

        // Second document has no home team id: a record-level mapping
        // failure that must not stop the first one from landing.
        let mut broken = fixture_doc(102);
        broken["teams"]["home"]["id"] = json!(null);

        Mock::given(method("GET"))
            .and(path("/v3/fixtures"))
            .and(query_param("date", "2026-08-06"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({
                    "response": [fixture_doc(101), broken]
                })),
            )
            .mount(&server)
            .await;

        let ingestor = test_ingestor(&server, pool.clone()).await;
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        let stored = ingestor.ingest_fixtures(date).await.unwrap();
        assert_eq!(stored, 1);

        // Re-running the same date does not grow the table.
        let stored = ingestor.ingest_fixtures(date).await.unwrap();
        assert_eq!(stored, 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fixtures")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn prediction_batch_reports_failed_ids() {
        let server = MockServer::start().await;
        let pool = test_pool().await;

        for id in [1i64, 3] {
            Mock::given(method("GET"))
                .and(path("/v3/predictions"))
                .and(query_param("fixture", id.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "response": [prediction_doc()]
                })))
                .mount(&server)
                .await;
        }

        // Fixture 2: the provider has nothing, an empty response list.
        Mock::given(method("GET"))
            .and(path("/v3/predictions"))
            .and(query_param("fixture", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": []})))
            .mount(&server)
            .await;

        let ingestor = test_ingestor(&server, pool.clone()).await;
        let outcome = ingestor.ingest_predictions(&[1, 2, 3]).await;

        assert_eq!(outcome.stored, 2);
        assert_eq!(outcome.failed, vec![2]);

        let prediction = db::get_prediction(&pool, 1).await.unwrap().unwrap();
        assert_eq!(prediction.winner_team_name.as_deref(), Some("Arsenal"));

        let stats = db::get_prediction_stats(&pool, 3).await.unwrap().unwrap();
        // (2 + 0 + 0) / 2 home games, the null bucket counting as zero.
        assert_eq!(stats.home_team_scored_home_first_half_average, Some(1.0));
        assert_eq!(stats.home_team_scored_home_second_half_average, None);
        // Cards divide by total games (4), not the venue split.
        assert_eq!(stats.home_team_yellow_cards_second_half_average, Some(1.0));
        // Away team played nothing: every average stays NULL.
        assert_eq!(stats.away_team_scored_home_first_half_average, None);
    }

    #[tokio::test]
    async fn provider_failure_is_retried_to_the_ceiling_then_reported() {
        let server = MockServer::start().await;
        let pool = test_pool().await;

        Mock::given(method("GET"))
            .and(path("/v3/predictions"))
            .and(query_param("fixture", "9"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let ingestor = test_ingestor(&server, pool).await;
        let outcome = ingestor.ingest_predictions(&[9]).await;

        assert_eq!(outcome.stored, 0);
        assert_eq!(outcome.failed, vec![9]);
        // The mounted mock's expect(3) is verified when the server drops.
    }

    #[test]
    fn map_fixture_requires_team_and_league_ids() {
        let doc: FixtureDoc = serde_json::from_value(fixture_doc(7)).unwrap();
        let record = map_fixture(&doc).unwrap();
        assert_eq!(record.fixture_id, 7);
        assert_eq!(record.league_id, 39);
        assert_eq!(record.home_team_name, "Arsenal");
        assert_eq!(record.ft_home_score, None);

        let mut broken = fixture_doc(7);
        broken["league"]["id"] = json!(null);
        let doc: FixtureDoc = serde_json::from_value(broken).unwrap();
        let err = map_fixture(&doc).unwrap_err();
        assert!(matches!(err, IngestError::Mapping(_)));
    }

    #[test]
    fn map_prediction_handles_missing_winner() {
        let mut raw = prediction_doc();
        raw["predictions"]["winner"] = json!(null);
        let doc: PredictionDoc = serde_json::from_value(raw).unwrap();
        let prediction = map_prediction(11, &doc);
        assert_eq!(prediction.fixture_id, 11);
        assert_eq!(prediction.winner_team_name, None);
        assert_eq!(prediction.winner_comment, None);
        assert!(prediction.win_or_draw);
        assert_eq!(prediction.percent_home.as_deref(), Some("45%"));
    }
}
