use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::str::FromStr;

use crate::error::IngestError;
use crate::models::*;

pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fixtures (
            fixture_id INTEGER PRIMARY KEY,
            kickoff TEXT NOT NULL,
            venue_id INTEGER,
            venue_name TEXT,
            venue_city TEXT,
            league_id INTEGER NOT NULL,
            league_name TEXT NOT NULL,
            league_country TEXT NOT NULL,
            league_logo TEXT,
            league_flag TEXT,
            home_team_id INTEGER NOT NULL,
            home_team_name TEXT NOT NULL,
            home_team_logo TEXT,
            away_team_id INTEGER NOT NULL,
            away_team_name TEXT NOT NULL,
            away_team_logo TEXT,
            ht_home_score INTEGER,
            ht_away_score INTEGER,
            ft_home_score INTEGER,
            ft_away_score INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            fixture_id INTEGER PRIMARY KEY,
            winner_team_name TEXT,
            winner_comment TEXT,
            win_or_draw INTEGER NOT NULL DEFAULT 0,
            under_over TEXT,
            goals_home TEXT,
            goals_away TEXT,
            advice TEXT,
            percent_home TEXT,
            percent_draw TEXT,
            percent_away TEXT,
            comp_form_home TEXT,
            comp_form_away TEXT,
            comp_att_home TEXT,
            comp_att_away TEXT,
            comp_def_home TEXT,
            comp_def_away TEXT,
            comp_poisson_home TEXT,
            comp_poisson_away TEXT,
            comp_h2h_home TEXT,
            comp_h2h_away TEXT,
            comp_goals_home TEXT,
            comp_goals_away TEXT,
            comp_total_home TEXT,
            comp_total_away TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prediction_stats (
            fixture_id INTEGER PRIMARY KEY,
            home_team_scored_home_first_half_average REAL,
            home_team_scored_home_second_half_average REAL,
            home_team_scored_away_first_half_average REAL,
            home_team_scored_away_second_half_average REAL,
            home_team_conceded_home_first_half_average REAL,
            home_team_conceded_home_second_half_average REAL,
            home_team_conceded_away_first_half_average REAL,
            home_team_conceded_away_second_half_average REAL,
            home_team_yellow_cards_first_half_average REAL,
            home_team_yellow_cards_second_half_average REAL,
            away_team_scored_home_first_half_average REAL,
            away_team_scored_home_second_half_average REAL,
            away_team_scored_away_first_half_average REAL,
            away_team_scored_away_second_half_average REAL,
            away_team_conceded_home_first_half_average REAL,
            away_team_conceded_home_second_half_average REAL,
            away_team_conceded_away_first_half_average REAL,
            away_team_conceded_away_second_half_average REAL,
            away_team_yellow_cards_first_half_average REAL,
            away_team_yellow_cards_second_half_average REAL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // match_insights is append-only: one row per generation run, several may
    // exist for the same fixture.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_insights (
            id TEXT PRIMARY KEY,
            fixture_id INTEGER NOT NULL,
            half_time_score TEXT NOT NULL,
            half_time_confidence REAL NOT NULL,
            full_time_score TEXT NOT NULL,
            full_time_confidence REAL NOT NULL,
            prediction_1 TEXT NOT NULL,
            prediction_1_confidence REAL NOT NULL,
            prediction_2 TEXT NOT NULL,
            prediction_2_confidence REAL NOT NULL,
            prediction_3 TEXT NOT NULL,
            prediction_3_confidence REAL NOT NULL,
            prediction_4 TEXT NOT NULL,
            prediction_4_confidence REAL NOT NULL,
            prediction_5 TEXT NOT NULL,
            prediction_5_confidence REAL NOT NULL,
            combo_1 TEXT NOT NULL,
            combo_1_confidence REAL NOT NULL,
            combo_2 TEXT NOT NULL,
            combo_2_confidence REAL NOT NULL,
            combo_3 TEXT NOT NULL,
            combo_3_confidence REAL NOT NULL,
            combo_4 TEXT NOT NULL,
            combo_4_confidence REAL NOT NULL,
            combo_5 TEXT NOT NULL,
            combo_5_confidence REAL NOT NULL,
            offensive_analysis TEXT NOT NULL,
            defensive_analysis TEXT NOT NULL,
            form_analysis TEXT NOT NULL,
            key_insights TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fixtures_kickoff ON fixtures(kickoff)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fixtures_league ON fixtures(league_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_insights_fixture ON match_insights(fixture_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

// ── Fixture operations ───────────────────────────────────────────────────────

/// Whole-row upsert keyed on fixture_id: a re-submitted fixture replaces
/// every field of the existing row, it never duplicates.
pub async fn upsert_fixture(pool: &SqlitePool, fixture: &Fixture) -> Result<(), IngestError> {
    sqlx::query(
        r#"
        INSERT INTO fixtures
        (fixture_id, kickoff, venue_id, venue_name, venue_city,
         league_id, league_name, league_country, league_logo, league_flag,
         home_team_id, home_team_name, home_team_logo,
         away_team_id, away_team_name, away_team_logo,
         ht_home_score, ht_away_score, ft_home_score, ft_away_score, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(fixture_id) DO UPDATE SET
            kickoff        = excluded.kickoff,
            venue_id       = excluded.venue_id,
            venue_name     = excluded.venue_name,
            venue_city     = excluded.venue_city,
            league_id      = excluded.league_id,
            league_name    = excluded.league_name,
            league_country = excluded.league_country,
            league_logo    = excluded.league_logo,
            league_flag    = excluded.league_flag,
            home_team_id   = excluded.home_team_id,
            home_team_name = excluded.home_team_name,
            home_team_logo = excluded.home_team_logo,
            away_team_id   = excluded.away_team_id,
            away_team_name = excluded.away_team_name,
            away_team_logo = excluded.away_team_logo,
            ht_home_score  = excluded.ht_home_score,
            ht_away_score  = excluded.ht_away_score,
            ft_home_score  = excluded.ft_home_score,
            ft_away_score  = excluded.ft_away_score,
            created_at     = excluded.created_at
        "#,
    )
    .bind(fixture.fixture_id)
    .bind(fixture.kickoff.to_rfc3339())
    .bind(fixture.venue_id)
    .bind(&fixture.venue_name)
    .bind(&fixture.venue_city)
    .bind(fixture.league_id)
    .bind(&fixture.league_name)
    .bind(&fixture.league_country)
    .bind(&fixture.league_logo)
    .bind(&fixture.league_flag)
    .bind(fixture.home_team_id)
    .bind(&fixture.home_team_name)
    .bind(&fixture.home_team_logo)
    .bind(fixture.away_team_id)
    .bind(&fixture.away_team_name)
    .bind(&fixture.away_team_logo)
    .bind(fixture.ht_home_score)
    .bind(fixture.ht_away_score)
    .bind(fixture.ft_home_score)
    .bind(fixture.ft_away_score)
    .bind(fixture.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn day_bounds(date: NaiveDate) -> (String, String) {
    let start = format!("{}T00:00:00+00:00", date.format("%Y-%m-%d"));
    let end = format!(
        "{}T00:00:00+00:00",
        (date + chrono::Duration::days(1)).format("%Y-%m-%d")
    );
    (start, end)
}

/// Fixture ids on a date restricted to the major-league allow-list,
/// optionally to kickoffs after a cutoff. An empty allow-list selects
/// nothing.
pub async fn major_fixture_ids_for_date(
    pool: &SqlitePool,
    date: NaiveDate,
    league_ids: &[i64],
    kickoff_after: Option<DateTime<Utc>>,
) -> Result<Vec<i64>, IngestError> {
    if league_ids.is_empty() {
        return Ok(Vec::new());
    }

    let (start, end) = day_bounds(date);
    let placeholders = vec!["?"; league_ids.len()].join(", ");
    let mut sql = format!(
        "SELECT fixture_id FROM fixtures \
         WHERE kickoff >= ? AND kickoff < ? AND league_id IN ({})",
        placeholders
    );
    if kickoff_after.is_some() {
        sql.push_str(" AND kickoff > ?");
    }
    sql.push_str(" ORDER BY kickoff");

    let mut query = sqlx::query_scalar(&sql).bind(start).bind(end);
    for league_id in league_ids {
        query = query.bind(league_id);
    }
    if let Some(cutoff) = kickoff_after {
        query = query.bind(cutoff.to_rfc3339());
    }

    let ids: Vec<i64> = query.fetch_all(pool).await?;
    Ok(ids)
}

pub async fn fixture_counts_for_date(
    pool: &SqlitePool,
    date: NaiveDate,
    league_ids: &[i64],
) -> Result<FixtureCounts, IngestError> {
    let (start, end) = day_bounds(date);

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM fixtures WHERE kickoff >= ? AND kickoff < ?")
            .bind(&start)
            .bind(&end)
            .fetch_one(pool)
            .await?;

    let major = if league_ids.is_empty() {
        0
    } else {
        let placeholders = vec!["?"; league_ids.len()].join(", ");
        let sql = format!(
            "SELECT COUNT(*) FROM fixtures \
             WHERE kickoff >= ? AND kickoff < ? AND league_id IN ({})",
            placeholders
        );
        let mut query = sqlx::query_scalar(&sql).bind(&start).bind(&end);
        for league_id in league_ids {
            query = query.bind(league_id);
        }
        query.fetch_one(pool).await?
    };

    Ok(FixtureCounts { total, major })
}

pub async fn get_fixture_teams(
    pool: &SqlitePool,
    fixture_id: i64,
) -> Result<Option<(String, String)>, IngestError> {
    let row = sqlx::query(
        "SELECT home_team_name, away_team_name FROM fixtures WHERE fixture_id = ?",
    )
    .bind(fixture_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| (r.get("home_team_name"), r.get("away_team_name"))))
}

/// Operator action: drop every fixture on a date. Returns rows removed.
pub async fn delete_fixtures_for_date(
    pool: &SqlitePool,
    date: NaiveDate,
) -> Result<u64, IngestError> {
    let (start, end) = day_bounds(date);
    let result = sqlx::query("DELETE FROM fixtures WHERE kickoff >= ? AND kickoff < ?")
        .bind(start)
        .bind(end)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

// ── Prediction operations ────────────────────────────────────────────────────

pub async fn upsert_prediction(
    pool: &SqlitePool,
    prediction: &Prediction,
) -> Result<(), IngestError> {
    sqlx::query(
        r#"
        INSERT INTO predictions
        (fixture_id, winner_team_name, winner_comment, win_or_draw, under_over,
         goals_home, goals_away, advice, percent_home, percent_draw, percent_away,
         comp_form_home, comp_form_away, comp_att_home, comp_att_away,
         comp_def_home, comp_def_away, comp_poisson_home, comp_poisson_away,
         comp_h2h_home, comp_h2h_away, comp_goals_home, comp_goals_away,
         comp_total_home, comp_total_away)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(fixture_id) DO UPDATE SET
            winner_team_name  = excluded.winner_team_name,
            winner_comment    = excluded.winner_comment,
            win_or_draw       = excluded.win_or_draw,
            under_over        = excluded.under_over,
            goals_home        = excluded.goals_home,
            goals_away        = excluded.goals_away,
            advice            = excluded.advice,
            percent_home      = excluded.percent_home,
            percent_draw      = excluded.percent_draw,
            percent_away      = excluded.percent_away,
            comp_form_home    = excluded.comp_form_home,
            comp_form_away    = excluded.comp_form_away,
            comp_att_home     = excluded.comp_att_home,
            comp_att_away     = excluded.comp_att_away,
            comp_def_home     = excluded.comp_def_home,
            comp_def_away     = excluded.comp_def_away,
            comp_poisson_home = excluded.comp_poisson_home,
            comp_poisson_away = excluded.comp_poisson_away,
            comp_h2h_home     = excluded.comp_h2h_home,
            comp_h2h_away     = excluded.comp_h2h_away,
            comp_goals_home   = excluded.comp_goals_home,
            comp_goals_away   = excluded.comp_goals_away,
            comp_total_home   = excluded.comp_total_home,
            comp_total_away   = excluded.comp_total_away
        "#,
    )
    .bind(prediction.fixture_id)
    .bind(&prediction.winner_team_name)
    .bind(&prediction.winner_comment)
    .bind(prediction.win_or_draw)
    .bind(&prediction.under_over)
    .bind(&prediction.goals_home)
    .bind(&prediction.goals_away)
    .bind(&prediction.advice)
    .bind(&prediction.percent_home)
    .bind(&prediction.percent_draw)
    .bind(&prediction.percent_away)
    .bind(&prediction.comp_form_home)
    .bind(&prediction.comp_form_away)
    .bind(&prediction.comp_att_home)
    .bind(&prediction.comp_att_away)
    .bind(&prediction.comp_def_home)
    .bind(&prediction.comp_def_away)
    .bind(&prediction.comp_poisson_home)
    .bind(&prediction.comp_poisson_away)
    .bind(&prediction.comp_h2h_home)
    .bind(&prediction.comp_h2h_away)
    .bind(&prediction.comp_goals_home)
    .bind(&prediction.comp_goals_away)
    .bind(&prediction.comp_total_home)
    .bind(&prediction.comp_total_away)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_prediction(
    pool: &SqlitePool,
    fixture_id: i64,
) -> Result<Option<Prediction>, IngestError> {
    let prediction =
        sqlx::query_as::<_, Prediction>("SELECT * FROM predictions WHERE fixture_id = ?")
            .bind(fixture_id)
            .fetch_optional(pool)
            .await?;
    Ok(prediction)
}

pub async fn delete_predictions_for_ids(
    pool: &SqlitePool,
    fixture_ids: &[i64],
) -> Result<u64, IngestError> {
    if fixture_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; fixture_ids.len()].join(", ");
    let sql = format!(
        "DELETE FROM predictions WHERE fixture_id IN ({})",
        placeholders
    );
    let mut query = sqlx::query(&sql);
    for fixture_id in fixture_ids {
        query = query.bind(fixture_id);
    }
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

// ── Prediction stats operations ──────────────────────────────────────────────

pub async fn upsert_prediction_stats(
    pool: &SqlitePool,
    stats: &PredictionStats,
) -> Result<(), IngestError> {
    sqlx::query(
        r#"
        INSERT INTO prediction_stats
        (fixture_id,
         home_team_scored_home_first_half_average, home_team_scored_home_second_half_average,
         home_team_scored_away_first_half_average, home_team_scored_away_second_half_average,
         home_team_conceded_home_first_half_average, home_team_conceded_home_second_half_average,
         home_team_conceded_away_first_half_average, home_team_conceded_away_second_half_average,
         home_team_yellow_cards_first_half_average, home_team_yellow_cards_second_half_average,
         away_team_scored_home_first_half_average, away_team_scored_home_second_half_average,
         away_team_scored_away_first_half_average, away_team_scored_away_second_half_average,
         away_team_conceded_home_first_half_average, away_team_conceded_home_second_half_average,
         away_team_conceded_away_first_half_average, away_team_conceded_away_second_half_average,
         away_team_yellow_cards_first_half_average, away_team_yellow_cards_second_half_average)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(fixture_id) DO UPDATE SET
            home_team_scored_home_first_half_average    = excluded.home_team_scored_home_first_half_average,
            home_team_scored_home_second_half_average   = excluded.home_team_scored_home_second_half_average,
            home_team_scored_away_first_half_average    = excluded.home_team_scored_away_first_half_average,
            home_team_scored_away_second_half_average   = excluded.home_team_scored_away_second_half_average,
            home_team_conceded_home_first_half_average  = excluded.home_team_conceded_home_first_half_average,
            home_team_conceded_home_second_half_average = excluded.home_team_conceded_home_second_half_average,
            home_team_conceded_away_first_half_average  = excluded.home_team_conceded_away_first_half_average,
            home_team_conceded_away_second_half_average = excluded.home_team_conceded_away_second_half_average,
            home_team_yellow_cards_first_half_average   = excluded.home_team_yellow_cards_first_half_average,
            home_team_yellow_cards_second_half_average  = excluded.home_team_yellow_cards_second_half_average,
            away_team_scored_home_first_half_average    = excluded.away_team_scored_home_first_half_average,
            away_team_scored_home_second_half_average   = excluded.away_team_scored_home_second_half_average,
            away_team_scored_away_first_half_average    = excluded.away_team_scored_away_first_half_average,
            away_team_scored_away_second_half_average   = excluded.away_team_scored_away_second_half_average,
            away_team_conceded_home_first_half_average  = excluded.away_team_conceded_home_first_half_average,
            away_team_conceded_home_second_half_average = excluded.away_team_conceded_home_second_half_average,
            away_team_conceded_away_first_half_average  = excluded.away_team_conceded_away_first_half_average,
            away_team_conceded_away_second_half_average = excluded.away_team_conceded_away_second_half_average,
            away_team_yellow_cards_first_half_average   = excluded.away_team_yellow_cards_first_half_average,
            away_team_yellow_cards_second_half_average  = excluded.away_team_yellow_cards_second_half_average
        "#,
    )
    .bind(stats.fixture_id)
    .bind(stats.home_team_scored_home_first_half_average)
    .bind(stats.home_team_scored_home_second_half_average)
    .bind(stats.home_team_scored_away_first_half_average)
    .bind(stats.home_team_scored_away_second_half_average)
    .bind(stats.home_team_conceded_home_first_half_average)
    .bind(stats.home_team_conceded_home_second_half_average)
    .bind(stats.home_team_conceded_away_first_half_average)
    .bind(stats.home_team_conceded_away_second_half_average)
    .bind(stats.home_team_yellow_cards_first_half_average)
    .bind(stats.home_team_yellow_cards_second_half_average)
    .bind(stats.away_team_scored_home_first_half_average)
    .bind(stats.away_team_scored_home_second_half_average)
    .bind(stats.away_team_scored_away_first_half_average)
    .bind(stats.away_team_scored_away_second_half_average)
    .bind(stats.away_team_conceded_home_first_half_average)
    .bind(stats.away_team_conceded_home_second_half_average)
    .bind(stats.away_team_conceded_away_first_half_average)
    .bind(stats.away_team_conceded_away_second_half_average)
    .bind(stats.away_team_yellow_cards_first_half_average)
    .bind(stats.away_team_yellow_cards_second_half_average)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_prediction_stats(
    pool: &SqlitePool,
    fixture_id: i64,
) -> Result<Option<PredictionStats>, IngestError> {
    let stats =
        sqlx::query_as::<_, PredictionStats>("SELECT * FROM prediction_stats WHERE fixture_id = ?")
            .bind(fixture_id)
            .fetch_optional(pool)
            .await?;
    Ok(stats)
}

// ── Match insight operations (append-only) ───────────────────────────────────

pub async fn insert_match_insight(
    pool: &SqlitePool,
    insight: &MatchInsight,
) -> Result<(), IngestError> {
    sqlx::query(
        r#"
        INSERT INTO match_insights
        (id, fixture_id,
         half_time_score, half_time_confidence, full_time_score, full_time_confidence,
         prediction_1, prediction_1_confidence, prediction_2, prediction_2_confidence,
         prediction_3, prediction_3_confidence, prediction_4, prediction_4_confidence,
         prediction_5, prediction_5_confidence,
         combo_1, combo_1_confidence, combo_2, combo_2_confidence,
         combo_3, combo_3_confidence, combo_4, combo_4_confidence,
         combo_5, combo_5_confidence,
         offensive_analysis, defensive_analysis, form_analysis, key_insights, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&insight.id)
    .bind(insight.fixture_id)
    .bind(&insight.half_time_score)
    .bind(insight.half_time_confidence)
    .bind(&insight.full_time_score)
    .bind(insight.full_time_confidence)
    .bind(&insight.prediction_1)
    .bind(insight.prediction_1_confidence)
    .bind(&insight.prediction_2)
    .bind(insight.prediction_2_confidence)
    .bind(&insight.prediction_3)
    .bind(insight.prediction_3_confidence)
    .bind(&insight.prediction_4)
    .bind(insight.prediction_4_confidence)
    .bind(&insight.prediction_5)
    .bind(insight.prediction_5_confidence)
    .bind(&insight.combo_1)
    .bind(insight.combo_1_confidence)
    .bind(&insight.combo_2)
    .bind(insight.combo_2_confidence)
    .bind(&insight.combo_3)
    .bind(insight.combo_3_confidence)
    .bind(&insight.combo_4)
    .bind(insight.combo_4_confidence)
    .bind(&insight.combo_5)
    .bind(insight.combo_5_confidence)
    .bind(&insight.offensive_analysis)
    .bind(&insight.defensive_analysis)
    .bind(&insight.form_analysis)
    .bind(&insight.key_insights)
    .bind(insight.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Existence check used to decide whether an enrichment run already exists
/// for a fixture. This is a dedup read, not a uniqueness constraint.
pub async fn has_match_insight(pool: &SqlitePool, fixture_id: i64) -> Result<bool, IngestError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM match_insights WHERE fixture_id = ?")
        .bind(fixture_id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_database_with_pool(&pool).await.unwrap();
        pool
    }

    fn sample_fixture(fixture_id: i64, league_id: i64, hour: u32) -> Fixture {
        Fixture {
            fixture_id,
            kickoff: Utc.with_ymd_and_hms(2026, 8, 6, hour, 0, 0).unwrap(),
            venue_id: Some(556),
            venue_name: Some("Old Trafford".to_string()),
            venue_city: Some("Manchester".to_string()),
            league_id,
            league_name: "Premier League".to_string(),
            league_country: "England".to_string(),
            league_logo: None,
            league_flag: None,
            home_team_id: 33,
            home_team_name: "Manchester United".to_string(),
            home_team_logo: None,
            away_team_id: 40,
            away_team_name: "Liverpool".to_string(),
            away_team_logo: None,
            ht_home_score: None,
            ht_away_score: None,
            ft_home_score: None,
            ft_away_score: None,
            created_at: Utc.with_ymd_and_hms(2026, 8, 6, 0, 1, 0).unwrap(),
        }
    }

    fn sample_insight(fixture_id: i64) -> MatchInsight {
        let scored = |s: &str| s.to_string();
        MatchInsight {
            id: uuid::Uuid::new_v4().to_string(),
            fixture_id,
            half_time_score: scored("1-0"),
            half_time_confidence: 60.0,
            full_time_score: scored("2-1"),
            full_time_confidence: 55.0,
            prediction_1: scored("Home win"),
            prediction_1_confidence: 65.0,
            prediction_2: scored("Over 1.5 goals"),
            prediction_2_confidence: 80.0,
            prediction_3: scored("Both teams to score"),
            prediction_3_confidence: 58.0,
            prediction_4: scored("Home -1 handicap"),
            prediction_4_confidence: 40.0,
            prediction_5: scored("Under 3.5 goals"),
            prediction_5_confidence: 70.0,
            combo_1: scored("Home win + over 1.5"),
            combo_1_confidence: 52.0,
            combo_2: scored("BTTS + over 2.5"),
            combo_2_confidence: 48.0,
            combo_3: scored("Home win + BTTS"),
            combo_3_confidence: 45.0,
            combo_4: scored("Draw or home + under 3.5"),
            combo_4_confidence: 62.0,
            combo_5: scored("Home win + under 3.5"),
            combo_5_confidence: 44.0,
            offensive_analysis: scored("Strong first-half scoring at home."),
            defensive_analysis: scored("Away side concedes late."),
            form_analysis: scored("Home side unbeaten in five."),
            key_insights: scored("Expect an early goal."),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_fixture_replaces_instead_of_duplicating() {
        let pool = test_pool().await;

        let mut fixture = sample_fixture(1001, 39, 18);
        upsert_fixture(&pool, &fixture).await.unwrap();

        fixture.ft_home_score = Some(2);
        fixture.ft_away_score = Some(1);
        fixture.venue_name = Some("Anfield".to_string());
        upsert_fixture(&pool, &fixture).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fixtures WHERE fixture_id = ?")
            .bind(1001i64)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let row = sqlx::query("SELECT venue_name, ft_home_score FROM fixtures WHERE fixture_id = ?")
            .bind(1001i64)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("venue_name"), "Anfield");
        assert_eq!(row.get::<Option<i32>, _>("ft_home_score"), Some(2));
    }

    #[tokio::test]
    async fn major_fixture_ids_filter_by_league_and_cutoff() {
        let pool = test_pool().await;

        upsert_fixture(&pool, &sample_fixture(1, 39, 12)).await.unwrap();
        upsert_fixture(&pool, &sample_fixture(2, 140, 15)).await.unwrap();
        upsert_fixture(&pool, &sample_fixture(3, 999, 18)).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();

        let ids = major_fixture_ids_for_date(&pool, date, &[39, 140], None)
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);

        // Only fixtures kicking off after the cutoff qualify.
        let cutoff = Utc.with_ymd_and_hms(2026, 8, 6, 13, 0, 0).unwrap();
        let ids = major_fixture_ids_for_date(&pool, date, &[39, 140], Some(cutoff))
            .await
            .unwrap();
        assert_eq!(ids, vec![2]);

        let ids = major_fixture_ids_for_date(&pool, date, &[], None).await.unwrap();
        assert!(ids.is_empty());

        let counts = fixture_counts_for_date(&pool, date, &[39, 140]).await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.major, 2);
    }

    #[tokio::test]
    async fn prediction_upsert_roundtrip() {
        let pool = test_pool().await;

        let mut prediction = Prediction {
            fixture_id: 77,
            winner_team_name: Some("Arsenal".to_string()),
            winner_comment: Some("Win or draw".to_string()),
            win_or_draw: true,
            under_over: Some("-3.5".to_string()),
            goals_home: Some("-2.5".to_string()),
            goals_away: Some("-1.5".to_string()),
            advice: Some("Double chance: Arsenal or draw".to_string()),
            percent_home: Some("45%".to_string()),
            percent_draw: Some("30%".to_string()),
            percent_away: Some("25%".to_string()),
            comp_form_home: Some("60%".to_string()),
            comp_form_away: Some("40%".to_string()),
            comp_att_home: Some("55%".to_string()),
            comp_att_away: Some("45%".to_string()),
            comp_def_home: Some("52%".to_string()),
            comp_def_away: Some("48%".to_string()),
            comp_poisson_home: Some("58%".to_string()),
            comp_poisson_away: Some("42%".to_string()),
            comp_h2h_home: Some("50%".to_string()),
            comp_h2h_away: Some("50%".to_string()),
            comp_goals_home: Some("57%".to_string()),
            comp_goals_away: Some("43%".to_string()),
            comp_total_home: Some("54%".to_string()),
            comp_total_away: Some("46%".to_string()),
        };
        upsert_prediction(&pool, &prediction).await.unwrap();

        prediction.winner_team_name = None;
        prediction.advice = Some("No clear favorite".to_string());
        upsert_prediction(&pool, &prediction).await.unwrap();

        let stored = get_prediction(&pool, 77).await.unwrap().unwrap();
        assert_eq!(stored.winner_team_name, None);
        assert_eq!(stored.advice.as_deref(), Some("No clear favorite"));
        assert!(stored.win_or_draw);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn prediction_stats_preserve_nulls() {
        let pool = test_pool().await;

        let stats = PredictionStats {
            fixture_id: 5,
            home_team_scored_home_first_half_average: Some(1.33),
            home_team_scored_home_second_half_average: Some(0.0),
            ..Default::default()
        };
        upsert_prediction_stats(&pool, &stats).await.unwrap();

        let stored = get_prediction_stats(&pool, 5).await.unwrap().unwrap();
        assert_eq!(stored.home_team_scored_home_first_half_average, Some(1.33));
        // Zero survives as zero, absence survives as NULL.
        assert_eq!(stored.home_team_scored_home_second_half_average, Some(0.0));
        assert_eq!(stored.away_team_yellow_cards_first_half_average, None);
    }

    #[tokio::test]
    async fn match_insights_are_append_only() {
        let pool = test_pool().await;

        assert!(!has_match_insight(&pool, 42).await.unwrap());

        insert_match_insight(&pool, &sample_insight(42)).await.unwrap();
        insert_match_insight(&pool, &sample_insight(42)).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM match_insights WHERE fixture_id = ?")
                .bind(42i64)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 2);
        assert!(has_match_insight(&pool, 42).await.unwrap());
    }
}
