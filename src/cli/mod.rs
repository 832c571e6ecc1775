use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::config::{load_major_leagues, Config};
use crate::db::{self, create_pool, init_database_with_pool};
use crate::services::{
    scheduler, EnrichmentAdapter, GenerationClient, Ingestor, ProviderClient, RetryPolicy,
};

async fn open_pool(config: &Config) -> Result<SqlitePool> {
    let pool = create_pool(&config.database_url).await?;
    init_database_with_pool(&pool).await?;
    Ok(pool)
}

fn build_ingestor(config: &Config, pool: SqlitePool) -> Result<Ingestor> {
    let provider = ProviderClient::new(config)?;
    Ok(Ingestor::new(
        provider,
        pool,
        config.prediction_batch_size,
        RetryPolicy::default(),
    ))
}

pub async fn fetch_fixtures(config: &Config, date: NaiveDate, days: u32) -> Result<()> {
    let pool = open_pool(config).await?;
    let ingestor = build_ingestor(config, pool)?;

    println!("📥 Fetching fixtures for {} day(s) starting {}...", days, date);
    let total = ingestor.ingest_date_range(date, days).await;
    println!("✅ Stored {} fixtures", total);

    Ok(())
}

pub async fn fetch_predictions(config: &Config, date: NaiveDate) -> Result<()> {
    let pool = open_pool(config).await?;
    let ingestor = build_ingestor(config, pool.clone())?;

    let leagues = load_major_leagues(&config.major_leagues_path)?;
    let league_ids: Vec<i64> = leagues.iter().map(|l| l.id).collect();

    // Predictions only make sense before kick-off.
    let ids = db::major_fixture_ids_for_date(&pool, date, &league_ids, Some(Utc::now())).await?;
    if ids.is_empty() {
        println!("📭 No upcoming major-league fixtures found for {}", date);
        println!("💡 Fetch fixtures first with: fixturecast fetch-fixtures --date {}", date);
        return Ok(());
    }

    println!("📥 Fetching predictions for {} fixtures...", ids.len());
    let outcome = ingestor.ingest_predictions(&ids).await;

    println!("✅ Stored {} predictions", outcome.stored);
    if !outcome.failed.is_empty() {
        println!(
            "⚠️  Failed for {} fixtures: {:?}",
            outcome.failed.len(),
            outcome.failed
        );
        println!("💡 Retry them individually once the provider has data");
    }

    Ok(())
}

pub async fn enrich(config: &Config, fixture_id: i64) -> Result<()> {
    let api_key = config
        .generation_api_key
        .clone()
        .ok_or_else(|| anyhow!("LLM_API_KEY not set"))?;

    let pool = open_pool(config).await?;
    let generation = GenerationClient::new(api_key, config.generation_model.clone())?;
    let adapter = EnrichmentAdapter::new(generation, pool);

    if adapter.has_insight(fixture_id).await? {
        println!("ℹ️  Fixture {} already has an insight; generating another run", fixture_id);
    }

    println!("🤖 Generating insight for fixture {}...", fixture_id);
    let insight = adapter.enrich_fixture(fixture_id).await?;

    println!("✅ Insight stored\n");
    println!(
        "   Half time: {} ({:.0}%)",
        insight.half_time_score, insight.half_time_confidence
    );
    println!(
        "   Full time: {} ({:.0}%)",
        insight.full_time_score, insight.full_time_confidence
    );
    println!(
        "   Top prediction: {} ({:.0}%)",
        insight.prediction_1, insight.prediction_1_confidence
    );
    println!("   Key insights: {}", insight.key_insights);

    Ok(())
}

pub async fn schedule(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    let ingestor = build_ingestor(config, pool)?;

    println!("⏰ Daily schedule running; fixtures refresh at 00:01 UTC");
    scheduler::run_daily_schedule(ingestor).await;

    Ok(())
}

pub async fn init_db() -> Result<()> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:data/fixturecast.db".to_string());
    let pool = create_pool(&database_url).await?;
    init_database_with_pool(&pool).await?;
    println!("✅ Database initialized");
    Ok(())
}
