use chrono::{Timelike, Utc};
use std::time::Duration;

use crate::services::ingest::Ingestor;

/// How many days each scheduled run covers: today plus the next two.
const SCHEDULE_DAYS: u32 = 3;

/// Background daily schedule: checks the wall clock once a minute and, at
/// 00:01 UTC, ingests fixtures for the current date and the next two days.
/// Owns no pipeline state; it only calls the orchestrator's public entry
/// point, the same one a manual trigger uses.
pub async fn run_daily_schedule(ingestor: Ingestor) {
    tracing::info!("Daily fixture schedule running (00:01 UTC)");
    loop {
        let now = Utc::now();
        if now.hour() == 0 && now.minute() == 1 {
            tracing::info!("Starting scheduled fixtures fetch");
            let total = ingestor.ingest_date_range(now.date_naive(), SCHEDULE_DAYS).await;
            tracing::info!("Scheduled fetch stored {} fixtures", total);
            // Sleep past the trigger minute so one firing stays one run.
            tokio::time::sleep(Duration::from_secs(60)).await;
        } else {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }
}
