use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{load_major_leagues, Config};
use crate::db::{self, create_pool, init_database_with_pool};
use crate::models::{ApiResponse, BatchOutcome, FixtureCounts, MatchInsight};
use crate::services::{EnrichmentAdapter, GenerationClient, Ingestor, ProviderClient, RetryPolicy};

#[derive(Clone)]
struct AppState {
    pool: SqlitePool,
    config: Config,
    ingestor: Ingestor,
    league_ids: Arc<Vec<i64>>,
}

pub async fn serve(port: u16, config: Config) -> anyhow::Result<()> {
    let pool = create_pool(&config.database_url).await?;
    init_database_with_pool(&pool).await?;

    let leagues = load_major_leagues(&config.major_leagues_path)?;
    let league_ids: Vec<i64> = leagues.iter().map(|l| l.id).collect();

    let provider = ProviderClient::new(&config)?;
    let ingestor = Ingestor::new(
        provider,
        pool.clone(),
        config.prediction_batch_size,
        RetryPolicy::default(),
    );

    let state = AppState {
        pool,
        config,
        ingestor,
        league_ids: Arc::new(league_ids),
    };

    let app = create_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("fixturecast API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ingest", post(ingest_handler))
        .route("/fixtures/{date}/stats", get(fixture_stats_handler))
        .route("/fixtures/{date}", delete(delete_fixtures_handler))
        .route("/fixtures/{date}/predictions", delete(delete_predictions_handler))
        .route("/insights/{id}", get(enrichment_status_handler).post(enrich_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("fixturecast API is running"))
}

// POST /ingest - manual ingestion trigger for one date
#[derive(Debug, Deserialize)]
struct IngestRequest {
    date: NaiveDate,
    mode: IngestMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum IngestMode {
    Fixtures,
    Predictions,
}

async fn ingest_handler(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<ApiResponse<BatchOutcome>>, StatusCode> {
    match request.mode {
        IngestMode::Fixtures => match state.ingestor.ingest_fixtures(request.date).await {
            Ok(stored) => Ok(Json(ApiResponse::success(BatchOutcome {
                stored,
                failed: Vec::new(),
            }))),
            Err(e) => {
                tracing::error!("Fixture ingestion failed for {}: {}", request.date, e);
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
        IngestMode::Predictions => {
            // Only major-league fixtures that have not kicked off yet.
            let ids = match db::major_fixture_ids_for_date(
                &state.pool,
                request.date,
                &state.league_ids,
                Some(Utc::now()),
            )
            .await
            {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::error!("Failed to select prediction candidates: {}", e);
                    return Err(StatusCode::INTERNAL_SERVER_ERROR);
                }
            };

            let outcome = state.ingestor.ingest_predictions(&ids).await;
            Ok(Json(ApiResponse::success(outcome)))
        }
    }
}

// GET /fixtures/{date}/stats - stored fixture counts for a date
async fn fixture_stats_handler(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<ApiResponse<FixtureCounts>>, StatusCode> {
    match db::fixture_counts_for_date(&state.pool, date, &state.league_ids).await {
        Ok(counts) => Ok(Json(ApiResponse::success(counts))),
        Err(e) => {
            tracing::error!("Failed to count fixtures for {}: {}", date, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// DELETE /fixtures/{date} - operator action: drop a date's fixtures
async fn delete_fixtures_handler(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<ApiResponse<u64>>, StatusCode> {
    match db::delete_fixtures_for_date(&state.pool, date).await {
        Ok(removed) => {
            tracing::info!("Deleted {} fixtures for {}", removed, date);
            Ok(Json(ApiResponse::success(removed)))
        }
        Err(e) => {
            tracing::error!("Failed to delete fixtures for {}: {}", date, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// DELETE /fixtures/{date}/predictions - operator action: drop a date's
// major-league predictions
async fn delete_predictions_handler(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<ApiResponse<u64>>, StatusCode> {
    let ids = match db::major_fixture_ids_for_date(&state.pool, date, &state.league_ids, None).await
    {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!("Failed to select predictions to delete: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match db::delete_predictions_for_ids(&state.pool, &ids).await {
        Ok(removed) => {
            tracing::info!("Deleted {} predictions for {}", removed, date);
            Ok(Json(ApiResponse::success(removed)))
        }
        Err(e) => {
            tracing::error!("Failed to delete predictions for {}: {}", date, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// GET /insights/{id} - whether an insight already exists for a fixture
#[derive(Debug, Serialize)]
struct EnrichmentStatus {
    exists: bool,
}

async fn enrichment_status_handler(
    State(state): State<AppState>,
    Path(fixture_id): Path<i64>,
) -> Result<Json<ApiResponse<EnrichmentStatus>>, StatusCode> {
    match db::has_match_insight(&state.pool, fixture_id).await {
        Ok(exists) => Ok(Json(ApiResponse::success(EnrichmentStatus { exists }))),
        Err(e) => {
            tracing::error!("Failed to check insight for fixture {}: {}", fixture_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// POST /insights/{id} - run the generation service for one fixture
async fn enrich_handler(
    State(state): State<AppState>,
    Path(fixture_id): Path<i64>,
) -> Result<Json<ApiResponse<MatchInsight>>, StatusCode> {
    let Some(api_key) = state.config.generation_api_key.clone() else {
        tracing::warn!("Enrichment requested but LLM_API_KEY is not configured");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let generation = match GenerationClient::new(api_key, state.config.generation_model.clone()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to build generation client: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let adapter = EnrichmentAdapter::new(generation, state.pool.clone());
    match adapter.enrich_fixture(fixture_id).await {
        Ok(insight) => Ok(Json(ApiResponse::success(insight))),
        Err(e) => {
            tracing::error!("Enrichment failed for fixture {}: {}", fixture_id, e);
            Ok(Json(ApiResponse::error(e.to_string())))
        }
    }
}
