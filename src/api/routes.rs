use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{health, HealthState};
use crate::error::AppError;
use crate::mode::ModeManager;
use crate::query::QueryService;
use crate::types::{AggregateResponse, Mode};

#[derive(Clone)]
pub struct ApiState {
    pub query: Arc<QueryService>,
    pub mode_manager: Arc<ModeManager>,
    pub health: HealthState,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/prices/latest/:symbol", get(latest_by_symbol))
        .route("/prices/latest/:exchange/:symbol", get(latest_by_exchange))
        .route("/prices/highest/:symbol", get(highest_by_symbol))
        .route("/prices/highest/:exchange/:symbol", get(highest_by_exchange))
        .route("/prices/lowest/:symbol", get(lowest_by_symbol))
        .route("/prices/lowest/:exchange/:symbol", get(lowest_by_exchange))
        .route("/prices/average/:symbol", get(average_by_symbol))
        .route("/prices/average/:exchange/:symbol", get(average_by_exchange))
        .route("/mode/test", get(switch_to_test).post(switch_to_test))
        .route("/mode/live", get(switch_to_live).post(switch_to_live))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Serialize)]
pub struct AverageResponse {
    pub avg: f64,
}

#[derive(Serialize)]
pub struct ModeResponse {
    pub message: String,
}

async fn latest_by_symbol(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> Result<Json<AggregateResponse>, AppError> {
    Ok(Json(state.query.latest(&symbol).await?))
}

async fn latest_by_exchange(
    State(state): State<ApiState>,
    Path((exchange, symbol)): Path<(String, String)>,
) -> Result<Json<AggregateResponse>, AppError> {
    Ok(Json(state.query.latest_by_exchange(&exchange, &symbol).await?))
}

async fn highest_by_symbol(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<AggregateResponse>, AppError> {
    Ok(Json(state.query.highest(&symbol, q.period.as_deref()).await?))
}

async fn highest_by_exchange(
    State(state): State<ApiState>,
    Path((exchange, symbol)): Path<(String, String)>,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<AggregateResponse>, AppError> {
    Ok(Json(
        state
            .query
            .highest_by_exchange(&exchange, &symbol, q.period.as_deref())
            .await?,
    ))
}

async fn lowest_by_symbol(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<AggregateResponse>, AppError> {
    Ok(Json(state.query.lowest(&symbol, q.period.as_deref()).await?))
}

async fn lowest_by_exchange(
    State(state): State<ApiState>,
    Path((exchange, symbol)): Path<(String, String)>,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<AggregateResponse>, AppError> {
    Ok(Json(
        state
            .query
            .lowest_by_exchange(&exchange, &symbol, q.period.as_deref())
            .await?,
    ))
}

async fn average_by_symbol(
    State(state): State<ApiState>,
    Path(symbol): Path<String>,
) -> Result<Json<AverageResponse>, AppError> {
    let avg = state.query.average(&symbol).await?;
    Ok(Json(AverageResponse { avg }))
}

async fn average_by_exchange(
    State(state): State<ApiState>,
    Path((exchange, symbol)): Path<(String, String)>,
    Query(q): Query<PeriodQuery>,
) -> Result<Json<AverageResponse>, AppError> {
    let avg = state
        .query
        .average_by_exchange(&exchange, &symbol, q.period.as_deref())
        .await?;
    Ok(Json(AverageResponse { avg }))
}

async fn switch_to_test(State(state): State<ApiState>) -> Result<Json<ModeResponse>, AppError> {
    state.mode_manager.set_mode(Mode::Test).await?;
    Ok(Json(ModeResponse {
        message: "switched to TEST mode".to_string(),
    }))
}

async fn switch_to_live(State(state): State<ApiState>) -> Result<Json<ModeResponse>, AppError> {
    state.mode_manager.set_mode(Mode::Live).await?;
    Ok(Json(ModeResponse {
        message: "switched to LIVE mode".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::durable::{DurableStore, InMemoryDurableStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let durable = Arc::new(InMemoryDurableStore::new());
        durable
            .insert(crate::types::AggregateRecord {
                pair: "BTCUSDT".to_string(),
                exchange: "EX1".to_string(),
                bucket_end: chrono::Utc::now(),
                avg: 150.0,
                min: 100.0,
                max: 200.0,
            })
            .await
            .unwrap();

        let query = Arc::new(QueryService::new(durable.clone() as Arc<dyn DurableStore>));
        let (tx, _rx) = mpsc::channel(16);
        let mode_manager = Arc::new(ModeManager::start(Vec::new(), tx).await.unwrap());
        let health = HealthState { durable: durable as Arc<dyn DurableStore> };

        router(ApiState { query, mode_manager, health })
    }

    #[tokio::test]
    async fn latest_returns_known_symbol() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/prices/latest/BTCUSDT").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn latest_returns_400_for_unknown_symbol() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/prices/latest/NOPE").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "no data found for symbol: NOPE" }));
    }

    #[tokio::test]
    async fn health_is_always_200() {
        let app = test_app().await;
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn switching_to_test_mode_returns_message() {
        let app = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mode/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
