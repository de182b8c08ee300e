//! HTTP surface
//!
//! | Method     | Path                        | Operation                 |
//! |------------|-----------------------------|---------------------------|
//! | GET, POST  | `/api/technical-indicators` | indicator table           |
//! | GET        | `/api/news`                 | parsed news articles      |
//! | POST       | `/api/predict`              | forecast + recommendation |
//! | GET        | `/health`                   | liveness                  |
//!
//! Errors are returned as `{"detail": "<message>"}`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{ErrorKind, StockError};
use crate::pipeline::{PredictionResponse, StockPredictor};
use crate::types::{Exchange, FeatureRow, NewsArticle};

const DEFAULT_NEWS_ARTICLES: usize = 5;

/// A [`StockError`] rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub StockError);

impl From<StockError> for ApiError {
    fn from(err: StockError) -> Self {
        Self(err)
    }
}

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DataUnavailable => StatusCode::NOT_FOUND,
        ErrorKind::InsufficientData => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TrainingFailed
        | ErrorKind::NewsServiceDegraded
        | ErrorKind::Configuration
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, status = status.as_u16(), "request rejected");
        }

        let body = json!({ "detail": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

fn default_exchange() -> String {
    "NSE".to_string()
}

fn default_num_articles() -> usize {
    DEFAULT_NEWS_ARTICLES
}

/// Query of `/api/technical-indicators`
#[derive(Debug, Deserialize)]
pub struct IndicatorQuery {
    pub symbol: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

/// Query of `/api/news`
#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    pub symbol: String,
    #[serde(default = "default_num_articles")]
    pub num_articles: usize,
}

/// Body of `/api/predict`
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub stock: String,
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

/// Assemble the API router.
pub fn router(predictor: Arc<StockPredictor>) -> Router {
    Router::new()
        .route(
            "/api/technical-indicators",
            get(technical_indicators).post(technical_indicators),
        )
        .route("/api/news", get(news))
        .route("/api/predict", post(predict))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(predictor)
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, predictor: Arc<StockPredictor>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("stockcast listening on http://{addr}");

    axum::serve(listener, router(predictor))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn technical_indicators(
    State(predictor): State<Arc<StockPredictor>>,
    Query(query): Query<IndicatorQuery>,
) -> Result<Json<Vec<FeatureRow>>, ApiError> {
    let exchange = Exchange::from_code(&query.exchange);
    let rows = predictor
        .technical_indicators(&query.symbol, exchange)
        .await?;
    Ok(Json(rows))
}

async fn news(
    State(predictor): State<Arc<StockPredictor>>,
    Query(query): Query<NewsQuery>,
) -> Json<Vec<NewsArticle>> {
    Json(predictor.news(&query.symbol, query.num_articles).await)
}

async fn predict(
    State(predictor): State<Arc<StockPredictor>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let exchange = Exchange::from_code(&request.exchange);
    let response = predictor.predict(&request.stock, exchange).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockPriceSource;
    use crate::config::{PredictorConfig, SentimentBackend};
    use crate::news::NewsSentimentFuser;
    use crate::sentiment::NeutralScorer;

    fn predictor(source: MockPriceSource) -> Arc<StockPredictor> {
        let config = PredictorConfig::builder()
            .sentiment_backend(SentimentBackend::Disabled)
            .build()
            .unwrap();
        let news = NewsSentimentFuser::new(None, Arc::new(NeutralScorer));
        Arc::new(StockPredictor::with_sources(config, Arc::new(source), news))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::DataUnavailable), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::InsufficientData),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ErrorKind::TrainingFailed),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_uses_detail() {
        let response = ApiError(StockError::DataUnavailable {
            symbol: "XYZ.NS".to_string(),
            reason: "No data found".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "Data not available for XYZ.NS: No data found");
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_found() {
        let mut source = MockPriceSource::new();
        source.expect_fetch_history().returning(|ticker, _, _| {
            Err(StockError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "No data found".to_string(),
            })
        });

        let result = technical_indicators(
            State(predictor(source)),
            Query(IndicatorQuery {
                symbol: "NOPE".to_string(),
                exchange: default_exchange(),
            }),
        )
        .await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_news_without_provider_is_empty() {
        let Json(articles) = news(
            State(predictor(MockPriceSource::new())),
            Query(NewsQuery {
                symbol: "INFY".to_string(),
                num_articles: default_num_articles(),
            }),
        )
        .await;
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn test_predict_request_defaults_to_nse() {
        let request: PredictRequest = serde_json::from_str(r#"{"stock":"INFY"}"#).unwrap();
        assert_eq!(request.exchange, "NSE");
        assert_eq!(Exchange::from_code(&request.exchange), Exchange::Nse);
    }
}
