// src/api.rs
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::QueryError;
use crate::ingest::types::RateRow;
use crate::query::{RateQuery, ALL};

/// Body of every 404, including rejected authorization.
pub const NOT_FOUND_BODY: &str = "The page you access does not exist.";

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<RateQuery>,
    /// Requests are rejected when no token is configured.
    pub auth_token: Option<Arc<str>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/v1/exchangerate", get(exchange_rate))
        .fallback(not_found)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct RateParams {
    currency: Option<String>,
    now: Option<String>,
}

#[derive(Debug, Serialize)]
struct RateOut {
    currency: String,
    name: String,
    exch_buy: Option<f64>,
    exch_sell: Option<f64>,
    cash_buy: Option<f64>,
    cash_sell: Option<f64>,
}

impl From<RateRow> for RateOut {
    fn from(r: RateRow) -> Self {
        Self {
            currency: r.code,
            name: r.name,
            exch_buy: r.exchange_buy,
            exch_sell: r.exchange_sell,
            cash_buy: r.cash_buy,
            cash_sell: r.cash_sell,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ApiResponse {
    Success { data: Vec<RateOut> },
    Error { message: String },
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

fn authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

async fn exchange_rate(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<RateParams>, QueryRejection>,
) -> Response {
    // authorization is checked before the query string is looked at
    if !authorized(&headers, state.auth_token.as_deref()) {
        tracing::warn!(target: "api", "rejected request: bad or missing authorization");
        counter!("fx_api_requests_total", "status" => "unauthorized").increment(1);
        return not_found().await;
    }
    let params = match params {
        Ok(Query(p)) => p,
        Err(rejection) => {
            counter!("fx_api_requests_total", "status" => "invalid").increment(1);
            let body = ApiResponse::Error {
                message: rejection.body_text(),
            };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let currency = params.currency.as_deref().unwrap_or(ALL);
    let live = params
        .now
        .as_deref()
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
    tracing::info!(target: "api", currency, live, "exchange rate request");

    let (status, body, label) = match state.query.get_rate(currency, live).await {
        Ok(table) => (
            StatusCode::OK,
            ApiResponse::Success {
                data: table.into_rows().into_iter().map(RateOut::from).collect(),
            },
            "success",
        ),
        Err(e @ QueryError::Validation(_)) => (
            StatusCode::BAD_REQUEST,
            ApiResponse::Error {
                message: e.to_string(),
            },
            "invalid",
        ),
        Err(e @ QueryError::Unavailable) => {
            tracing::error!(target: "api", error = %e, "exchange rate unavailable");
            (
                StatusCode::BAD_GATEWAY,
                ApiResponse::Error {
                    message: e.to_string(),
                },
                "unavailable",
            )
        }
    };
    counter!("fx_api_requests_total", "status" => label).increment(1);
    (status, Json(body)).into_response()
}
