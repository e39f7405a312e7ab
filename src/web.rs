//! Axum-based HTTP state surface
//!
//! Read-only endpoints over the tariff cache for the host platform and for
//! diagnostics. Serving a request never triggers a fetch.

use crate::cache::TariffCache;
use crate::config::Config;
use crate::error::{ObolusError, Result};
use crate::schedule::TariffType;
use crate::sensor::build_state;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<TariffCache>,
    pub config: Arc<Config>,
    pub tz: Tz,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// All configured tariff sensors, keyed by tariff type
pub async fn sensors(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let mut map = serde_json::Map::new();
    for tariff_type in &state.config.tariffs.types {
        let sensor_state = build_state(&state.cache, &state.config, state.tz, *tariff_type, now);
        map.insert(
            tariff_type.as_str().to_string(),
            serde_json::to_value(&sensor_state)
                .unwrap_or(serde_json::json!({"error": "serialization"})),
        );
    }
    Json(serde_json::Value::Object(map))
}

/// A single tariff sensor by type label
pub async fn sensor(
    Path(tariff_type): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let known = TariffType::from_label(&tariff_type)
        .filter(|t| state.config.tariffs.types.contains(t));
    match known {
        Some(tariff_type) => {
            let sensor_state =
                build_state(&state.cache, &state.config, state.tz, tariff_type, Utc::now());
            Json(sensor_state).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "unknown tariff type"})),
        )
            .into_response(),
    }
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let json = serde_json::to_value(state.config.as_ref())
        .unwrap_or(serde_json::json!({"error": "serialization"}));
    Json(json)
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sensors", get(sensors))
        .route("/api/sensors/{tariff_type}", get(sensor))
        .route("/api/config", get(get_config))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process stops
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let router = router(state);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .unwrap_or(([127, 0, 0, 1], port).into());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ObolusError::web(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, router)
        .await
        .map_err(|e| ObolusError::web(e.to_string()))?;
    Ok(())
}
