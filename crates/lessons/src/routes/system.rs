use axum::extract::State;
use axum::Json;
use llm_core::ChatModel;
use serde::Serialize;

use super::{respond, LessonJson};
use crate::catalog::{Lesson, LESSONS};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::usage::UsageReport;

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    model: String,
}

/// 200 when the runtime answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Health>> {
    if !state.llm("/api/health").health().await {
        return Err(ApiError::Unavailable(
            "runtime did not answer the health check".to_string(),
        ));
    }
    Ok(Json(Health {
        status: "ok",
        model: state.model_name().to_string(),
    }))
}

pub async fn usage(State(state): State<AppState>) -> Json<UsageReport> {
    Json(state.usage.report())
}

pub async fn lessons() -> LessonJson<&'static [Lesson]> {
    respond(LESSONS)
}
