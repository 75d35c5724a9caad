//! Public catalog reads.

use axum::extract::{Path, Query, State};
use axum::Json;
use domains::{Course, CourseId, CourseSummary};
use serde::Deserialize;

use crate::http::{ApiResult, AppState};

const DEFAULT_RELATED_LIMIT: usize = 3;
const MAX_RELATED_LIMIT: usize = 20;

pub async fn list_courses(State(state): State<AppState>) -> ApiResult<Json<Vec<CourseSummary>>> {
    Ok(Json(state.services.catalog.listing().await?))
}

pub async fn course_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Course>> {
    Ok(Json(state.services.catalog.get_by_slug_or_id(&slug).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedQuery {
    #[serde(default)]
    pub category: String,
    pub exclude_id: Option<String>,
    pub limit: Option<usize>,
}

pub async fn related_courses(
    State(state): State<AppState>,
    Query(q): Query<RelatedQuery>,
) -> ApiResult<Json<Vec<Course>>> {
    let exclude = q
        .exclude_id
        .filter(|id| !id.trim().is_empty())
        .map(CourseId::new);
    let limit = q.limit.unwrap_or(DEFAULT_RELATED_LIMIT).min(MAX_RELATED_LIMIT);
    let courses = state
        .services
        .catalog
        .related(&q.category, exclude.as_ref(), limit)
        .await?;
    Ok(Json(courses))
}
