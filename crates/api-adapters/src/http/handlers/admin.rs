//! Admin-only endpoints: course management, student lookups, activity feed.

use std::convert::Infallible;
use std::time::Duration;

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use domains::{Activity, ActivityPresentation, Course, CourseId, CourseInput, Enrollment, UserId, UserProfile};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::http::extract::AdminUser;
use crate::http::{ApiResult, AppState};
use crate::views::{ActivityPage, ActivityRow};

const STREAM_PATH: &str = "/api/admin/activities/stream";

pub async fn list_courses(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<Course>>> {
    Ok(Json(state.services.catalog.all().await?))
}

pub async fn create_course(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<CourseInput>,
) -> ApiResult<Response> {
    let course = state.services.courses.create(&admin, input).await?;
    Ok((StatusCode::CREATED, Json(course)).into_response())
}

pub async fn update_course(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(input): Json<CourseInput>,
) -> ApiResult<Json<Course>> {
    Ok(Json(state.services.courses.update(&CourseId::new(id), input).await?))
}

pub async fn delete_course(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.courses.delete(&CourseId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn students(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<UserProfile>>> {
    Ok(Json(state.services.users.list_students().await?))
}

/// Courses the student is enrolled in, i.e. the ones a certificate can be
/// issued for.
pub async fn certificate_courses(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Course>>> {
    Ok(Json(state.services.certificates.eligible_courses(&UserId::new(id)).await?))
}

pub async fn user_enrollments(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    Ok(Json(state.services.enrollments.for_user(&UserId::new(id)).await?))
}

/// An activity with its display icon and message.
#[derive(Debug, Serialize)]
pub struct ActivityView {
    #[serde(flatten)]
    pub activity: Activity,
    #[serde(flatten)]
    pub presentation: ActivityPresentation,
}

impl From<Activity> for ActivityView {
    fn from(activity: Activity) -> Self {
        let presentation = activity.presentation();
        Self { activity, presentation }
    }
}

fn views(activities: Vec<Activity>) -> Vec<ActivityView> {
    activities.into_iter().map(ActivityView::from).collect()
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<usize>,
}

pub async fn activities(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(q): Query<FeedQuery>,
) -> ApiResult<Json<Vec<ActivityView>>> {
    Ok(Json(views(state.services.activity.recent(q.limit).await?)))
}

/// Full snapshot of the feed on connect and after every change.
pub async fn activity_stream(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    if let Err(e) = state.services.activity.refresh().await {
        tracing::warn!(error = %e, "activity snapshot refresh failed");
    }
    let stream = WatchStream::new(state.services.activity.subscribe()).map(|snapshot| {
        let event = Event::default().event("activities");
        Ok(match event.json_data(views(snapshot)) {
            Ok(event) => event,
            Err(e) => Event::default().event("error").data(e.to_string()),
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

pub async fn activity_page(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Html<String>> {
    let activities = state.services.activity.recent(None).await?;
    let rows: Vec<ActivityRow> = activities.iter().map(ActivityRow::from).collect();
    let page = ActivityPage { rows: &rows, stream_url: STREAM_PATH };
    Ok(Html(page.render()?))
}
