use axum::extract::State;
use axum::Json;
use domains::{Enrollment, UserProfile};

use crate::http::extract::Authenticated;
use crate::http::{ApiResult, AppState};

pub async fn profile(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.services.users.require(&identity.user_id).await?))
}

/// Called by the front end after sign-in; creates the profile on first visit.
pub async fn sign_in(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.services.users.ensure_profile(&identity).await?))
}

pub async fn enrollments(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> ApiResult<Json<Vec<Enrollment>>> {
    Ok(Json(state.services.enrollments.for_user(&identity.user_id).await?))
}
