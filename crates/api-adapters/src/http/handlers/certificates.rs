//! Certificate issue/list/download and the admin upload endpoint.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use domains::{Certificate, CourseId, DomainError, Identity, UserId, UserProfile};
use serde::Deserialize;
use serde_json::json;
use services::{CertificateDraft, CertificateUpload};

use crate::http::extract::{AdminUser, Authenticated};
use crate::http::{ApiError, ApiResult, AppState};

/// Text fields plus at most one `file` part.
struct UploadForm {
    fields: HashMap<String, String>,
    file: Option<CertificateUpload>,
}

impl UploadForm {
    fn text(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|n| self.fields.get(*n))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm { fields: HashMap::new(), file: None };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            form.file = Some(CertificateUpload { file_name, content_type, data });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Admin issues a certificate: `studentId`, `courseId`, `file`, optional
/// `verificationCode`.
pub async fn issue(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    multipart: Multipart,
) -> ApiResult<Response> {
    let form = read_form(multipart).await?;
    let draft = CertificateDraft {
        student_id: form.text(&["studentId", "userId"]).map(UserId::new),
        course_id: form.text(&["courseId"]).map(CourseId::new),
        verification_code: form.text(&["verificationCode"]),
        file: form.file,
    };
    let certificate = state.services.certificates.issue(&admin, draft.ready()?).await?;
    state.metrics.certificate_issued();
    Ok((StatusCode::CREATED, Json(certificate)).into_response())
}

/// Profile used for ownership checks; callers without a stored profile are
/// treated as plain students.
async fn requester(state: &AppState, identity: &Identity) -> ApiResult<UserProfile> {
    Ok(state
        .services
        .users
        .get(&identity.user_id)
        .await?
        .unwrap_or_else(|| UserProfile {
            id: identity.user_id.clone(),
            email: identity.email.clone(),
            display_name: identity.name.clone().unwrap_or_default(),
            role: "student".into(),
            certificates: Vec::new(),
            created_at: None,
        }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<Certificate>>> {
    let target = q
        .user_id
        .filter(|id| !id.trim().is_empty())
        .map(UserId::new)
        .unwrap_or_else(|| identity.user_id.clone());
    if target != identity.user_id && !requester(&state, &identity).await?.is_admin() {
        return Err(DomainError::Forbidden("certificates belong to another user".into()).into());
    }
    Ok(Json(state.services.certificates.list_for_user(&target).await?))
}

pub async fn download(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Redirect> {
    let profile = requester(&state, &identity).await?;
    let url = state.services.certificates.download_url(&profile, &id).await?;
    Ok(Redirect::temporary(&url))
}

/// Stores an arbitrary file under `owner` (defaults to the uploader) and
/// returns its public path.
pub async fn upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    multipart: Multipart,
) -> ApiResult<Response> {
    let form = read_form(multipart).await?;
    let owner = form
        .text(&["owner", "userId"])
        .unwrap_or_else(|| admin.id.to_string());
    let file = form
        .file
        .filter(|f| !f.data.is_empty())
        .ok_or_else(|| DomainError::Validation("file is required".into()))?;

    let stored = state
        .services
        .media
        .save(&owner, &file.file_name, &file.content_type, file.data)
        .await?;
    tracing::info!(%owner, key = %stored.key, "file uploaded");
    let body = json!({ "key": stored.key, "path": stored.url });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}
