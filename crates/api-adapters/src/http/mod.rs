//! # HTTP surface
//!
//! axum router over [`services::Services`]. Handlers stay thin: extract,
//! call one service, map the result.

pub mod error;
pub mod extract;
mod handlers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use domains::IdentityProvider;
use services::Services;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;

pub use error::{ApiError, ApiResult, ErrorBody};

/// Request-path settings that never reach the service layer.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub max_upload_bytes: usize,
    /// Local directory behind `media_url_prefix`; `None` disables static serving.
    pub media_root: Option<PathBuf>,
    pub media_url_prefix: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            media_root: None,
            media_url_prefix: "/uploads".into(),
        }
    }
}

/// Shared across every request; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Arc<Metrics>,
    pub settings: Arc<HttpSettings>,
}

impl AppState {
    pub fn new(services: Services, identity: Arc<dyn IdentityProvider>, settings: HttpSettings) -> Self {
        Self {
            services,
            identity,
            metrics: Arc::new(Metrics::new()),
            settings: Arc::new(settings),
        }
    }
}

pub fn router(state: AppState) -> Router {
    use handlers::{admin, catalog, certificates, me, ops, payments, registration};

    let api = Router::new()
        .route("/api/courses", get(catalog::list_courses))
        .route("/api/courses/related", get(catalog::related_courses))
        .route("/api/courses/{slug}", get(catalog::course_detail))
        .route("/api/registration/validate/{step}", post(registration::validate_step))
        .route("/api/checkout", post(registration::checkout))
        .route("/api/payment/initialize", post(payments::initialize))
        .route("/api/payment/verify", get(payments::verify))
        .route("/api/payment/webhook", post(payments::webhook))
        .route("/api/me", get(me::profile).post(me::sign_in))
        .route("/api/me/enrollments", get(me::enrollments))
        .route(
            "/api/certificates",
            get(certificates::list).post(certificates::issue),
        )
        .route("/api/certificates/{id}/download", get(certificates::download))
        .route("/api/uploads", post(certificates::upload))
        .route("/api/admin/courses", get(admin::list_courses).post(admin::create_course))
        .route(
            "/api/admin/courses/{id}",
            put(admin::update_course).delete(admin::delete_course),
        )
        .route("/api/admin/students", get(admin::students))
        .route(
            "/api/admin/students/{id}/certificate-courses",
            get(admin::certificate_courses),
        )
        .route("/api/admin/users/{id}/enrollments", get(admin::user_enrollments))
        .route("/api/admin/activities", get(admin::activities))
        .route("/api/admin/activities/stream", get(admin::activity_stream));

    let pages = Router::new()
        .route("/payment/callback", get(payments::callback))
        .route("/admin/activity", get(admin::activity_page))
        .route("/health", get(ops::health))
        .route("/metrics", get(ops::metrics));

    let mut app = api.merge(pages);
    if let Some(root) = &state.settings.media_root {
        app = app.nest_service(&state.settings.media_url_prefix, ServeDir::new(root));
    }

    let max_upload_bytes = state.settings.max_upload_bytes;
    app.layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
