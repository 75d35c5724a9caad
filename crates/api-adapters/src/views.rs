//! Server-rendered pages. Everything else the API returns is JSON.

use askama::Template;
use domains::Activity;

/// Result page the gateway's browser redirect lands on.
#[derive(Template)]
#[template(path = "payment_callback.html")]
pub struct PaymentCallbackPage<'a> {
    pub success: bool,
    pub heading: &'a str,
    pub message: &'a str,
    pub reference: Option<&'a str>,
    pub course_title: Option<&'a str>,
    pub enrollment_id: Option<&'a str>,
}

pub struct ActivityRow {
    pub icon: &'static str,
    pub message: String,
    pub when: String,
}

impl From<&Activity> for ActivityRow {
    fn from(activity: &Activity) -> Self {
        let shown = activity.presentation();
        Self {
            icon: shown.icon,
            message: shown.message,
            when: activity.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

/// Admin activity feed. The page subscribes to `stream_url` for updates.
#[derive(Template)]
#[template(path = "activity.html")]
pub struct ActivityPage<'a> {
    pub rows: &'a [ActivityRow],
    pub stream_url: &'a str,
}
