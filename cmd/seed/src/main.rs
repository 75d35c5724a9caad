//! Seeds the configured SQLite store with demo courses and an admin
//! profile, then prints a bearer token for that admin.
//!
//! Usage: `seed [admin-email]`

use anyhow::Context;
use auth_adapters::JwtIssuer;
use chrono::{Duration, Utc};
use configs::AppConfig;
use domains::{collections, DocumentStore, Identity, UserId};
use serde_json::json;
use storage_adapters::SqliteDocumentStore;

const ADMIN_ID: &str = "seed-admin";

fn demo_courses() -> Vec<(&'static str, serde_json::Value)> {
    vec![
        (
            "rust-fundamentals",
            json!({
                "title": "Rust Fundamentals",
                "slug": "rust-fundamentals",
                "description": "Ownership, borrowing and the type system from first principles.",
                "category": "Programming",
                "level": "Beginner",
                "price": 25000,
                "published": true,
                "instructor": "Grace Okafor",
                "rating": 4.8,
                "enrolledStudents": 0,
            }),
        ),
        (
            "async-services",
            json!({
                "title": "Async Services in Practice",
                "slug": "async-services",
                "description": "Building network services with tokio and axum.",
                "category": "Programming",
                "level": "Advanced",
                "price": 45000,
                "published": true,
                "instructor": "Tunde Bello",
                "rating": 4.6,
                "enrolledStudents": 0,
            }),
        ),
        (
            "intro-to-data",
            json!({
                "title": "Introduction to Data Analysis",
                "slug": "intro-to-data",
                "description": "Spreadsheets, SQL and charts for beginners.",
                "category": "Data",
                "level": "Beginner",
                "price": 0,
                "published": true,
                "instructor": "Amaka Eze",
                "rating": 4.4,
                "enrolledStudents": 0,
            }),
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    configs::load_dotenv();
    let cfg = AppConfig::load().context("loading configuration")?;
    tracing_subscriber::fmt().with_env_filter(cfg.log.filter.as_str()).init();

    let admin_email = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "admin@example.com".to_string());

    let store = SqliteDocumentStore::connect(&cfg.database.url)
        .await
        .with_context(|| format!("opening {}", cfg.database.url))?;

    for (id, course) in demo_courses() {
        store.set(collections::COURSES, id, course).await?;
        tracing::info!(%id, "course seeded");
    }

    store
        .set(
            collections::USERS,
            ADMIN_ID,
            json!({
                "id": ADMIN_ID,
                "email": admin_email,
                "displayName": "Administrator",
                "role": "admin",
                "certificates": [],
                "createdAt": Utc::now(),
            }),
        )
        .await?;

    let identity = Identity {
        user_id: UserId::new(ADMIN_ID),
        email: admin_email,
        name: Some("Administrator".into()),
    };
    let token = JwtIssuer::new(&cfg.auth.jwt_secret).issue(&identity, Duration::days(30))?;
    store.shutdown().await;

    println!("admin token (30 days):\n{token}");
    Ok(())
}
