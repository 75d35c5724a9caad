//! # course-market
//!
//! Server entry point. Every client handle (document store, media storage,
//! payment gateway, identity provider) is built here, passed down
//! explicitly, and released after the HTTP server drains.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_adapters::{router, AppState, HttpSettings};
use auth_adapters::JwtIdentityProvider;
use configs::{AppConfig, ExposeSecret, LogConfig};
use domains::{DocumentStore, MediaStorage, PaymentGateway};
use payment_adapters::{PaystackGateway, SimulatedGateway};
use secrecy::SecretString;
use services::{CatalogSettings, PaymentSettings, Ports, RetryPolicy, ServiceSettings, Services};
use storage_adapters::{LocalMediaStorage, MemoryDocumentStore, SqliteDocumentStore};
use tracing_subscriber::EnvFilter;

const CALLBACK_PATH: &str = "/payment/callback";

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if log.json {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

async fn document_store(url: &str) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if url == "memory" {
        tracing::warn!("using the in-memory document store; data is lost on restart");
        return Ok(Arc::new(MemoryDocumentStore::new()));
    }
    let store = SqliteDocumentStore::connect(url)
        .await
        .with_context(|| format!("opening document store at {url}"))?;
    Ok(Arc::new(store))
}

fn payment_gateway(cfg: &AppConfig) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    if cfg.payment.mock_mode {
        tracing::warn!("payment mock mode is on; no real charges will be made");
        return Ok(Arc::new(SimulatedGateway::new()));
    }
    let gateway = PaystackGateway::new(&cfg.payment.base_url, copy_secret(cfg.payment.secret_key.as_ref()))
        .context("building payment gateway client")?
        .with_currency(&cfg.payment.currency);
    Ok(Arc::new(gateway))
}

fn copy_secret(secret: Option<&SecretString>) -> Option<SecretString> {
    secret.map(|s| SecretString::from(s.expose_secret().to_string()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for SIGTERM"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    configs::load_dotenv();
    let cfg = AppConfig::load().context("loading configuration")?;
    init_tracing(&cfg.log);

    let store = document_store(&cfg.database.url).await?;
    let media: Arc<dyn MediaStorage> =
        Arc::new(LocalMediaStorage::new(&cfg.media.root, &cfg.media.url_prefix));
    let gateway = payment_gateway(&cfg)?;
    let identity = Arc::new(JwtIdentityProvider::new(&cfg.auth.jwt_secret));

    let base_url = cfg.server.public_base_url.trim_end_matches('/');
    let services = Services::new(
        Ports { store: store.clone(), media, gateway },
        ServiceSettings {
            catalog: CatalogSettings {
                upcoming_slugs: cfg.catalog.upcoming_slugs.clone(),
                flat_listing_price: cfg.catalog.flat_listing_price,
            },
            payment: PaymentSettings {
                callback_url: format!("{base_url}{CALLBACK_PATH}"),
                mock_mode: cfg.payment.mock_mode,
                webhook_secret: copy_secret(cfg.webhook_secret()),
            },
            certificate_upload: RetryPolicy {
                attempts: cfg.certificates.upload_attempts,
                backoff: Duration::from_millis(cfg.certificates.upload_backoff_ms),
            },
            activity_feed_limit: cfg.activity.feed_limit,
            login_path: cfg.auth.login_path.clone(),
            callback_path: CALLBACK_PATH.into(),
        },
    );
    if let Err(e) = services.activity.refresh().await {
        tracing::warn!(error = %e, "initial activity snapshot failed");
    }

    let state = AppState::new(
        services,
        identity,
        HttpSettings {
            max_upload_bytes: cfg.media.max_upload_bytes,
            media_root: Some(PathBuf::from(&cfg.media.root)),
            media_url_prefix: cfg.media.url_prefix.clone(),
        },
    );
    let app = router(state);

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, mock_mode = cfg.payment.mock_mode, "course-market listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    store.shutdown().await;
    tracing::info!("stopped");
    Ok(())
}
