//! # configs
//!
//! Layered runtime configuration for the course marketplace.
//!
//! Sources, lowest precedence first:
//! 1. compiled defaults ([`AppConfig::builder`])
//! 2. `config/default.toml`, then `config/local.toml` (both optional)
//! 3. environment variables prefixed `COURSE_MARKET_`, nested with `__`
//!    (e.g. `COURSE_MARKET_PAYMENT__MOCK_MODE=true`)
//!
//! Secrets are wrapped in [`SecretString`] so they never show up in `Debug`
//! output or logs.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub use secrecy::ExposeSecret;

pub const ENV_PREFIX: &str = "COURSE_MARKET";

/// Shortest accepted HS256 signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub catalog: CatalogConfig,
    pub activity: ActivityConfig,
    pub certificates: CertificateConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Absolute base URL the browser reaches us on; used for gateway callbacks.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub root: String,
    pub url_prefix: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// No default: every deployment supplies its own.
    #[serde(deserialize_with = "secret")]
    pub jwt_secret: SecretString,
    pub login_path: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentConfig {
    #[serde(default, deserialize_with = "optional_secret")]
    pub secret_key: Option<SecretString>,
    /// Falls back to `secret_key` when unset, which is how the gateway signs webhooks.
    #[serde(default, deserialize_with = "optional_secret")]
    pub webhook_secret: Option<SecretString>,
    pub base_url: String,
    pub currency: String,
    /// Development only: bypass the real gateway and fabricate `MOCK-` references.
    pub mock_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Slugs advertised as "coming soon" in the course listing.
    #[serde(default)]
    pub upcoming_slugs: Vec<String>,
    /// When set, the listing endpoint reports this price for every course.
    #[serde(default)]
    pub flat_listing_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityConfig {
    pub feed_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificateConfig {
    pub upload_attempts: u32,
    pub upload_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

impl AppConfig {
    /// Builder pre-populated with every default. Callers may add sources or
    /// overrides before calling [`AppConfig::from_builder`].
    pub fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.public_base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://course_market.db")?
            .set_default("media.root", "./data/uploads")?
            .set_default("media.url_prefix", "/uploads")?
            .set_default("media.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("auth.login_path", "/login")?
            .set_default("payment.base_url", "https://api.paystack.co")?
            .set_default("payment.currency", "NGN")?
            .set_default("payment.mock_mode", false)?
            .set_default("catalog.upcoming_slugs", Vec::<String>::new())?
            .set_default("activity.feed_limit", 20)?
            .set_default("certificates.upload_attempts", 3)?
            .set_default("certificates.upload_backoff_ms", 1000)?
            .set_default("log.filter", "info,tower_http=debug")?
            .set_default("log.json", false)?;
        Ok(builder)
    }

    /// Loads defaults, optional config files and `COURSE_MARKET_*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("catalog.upcoming_slugs")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let jwt_secret = self.auth.jwt_secret.expose_secret().trim();
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes (set {ENV_PREFIX}_AUTH__JWT_SECRET)"
            )));
        }
        if self.certificates.upload_attempts == 0 {
            return Err(ConfigError::Invalid(
                "certificates.upload_attempts must be at least 1".into(),
            ));
        }
        if self.activity.feed_limit == 0 {
            return Err(ConfigError::Invalid("activity.feed_limit must be at least 1".into()));
        }
        if !self.server.public_base_url.starts_with("http") {
            return Err(ConfigError::Invalid(format!(
                "server.public_base_url must be an absolute URL, got {:?}",
                self.server.public_base_url
            )));
        }
        if let Some(price) = self.catalog.flat_listing_price {
            if !price.is_finite() || price < 0.0 {
                return Err(ConfigError::Invalid(
                    "catalog.flat_listing_price must be a non-negative number".into(),
                ));
            }
        }
        if !self.payment.mock_mode && self.payment.secret_key.is_none() {
            tracing::warn!("payment.secret_key is not set; payment initialization will fail");
        }
        Ok(())
    }

    /// Secret used to validate gateway webhook signatures.
    pub fn webhook_secret(&self) -> Option<&SecretString> {
        self.payment
            .webhook_secret
            .as_ref()
            .or(self.payment.secret_key.as_ref())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Reads `.env` into the process environment if present.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
}

fn secret<'de, D: Deserializer<'de>>(de: D) -> Result<SecretString, D::Error> {
    String::deserialize(de).map(SecretString::from)
}

fn optional_secret<'de, D: Deserializer<'de>>(de: D) -> Result<Option<SecretString>, D::Error> {
    let raw = Option::<String>::deserialize(de)?;
    Ok(raw.filter(|s| !s.trim().is_empty()).map(SecretString::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNING_SECRET: &str = "0123456789abcdef0123456789abcdef";

    /// Defaults plus the one setting that has none.
    fn builder() -> ConfigBuilder<DefaultState> {
        AppConfig::builder()
            .unwrap()
            .set_override("auth.jwt_secret", SIGNING_SECRET)
            .unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::from_builder(builder()).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.certificates.upload_attempts, 3);
        assert!(!cfg.payment.mock_mode);
        assert!(cfg.payment.secret_key.is_none());
        assert_eq!(cfg.auth.login_path, "/login");
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn overrides_take_precedence() {
        let builder = builder()
            .set_override("payment.mock_mode", true)
            .unwrap()
            .set_override("payment.secret_key", "sk_test_123")
            .unwrap();
        let cfg = AppConfig::from_builder(builder).unwrap();
        assert!(cfg.payment.mock_mode);
        assert_eq!(
            cfg.webhook_secret().map(|s| s.expose_secret().to_string()),
            Some("sk_test_123".to_string())
        );
    }

    #[test]
    fn blank_secret_is_treated_as_missing() {
        let builder = builder()
            .set_override("payment.secret_key", "  ")
            .unwrap();
        let cfg = AppConfig::from_builder(builder).unwrap();
        assert!(cfg.payment.secret_key.is_none());
        assert!(cfg.webhook_secret().is_none());
    }

    #[test]
    fn zero_upload_attempts_is_rejected() {
        let builder = builder()
            .set_override("certificates.upload_attempts", 0)
            .unwrap();
        assert!(matches!(
            AppConfig::from_builder(builder),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let cfg = AppConfig::from_builder(builder()).unwrap();
        assert!(!format!("{cfg:?}").contains(SIGNING_SECRET));
    }

    #[test]
    fn jwt_secret_has_no_default() {
        assert!(AppConfig::from_builder(AppConfig::builder().unwrap()).is_err());
    }

    #[test]
    fn short_or_blank_jwt_secret_is_rejected() {
        for weak in ["", "   ", "dev-only-change-me"] {
            let builder = AppConfig::builder()
                .unwrap()
                .set_override("auth.jwt_secret", weak)
                .unwrap();
            assert!(
                matches!(AppConfig::from_builder(builder), Err(ConfigError::Invalid(_))),
                "accepted {weak:?}"
            );
        }
    }
}
