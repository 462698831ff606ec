//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Secret used to sign sessions when `JWT_SECRET` is unset. Development only.
const DEV_JWT_SECRET: &str = "metricflow-dev-secret";

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// `PostgreSQL` connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// Connection pool size (default: 10).
    pub database_max_connections: u32,

    /// HS256 secret for session tokens.
    pub jwt_secret: String,

    /// Session token lifetime in seconds (default: 7 days).
    pub session_ttl_seconds: i64,

    /// Stripe API key (optional).
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret (optional; webhooks are rejected without it).
    pub stripe_webhook_secret: Option<String>,

    /// Stripe price for the pro plan.
    pub stripe_pro_price_id: Option<String>,

    /// Stripe price for the enterprise plan.
    pub stripe_enterprise_price_id: Option<String>,

    /// Maximum age of a webhook signature timestamp in seconds (default: 300).
    pub webhook_tolerance_seconds: i64,

    /// Resend API key (optional; emails are skipped without it).
    pub resend_api_key: Option<String>,

    /// Sender address for outgoing email.
    pub email_from: String,

    /// Public URL of the dashboard, used in emails and checkout redirects.
    pub app_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Try to load Stripe secrets from file first, then fall back to env vars
        let (stripe_api_key, stripe_webhook_secret) = load_stripe_secrets();

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set - using development secret");
            defaults.jwt_secret.clone()
        });

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: std::env::var("DATABASE_URL").ok(),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            jwt_secret,
            session_ttl_seconds: env_parse("SESSION_TTL_SECONDS")
                .unwrap_or(defaults.session_ttl_seconds),
            stripe_api_key,
            stripe_webhook_secret,
            stripe_pro_price_id: std::env::var("STRIPE_PRO_PRICE_ID").ok(),
            stripe_enterprise_price_id: std::env::var("STRIPE_ENTERPRISE_PRICE_ID").ok(),
            webhook_tolerance_seconds: env_parse("WEBHOOK_TOLERANCE_SECONDS")
                .unwrap_or(defaults.webhook_tolerance_seconds),
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").unwrap_or(defaults.email_from),
            app_url: std::env::var("APP_URL").unwrap_or(defaults.app_url),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Load Stripe secrets from file or environment.
fn load_stripe_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/stripe.json",
        "metricflow/.secrets/stripe.json",
        "../.secrets/stripe.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return (Some(secrets.api_key), secrets.webhook_secret);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Stripe secrets file not found, using environment variables");
    (
        std::env::var("STRIPE_API_KEY").ok(),
        std::env::var("STRIPE_WEBHOOK_SECRET").ok(),
    )
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            database_max_connections: 10,
            jwt_secret: DEV_JWT_SECRET.into(),
            session_ttl_seconds: 7 * 24 * 60 * 60,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_pro_price_id: None,
            stripe_enterprise_price_id: None,
            webhook_tolerance_seconds: 300,
            resend_api_key: None,
            email_from: "MetricFlow <noreply@metricflow.io>".into(),
            app_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
