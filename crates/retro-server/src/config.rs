use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use retro_api::BillingConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub billing: BillingConfig,
}

impl Config {
    /// Read `RETRO_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("RETRO_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("RETRO_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let db_path = get("RETRO_DB_PATH").unwrap_or_else(|| "retro.db".into()).into();
        let host = get("RETRO_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("RETRO_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("RETRO_PORT must be a port number")?;
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let billing = BillingConfig {
            checkout_url: get("RETRO_BILLING_CHECKOUT_URL").filter(|v| !v.is_empty()),
            portal_url: get("RETRO_BILLING_PORTAL_URL").filter(|v| !v.is_empty()),
        };

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            billing,
        })
    }
}
