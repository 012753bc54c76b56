use anyhow::{Context, Result, anyhow};
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_authn::TokenConfig;
use products_hr::RoutingPolicy;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Clone)]
pub struct AppConfig {
    pub tokens: TokenConfig,
    pub cookie_key: Key,
    pub cors_allowed_origins: Vec<String>,
    pub default_entitled_days: i32,
    pub routing: RoutingPolicy,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("access_ttl_minutes", &self.tokens.access_ttl_minutes)
            .field("refresh_ttl_days", &self.tokens.refresh_ttl_days)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("default_entitled_days", &self.default_entitled_days)
            .field("routing", &self.routing)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `load` passes the process env.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = get("JWT_SECRET").context("JWT_SECRET missing")?;
        if secret.len() < MIN_SECRET_BYTES {
            return Err(anyhow!("JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes"));
        }
        let tokens = TokenConfig {
            secret,
            access_ttl_minutes: parse_positive(&get, "ACCESS_TOKEN_TTL_MINUTES", 15)?,
            refresh_ttl_days: parse_positive(&get, "REFRESH_TOKEN_TTL_DAYS", 7)?,
        };

        let cookie_secret = get("COOKIE_SECRET_BASE64").context("COOKIE_SECRET_BASE64 missing")?;
        let secret_bytes = STANDARD
            .decode(cookie_secret.trim())
            .context("invalid COOKIE_SECRET_BASE64")?;
        let cookie_key = cookie_key(&secret_bytes)?;

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let default_entitled_days = parse_positive(&get, "DEFAULT_ENTITLED_DAYS", 24)? as i32;
        let manager_max_days = parse_positive(&get, "MANAGER_APPROVAL_MAX_DAYS", 2)? as i32;

        Ok(Self {
            tokens,
            cookie_key,
            cors_allowed_origins,
            default_entitled_days,
            routing: RoutingPolicy { manager_max_days },
        })
    }
}

/// Derives the cookie key; `Key::from` needs 64 bytes, shorter secrets are derived.
fn cookie_key(secret: &[u8]) -> Result<Key> {
    if secret.len() < MIN_SECRET_BYTES {
        return Err(anyhow!(
            "COOKIE_SECRET_BASE64 must decode to at least {MIN_SECRET_BYTES} bytes"
        ));
    }
    if secret.len() >= 64 {
        Ok(Key::from(&secret[..64]))
    } else {
        Ok(Key::derive_from(secret))
    }
}

fn parse_positive(get: &impl Fn(&str) -> Option<String>, key: &str, default: i64) -> Result<i64> {
    match get(key) {
        None => Ok(default),
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("{key} must be an integer"))?;
            if value <= 0 {
                return Err(anyhow!("{key} must be positive"));
            }
            Ok(value)
        }
    }
}
