//! Configuration module for the Note Taker backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::models::PageLimits;

/// Configuration error raised at startup.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Key material used to verify bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtKey {
    /// HS256 shared secret
    Secret(String),
    /// RS256 public key file in PEM format
    PublicKeyPem(PathBuf),
    /// RS256 keys fetched from the issuer's JSON Web Key Set
    Jwks(String),
}

/// Bearer token authentication settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// False only when explicitly disabled outside production
    pub enabled: bool,
    pub key: Option<JwtKey>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Deployment environment name (`prod` enforces authentication)
    pub app_env: String,
    pub page_limits: PageLimits,
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("NOTES_DB_PATH")
            .unwrap_or_else(|| "./data/notes.sqlite".to_string())
            .into();

        let bind_addr = lookup("NOTES_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|_| ConfigError("invalid NOTES_BIND_ADDR format".to_string()))?;

        let log_level = lookup("NOTES_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_format = match lookup("NOTES_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError(format!(
                    "NOTES_LOG_FORMAT must be `pretty` or `json`, got `{}`",
                    other
                )))
            }
        };

        let defaults = PageLimits::default();
        let default_take = parse_positive(&lookup, "NOTES_DEFAULT_PAGE_SIZE")?
            .unwrap_or(defaults.default_take);
        let max_take =
            parse_positive(&lookup, "NOTES_MAX_PAGE_SIZE")?.unwrap_or(defaults.max_take);
        if default_take > max_take {
            return Err(ConfigError(
                "NOTES_DEFAULT_PAGE_SIZE must not exceed NOTES_MAX_PAGE_SIZE".to_string(),
            ));
        }

        let app_env = lookup("APP_ENV").unwrap_or_else(|| "dev".to_string());

        // Authentication can only be switched off outside production.
        let disable_requested = lookup("ENABLE_AUTHENTICATION").as_deref() == Some("false");
        let enabled = !(disable_requested && app_env != "prod");

        let issuer = lookup("AUTH_ISSUER_URL");

        // A static key overrides the issuer's published key set.
        let key = match (lookup("AUTH_JWT_SECRET"), lookup("AUTH_JWT_PUBLIC_KEY_PATH")) {
            (Some(_), Some(_)) => {
                return Err(ConfigError(
                    "set only one of AUTH_JWT_SECRET and AUTH_JWT_PUBLIC_KEY_PATH".to_string(),
                ))
            }
            (Some(secret), None) => Some(JwtKey::Secret(secret)),
            (None, Some(path)) => Some(JwtKey::PublicKeyPem(path.into())),
            (None, None) => issuer.as_deref().map(|url| JwtKey::Jwks(jwks_url(url))),
        };

        if enabled && key.is_none() {
            return Err(ConfigError(
                "authentication is enabled but none of AUTH_ISSUER_URL, AUTH_JWT_SECRET or AUTH_JWT_PUBLIC_KEY_PATH is set"
                    .to_string(),
            ));
        }

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_format,
            app_env,
            page_limits: PageLimits {
                default_take,
                max_take,
            },
            auth: AuthConfig {
                enabled,
                key,
                issuer,
                audience: lookup("AUTH_AUDIENCE"),
            },
        })
    }
}

/// Key set location under an issuer URL.
fn jwks_url(issuer: &str) -> String {
    format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
}

fn parse_positive<F>(lookup: &F, key: &str) -> Result<Option<u32>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.parse::<u32>() {
            Ok(value) if value > 0 => Ok(Some(value)),
            _ => Err(ConfigError(format!(
                "{} must be a positive integer, got `{}`",
                key, raw
            ))),
        },
    }
}
