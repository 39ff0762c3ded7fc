//! Signing keys published by the identity provider as a JSON Web Key Set.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use tokio::sync::RwLock;

use crate::config::ConfigError;
use crate::errors::AppError;

/// How long a fetched key set is trusted.
const CACHE_TTL: Duration = Duration::from_secs(600);

/// Minimum spacing between fetches, so unknown `kid`s cannot hammer the provider.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(12);

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Cached, lazily fetched key set.
pub struct JwksCache {
    url: String,
    client: reqwest::Client,
    cached: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    pub fn new(url: String) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ConfigError(format!("cannot build JWKS client: {}", e)))?;

        Ok(Self {
            url,
            client,
            cached: RwLock::new(None),
        })
    }

    /// Decoding key for the given key id, fetching the set when needed.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, AppError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < CACHE_TTL {
                    if let Some(jwk) = entry.keys.find(kid) {
                        return Ok(DecodingKey::from_jwk(jwk)?);
                    }
                }
            }
        }

        let mut cached = self.cached.write().await;

        // Another request may have refreshed the set while we waited.
        let refresh_allowed = match cached.as_ref() {
            Some(entry) => {
                let age = entry.fetched_at.elapsed();
                if age < CACHE_TTL && entry.keys.find(kid).is_some() {
                    false
                } else {
                    age >= MIN_REFRESH_INTERVAL
                }
            }
            None => true,
        };

        if refresh_allowed {
            let keys = self.fetch().await?;
            tracing::info!(url = %self.url, keys = keys.keys.len(), "JWKS refreshed");
            *cached = Some(CachedKeys {
                keys,
                fetched_at: Instant::now(),
            });
        }

        let jwk = cached
            .as_ref()
            .and_then(|entry| entry.keys.find(kid))
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown signing key {}", kid)))?;

        Ok(DecodingKey::from_jwk(jwk)?)
    }

    async fn fetch(&self) -> Result<JwkSet, AppError> {
        let unavailable = |e: reqwest::Error| {
            tracing::error!(url = %self.url, "JWKS fetch failed: {:?}", e);
            AppError::Internal("Signing keys are unavailable".to_string())
        };

        self.client
            .get(&self.url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(unavailable)?
            .json::<JwkSet>()
            .await
            .map_err(unavailable)
    }
}
