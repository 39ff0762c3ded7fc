//! Bearer token authentication module.
//!
//! Tokens are JWTs issued by an external identity provider. Verification
//! checks the signature, expiry and, when configured, issuer and audience.
//! Signing keys come from a static secret or PEM file, or from the
//! provider's JSON Web Key Set selected by the token's `kid`.

mod jwks;

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use jwks::JwksCache;

use crate::config::{AuthConfig, ConfigError, JwtKey};
use crate::errors::AppError;

/// Claims the service reads from a verified token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
}

enum KeySource {
    Static(DecodingKey),
    Jwks(JwksCache),
}

/// Verifies bearer tokens against the configured key source.
pub struct TokenVerifier {
    source: KeySource,
    validation: Validation,
}

impl TokenVerifier {
    /// Build a verifier, or `None` when authentication is disabled.
    pub fn from_config(auth: &AuthConfig) -> Result<Option<Self>, ConfigError> {
        if !auth.enabled {
            return Ok(None);
        }

        let (source, algorithm) = match &auth.key {
            Some(JwtKey::Secret(secret)) => (
                KeySource::Static(DecodingKey::from_secret(secret.as_bytes())),
                Algorithm::HS256,
            ),
            Some(JwtKey::PublicKeyPem(path)) => {
                let pem = std::fs::read(path).map_err(|e| {
                    ConfigError(format!("cannot read {}: {}", path.display(), e))
                })?;
                let key = DecodingKey::from_rsa_pem(&pem)
                    .map_err(|e| ConfigError(format!("invalid RSA public key: {}", e)))?;
                (KeySource::Static(key), Algorithm::RS256)
            }
            Some(JwtKey::Jwks(url)) => (
                KeySource::Jwks(JwksCache::new(url.clone())?),
                Algorithm::RS256,
            ),
            None => {
                return Err(ConfigError(
                    "authentication is enabled but no verification key is configured".to_string(),
                ))
            }
        };

        let mut validation = Validation::new(algorithm);
        match &auth.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &auth.issuer {
            validation.set_issuer(&[issuer]);
        }

        Ok(Some(Self { source, validation }))
    }

    /// Verify a raw token and return its claims.
    pub async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let data = match &self.source {
            KeySource::Static(key) => decode::<Claims>(token, key, &self.validation)?,
            KeySource::Jwks(jwks) => {
                let kid = decode_header(token)?.kid.ok_or_else(|| {
                    AppError::Unauthorized("Token header has no key id".to_string())
                })?;
                let key = jwks.key_for(&kid).await?;
                decode::<Claims>(token, &key, &self.validation)?
            }
        };
        Ok(data.claims)
    }
}

/// Authentication layer function that takes the verifier as a parameter.
pub async fn jwt_auth_layer(
    verifier: Option<Arc<TokenVerifier>>,
    request: Request,
    next: Next,
) -> Response {
    // Authentication switched off (non-production only)
    let Some(verifier) = verifier else {
        return next.run(request).await;
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    let Some(token) = token else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    match verifier.verify(&token).await {
        Ok(claims) => {
            tracing::debug!(subject = ?claims.sub, "request authenticated");
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
