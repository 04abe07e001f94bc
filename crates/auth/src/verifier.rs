//! Token verification against the configured Keycloak realm.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;

use shelf_kernel::settings::KeycloakSettings;

use crate::error::AuthError;
use crate::gate::AuthContext;
use crate::jwks::KeyCache;

/// Claims read from a verified access token.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// Stable subject identifier of the authenticated user.
    pub sub: String,
}

/// Seam between the gate and the identity provider.
///
/// Production uses [`KeycloakVerifier`]; tests substitute their own
/// implementation so no identity provider has to be running.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Validate a bearer token and produce the authenticated context.
    async fn verify(&self, token: &str) -> Result<AuthContext, AuthError>;
}

/// Verifies RS256 bearer tokens issued by a Keycloak realm.
pub struct KeycloakVerifier {
    issuer: String,
    audience: Option<String>,
    keys: KeyCache,
}

impl KeycloakVerifier {
    /// Build a verifier for the configured realm.
    ///
    /// The issuer is `{auth_server_url}/realms/{realm}` and signing keys come
    /// from the realm's `protocol/openid-connect/certs` endpoint.
    pub fn new(settings: &KeycloakSettings) -> Self {
        let base = settings.auth_server_url.trim_end_matches('/');
        let issuer = format!("{}/realms/{}", base, settings.realm);
        let jwks_url = format!("{}/protocol/openid-connect/certs", issuer);

        Self {
            issuer,
            audience: settings.audience.clone(),
            keys: KeyCache::new(
                jwks_url,
                Duration::from_secs(settings.jwks_cache_ttl_seconds),
            ),
        }
    }

    /// Expected `iss` claim for tokens from this realm.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

#[async_trait]
impl TokenVerifier for KeycloakVerifier {
    async fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidToken(format!("invalid token header: {}", e)))?;

        let key = self.keys.get_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        tracing::debug!(subject = %data.claims.sub, "bearer token verified");

        Ok(AuthContext::new(data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> KeycloakSettings {
        KeycloakSettings {
            realm: "library".to_string(),
            auth_server_url: "https://auth.example.com/".to_string(),
            ..KeycloakSettings::default()
        }
    }

    #[test]
    fn test_issuer_derivation_trims_trailing_slash() {
        let verifier = KeycloakVerifier::new(&settings());
        assert_eq!(verifier.issuer(), "https://auth.example.com/realms/library");
    }

    #[test]
    fn test_claims_deserialization() {
        let json = r#"{"sub": "f3b2c6c1-user", "preferred_username": "reader"}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.sub, "f3b2c6c1-user");
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected_before_key_fetch() {
        let verifier = KeycloakVerifier::new(&settings());

        let result = verifier.verify("not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }
}
