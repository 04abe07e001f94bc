//! Fetching and caching of the realm's JSON Web Key Set.
//!
//! Keys are fetched lazily from the Keycloak `certs` endpoint and cached by
//! `kid` for a configurable TTL, so steady-state token checks never touch the
//! network.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::AuthError;

/// A single JSON Web Key from the realm's JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA")
    pub kty: String,
    /// Key ID, matched against the JWT header `kid`
    pub kid: Option<String>,
    /// Key use ("sig" for signature keys)
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url encoded)
    pub n: Option<String>,
    /// RSA exponent (base64url encoded)
    pub e: Option<String>,
}

/// The JWKS document served by the realm.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// TTL-bound cache of the realm's signing keys, keyed by `kid`.
pub struct KeyCache {
    jwks_url: String,
    ttl: Duration,
    client: reqwest::Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_fetch: RwLock<Option<Instant>>,
}

impl KeyCache {
    /// Create a cache for the given JWKS endpoint.
    pub fn new(jwks_url: String, ttl: Duration) -> Self {
        Self {
            jwks_url,
            ttl,
            client: reqwest::Client::new(),
            keys: RwLock::new(HashMap::new()),
            last_fetch: RwLock::new(None),
        }
    }

    /// Get a decoding key by key ID, refreshing from the endpoint when the
    /// cache is stale or the key is unknown.
    ///
    /// If `kid` is `None`, the first cached key is returned.
    pub async fn get_key(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        let stale = {
            let last_fetch = self.last_fetch.read().await;
            match *last_fetch {
                Some(at) => at.elapsed() > self.ttl,
                None => true,
            }
        };

        if !stale {
            if let Some(key) = self.lookup(kid).await {
                return Ok(key);
            }
        }

        self.refresh().await?;

        self.lookup(kid).await.ok_or_else(|| match kid {
            Some(k) => AuthError::KeyLookup(format!("no key with kid '{}'", k)),
            None => AuthError::KeyLookup("realm published no usable keys".to_string()),
        })
    }

    async fn lookup(&self, kid: Option<&str>) -> Option<DecodingKey> {
        let keys = self.keys.read().await;
        match kid {
            Some(k) => keys.get(k).cloned(),
            None => keys.values().next().cloned(),
        }
    }

    /// Fetch the JWKS document and replace the cached keys.
    async fn refresh(&self) -> Result<(), AuthError> {
        tracing::debug!(url = %self.jwks_url, "fetching JWKS");

        let response = self
            .client
            .get(&self.jwks_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| AuthError::KeyLookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyLookup(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let document: JwksDocument = response
            .json()
            .await
            .map_err(|e| AuthError::KeyLookup(format!("unparseable JWKS: {}", e)))?;

        let mut fresh = HashMap::new();
        for jwk in &document.keys {
            // Only RSA signature keys are relevant for RS256 verification.
            if jwk.kty != "RSA" || jwk.key_use.as_deref() == Some("enc") {
                continue;
            }

            match decoding_key(jwk) {
                Ok(key) => {
                    let kid = jwk.kid.clone().unwrap_or_else(|| "default".to_string());
                    fresh.insert(kid, key);
                }
                Err(err) => {
                    tracing::warn!(kid = ?jwk.kid, %err, "skipping unusable JWK");
                }
            }
        }

        if fresh.is_empty() {
            return Err(AuthError::KeyLookup(
                "realm published no usable keys".to_string(),
            ));
        }

        tracing::debug!(count = fresh.len(), "cached realm signing keys");

        *self.keys.write().await = fresh;
        *self.last_fetch.write().await = Some(Instant::now());

        Ok(())
    }
}

/// Convert a JWK's RSA components into a jsonwebtoken decoding key.
fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    let n = jwk
        .n
        .as_ref()
        .ok_or_else(|| AuthError::KeyLookup("RSA key missing 'n'".to_string()))?;
    let e = jwk
        .e
        .as_ref()
        .ok_or_else(|| AuthError::KeyLookup("RSA key missing 'e'".to_string()))?;

    DecodingKey::from_rsa_components(n, e)
        .map_err(|err| AuthError::KeyLookup(format!("invalid RSA components: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "kty": "RSA",
            "kid": "realm-key-1",
            "use": "sig",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, Some("realm-key-1".to_string()));
        assert_eq!(jwk.key_use, Some("sig".to_string()));
        assert!(decoding_key(&jwk).is_ok());
    }

    #[test]
    fn test_decoding_key_requires_components() {
        let jwk = Jwk {
            kty: "RSA".to_string(),
            kid: None,
            key_use: Some("sig".to_string()),
            n: None,
            e: Some("AQAB".to_string()),
        };

        assert!(matches!(decoding_key(&jwk), Err(AuthError::KeyLookup(_))));
    }

    #[test]
    fn test_jwks_document_deserialization() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "kid": "key1", "n": "test", "e": "AQAB"},
                {"kty": "EC", "kid": "key2"}
            ]
        }"#;

        let doc: JwksDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.keys.len(), 2);
        assert_eq!(doc.keys[0].kid, Some("key1".to_string()));
    }

    #[tokio::test]
    async fn test_empty_cache_lookup() {
        let cache = KeyCache::new(
            "http://127.0.0.1:1/certs".to_string(),
            Duration::from_secs(3600),
        );

        assert!(cache.lookup(Some("any")).await.is_none());
        assert!(cache.lookup(None).await.is_none());
    }
}
