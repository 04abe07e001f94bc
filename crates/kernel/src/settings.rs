use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "SHELF_ENV";
const CONFIG_DIR_ENV: &str = "SHELF_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub keycloak: KeycloakSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = std::env::var(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Default to repo root `config` directory.
                std::env::current_dir()
                    .map(|cwd| cwd.join("config"))
                    .expect("unable to resolve current directory")
            });

        let base_path = config_dir.join("base.toml");
        let environment_filename = format!("{}.toml", environment);
        let environment_path = config_dir.join(environment_filename);

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(config::Environment::with_prefix("SHELF").separator("_"));

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        // A bare `PORT` variable takes precedence over the layered sources,
        // matching the deployment contract of the hosting platforms we target.
        if let Ok(port) = std::env::var("PORT") {
            settings.server.port = port
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
        }

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Connection details for the Keycloak realm that issues bearer tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct KeycloakSettings {
    #[serde(default = "KeycloakSettings::default_realm")]
    pub realm: String,
    /// Base URL of the Keycloak server, without the `/realms/...` suffix.
    #[serde(default = "KeycloakSettings::default_auth_server_url")]
    pub auth_server_url: String,
    /// Client resource id registered with the realm.
    #[serde(default = "KeycloakSettings::default_client_id")]
    pub client_id: String,
    /// Expected `aud` claim; audience validation is skipped when unset.
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "KeycloakSettings::default_ssl_required")]
    pub ssl_required: String,
    /// How long fetched JWKS material stays fresh.
    #[serde(default = "KeycloakSettings::default_jwks_cache_ttl_seconds")]
    pub jwks_cache_ttl_seconds: u64,
}

impl KeycloakSettings {
    fn default_realm() -> String {
        "shelf".to_string()
    }

    fn default_auth_server_url() -> String {
        "http://127.0.0.1:8081".to_string()
    }

    fn default_client_id() -> String {
        "shelf-api".to_string()
    }

    fn default_ssl_required() -> String {
        "external".to_string()
    }

    fn default_jwks_cache_ttl_seconds() -> u64 {
        3600
    }
}

impl Default for KeycloakSettings {
    fn default() -> Self {
        Self {
            realm: Self::default_realm(),
            auth_server_url: Self::default_auth_server_url(),
            client_id: Self::default_client_id(),
            audience: None,
            ssl_required: Self::default_ssl_required(),
            jwks_cache_ttl_seconds: Self::default_jwks_cache_ttl_seconds(),
        }
    }
}

/// Expiry policy for the in-memory session store.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "SessionSettings::default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl SessionSettings {
    fn default_ttl_seconds() -> u64 {
        3600
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: Self::default_ttl_seconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_keycloak_realm() {
        let settings = Settings::default();
        assert_eq!(settings.keycloak.realm, "shelf");
        assert_eq!(settings.keycloak.client_id, "shelf-api");
        assert!(settings.keycloak.audience.is_none());
    }

    #[test]
    fn default_session_ttl_is_one_hour() {
        let settings = Settings::default();
        assert_eq!(settings.session.ttl_seconds, 3600);
    }
}
