mod modules;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shelf_auth::{AuthGate, KeycloakVerifier, SessionStore, TokenVerifier};
use shelf_kernel::settings::Settings;
use shelf_kernel::{InitCtx, ModuleRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().ok();

    let settings = Settings::load().with_context(|| "failed to load SHELF settings")?;

    tracing::info!(
        env = ?settings.environment,
        realm = %settings.keycloak.realm,
        auth_server = %settings.keycloak.auth_server_url,
        "shelf-app bootstrap starting"
    );

    let verifier: Arc<dyn TokenVerifier> = Arc::new(KeycloakVerifier::new(&settings.keycloak));
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        settings.session.ttl_seconds,
    )));
    let gate = Arc::new(AuthGate::new(verifier, sessions));

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, gate.clone());

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    shelf_http::start_server(&registry, &settings, gate.callback_routes()).await?;

    registry.stop_all().await?;

    tracing::info!("shelf-app shutdown complete");
    Ok(())
}
