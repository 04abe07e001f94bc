//! The gate itself: axum middleware, request context, and callback routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    routing::get,
    Router,
};

use shelf_http::error::AppError;

use crate::error::AuthError;
use crate::session::SessionStore;
use crate::verifier::TokenVerifier;

/// Name of the cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "shelf_session";

/// Immutable identity attached to a request once the gate has validated it.
///
/// Handlers receive it as an extractor argument; it is never mutated after
/// the gate inserts it.
#[derive(Debug, Clone)]
pub struct AuthContext {
    subject: String,
}

impl AuthContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    /// Stable subject identifier (`sub` claim) of the caller.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthContext>().cloned().ok_or_else(|| {
            AppError::unauthorized("request reached a handler without authentication")
        })
    }
}

/// Validates incoming credentials before any resource handler runs.
///
/// A live session (identified by the session cookie) is accepted without
/// re-verifying the token; otherwise the bearer token is verified and, when a
/// session cookie is presented, the session store is brought in step so the
/// logout callback can find it.
pub struct AuthGate {
    verifier: Arc<dyn TokenVerifier>,
    sessions: Arc<SessionStore>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>, sessions: Arc<SessionStore>) -> Self {
        Self { verifier, sessions }
    }

    /// The shared session store, also reachable from logout callbacks.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Validate the request's credentials and produce its identity.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let session_id = session_cookie(headers);

        if let Some(id) = &session_id {
            if let Some(subject) = self.sessions.resolve(id).await {
                return Ok(AuthContext::new(subject));
            }
        }

        let token = bearer_token(headers)?;
        let ctx = self.verifier.verify(token).await?;

        if let Some(id) = &session_id {
            self.sessions.upsert(id, ctx.subject()).await;
        }

        Ok(ctx)
    }

    /// Routes the identity-provider middleware mounts at the router root.
    pub fn callback_routes(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/logout", get(logout))
            .with_state(self.clone())
    }
}

/// Gate middleware: rejects unauthenticated requests before the downstream
/// handler is ever invoked.
pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = gate
        .authenticate(request.headers())
        .await
        .map_err(|err| AppError::unauthorized(err.to_string()))?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Identity-provider logout callback: drops the presented session.
async fn logout(State(gate): State<Arc<AuthGate>>, headers: HeaderMap) -> StatusCode {
    if let Some(session_id) = session_cookie(&headers) {
        if gate.sessions.remove(&session_id).await {
            tracing::info!("session terminated via logout callback");
        }
    }

    StatusCode::NO_CONTENT
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;

    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?;

    if token.trim().is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;

    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
