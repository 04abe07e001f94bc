//! Bearer-token authentication gate for SHELF.
//!
//! Validates Keycloak-issued bearer tokens (RS256, keys fetched from the
//! realm's JWKS endpoint), keeps an in-memory session store shared with the
//! identity provider's logout callback, and exposes the axum middleware that
//! attaches an immutable [`AuthContext`] to authenticated requests.

pub mod error;
pub mod gate;
pub mod jwks;
pub mod session;
pub mod verifier;

pub use error::AuthError;
pub use gate::{require_auth, AuthContext, AuthGate, SESSION_COOKIE};
pub use session::SessionStore;
pub use verifier::{KeycloakVerifier, TokenVerifier};
