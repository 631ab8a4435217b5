//! Optional Bearer token authentication for admin routes.
//!
//! If AUTH_SECRET env is set, `/register` and `DELETE /sessions/{id}` require
//! `Authorization: Bearer <secret>`. If not set, auth is disabled (dev mode).

use axum::http::{HeaderMap, StatusCode};

use crate::state::AppState;

/// Enforce Bearer auth when AUTH_SECRET is configured. Returns the status to
/// respond with when the caller is not authorized.
pub fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let secret = match state.auth_secret.as_deref() {
        Some(s) => s,
        None => return Ok(()), // Dev mode — no auth required
    };

    let auth_header = headers.get("authorization").and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header) if header.starts_with("Bearer ") => {
            if &header[7..] == secret {
                Ok(())
            } else {
                tracing::warn!("Auth failed: invalid token");
                Err(StatusCode::UNAUTHORIZED)
            }
        }
        _ => {
            tracing::warn!("Auth failed: missing or malformed Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::intent::IntentMap;

    fn state_with_secret(secret: Option<&str>) -> AppState {
        let mut state = AppState::new(IntentMap::builtin(), BridgeConfig::default());
        state.auth_secret = secret.map(String::from);
        state
    }

    #[tokio::test]
    async fn dev_mode_allows_everything() {
        let state = state_with_secret(None);
        assert!(authorize_admin(&state, &HeaderMap::new()).is_ok());
    }

    #[tokio::test]
    async fn bearer_token_is_checked() {
        let state = state_with_secret(Some("s3cret"));

        let mut ok = HeaderMap::new();
        ok.insert("authorization", "Bearer s3cret".parse().unwrap());
        assert!(authorize_admin(&state, &ok).is_ok());

        let mut bad = HeaderMap::new();
        bad.insert("authorization", "Bearer wrong".parse().unwrap());
        assert_eq!(authorize_admin(&state, &bad), Err(StatusCode::UNAUTHORIZED));

        assert_eq!(authorize_admin(&state, &HeaderMap::new()), Err(StatusCode::UNAUTHORIZED));
    }
}
