use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use catalog::tokens;
use model::entities::user;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::schemas::AppState;

/// The user behind the request's bearer token.
///
/// Accepts `Authorization: Bearer <key>` and `Authorization: Token <key>`.
/// Anything else is rejected with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

/// Extracts the token key from an `Authorization` header value.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, key) = header.trim().split_once(' ')?;
    let key = key.trim();
    let known_scheme =
        scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token");
    (known_scheme && !key.is_empty()).then_some(key)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        trace!("Authenticating request");
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let key = parse_authorization(header).ok_or(ApiError::Unauthorized)?;

        match tokens::user_for_token(&state.db, key).await? {
            Some(user) => {
                debug!("Authenticated user {}", user.id);
                Ok(AuthUser(user))
            }
            None => {
                debug!("Presented token does not match any user");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_authorization("Token abc123"), Some("abc123"));
        assert_eq!(parse_authorization("bearer  abc123 "), Some("abc123"));
        assert_eq!(parse_authorization("Basic abc123"), None);
        assert_eq!(parse_authorization("Bearer"), None);
        assert_eq!(parse_authorization("Bearer "), None);
        assert_eq!(parse_authorization(""), None);
    }
}
