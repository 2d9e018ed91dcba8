use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::auth::hash_access_token;
use crate::authz::Principal;
use crate::error::ApiError;
use crate::models::AppState;

/// Resolves the bearer token into a [`Principal`]. Missing, unknown, revoked or
/// expired tokens and inactive accounts are all 401.
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let session = state
                .accounts
                .resolve_session(&token_hash)
                .await?
                .ok_or_else(ApiError::session_expired)?;

            Ok(Principal {
                user_id: session.user_id,
                role: session.role,
                session_id: session.session_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use crate::test_support::{FakeAccounts, FakeProcedures, state_with};
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>, accounts: FakeAccounts) -> Result<Principal, ApiError> {
        let state = state_with(FakeProcedures::default(), accounts);
        let mut builder = Request::builder().uri("/api/v1/auth/me");
        if let Some(h) = header {
            builder = builder.header("authorization", h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Principal::from_request_parts(&mut parts, &state).await
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let err = extract(None, FakeAccounts::default()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "SESSION_EXPIRED");
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let accounts = FakeAccounts::default().with_session("good-token", 4, Role::Doctor);
        let err = extract(Some("Bearer other-token"), accounts).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn known_token_resolves_principal() {
        let accounts = FakeAccounts::default().with_session("good-token", 4, Role::Doctor);
        let p = extract(Some("Bearer good-token"), accounts).await.unwrap();
        assert_eq!(p.user_id, 4);
        assert_eq!(p.role, Role::Doctor);
    }
}
