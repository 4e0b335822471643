use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::gate::{authenticate, AuthContext, GateRejection};
use crate::state::AppState;

/// Runs the auth gate and hands the handler the authenticated identity.
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = GateRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // A header that is not valid visible ASCII cannot carry a token.
        let header = match parts.headers.get(AUTHORIZATION) {
            None => None,
            Some(v) => Some(v.to_str().map_err(|_| GateRejection::InvalidToken)?),
        };

        let ctx = authenticate(&state.keys, state.users.as_ref(), header).await?;
        Ok(AuthUser(ctx))
    }
}
