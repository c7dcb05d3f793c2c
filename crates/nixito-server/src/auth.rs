//! Header-based auth middleware for self-host deployments.
//!
//! Credential verification happens upstream (reverse proxy or identity
//! provider). This layer only turns the forwarded identity into a
//! [`Principal`]:
//! - `X-User-Id` => authenticated principal
//! - `X-User-Email` => optional email attached to it
//!
//! Requests without `X-User-Id` pass through; handlers that need a user
//! reject them via the [`CurrentUser`] extractor.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use nixito_core::Principal;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// Extractor for routes that require an authenticated principal.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))
    }
}

/// Middleware that attaches the forwarded principal to request extensions.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    // Scope the borrowing closure so it is not held across the await
    // (`&Request` is not `Send`).
    {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(user_id) = header(USER_ID_HEADER) {
            let mut principal = Principal::new(user_id);
            principal.email = header(USER_EMAIL_HEADER);
            tracing::debug!(principal = %principal.id, "Authenticated request");
            request.extensions_mut().insert(principal);
        }
    }

    next.run(request).await
}
