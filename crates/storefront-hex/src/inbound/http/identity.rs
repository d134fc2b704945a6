use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::errors::AppError;

/// Header the fronting gateway sets once the identity provider has
/// authenticated the caller.
pub const IDENTITY_HEADER: &str = "x-user-id";

/// The caller's stable user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Uuid);

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(IDENTITY_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing identity".into()))?;
        let raw = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized("malformed identity".into()))?;
        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::Unauthorized("malformed identity".into()))?;
        Ok(Identity(id))
    }
}
