// ============================================================================
// Collectives API - Request Context Extractor
// File: crates/collectives-api/src/extract.rs
// ============================================================================
//! Builds the [`RequestContext`] of a request from its optional
//! `Authorization: Bearer <jwt>` header.

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use collectives_core::{Caller, DomainError, RequestContext};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

pub struct Ctx(pub RequestContext);

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| DomainError::BadRequest("authorization header is not ASCII".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim()))
        .ok_or_else(|| ApiError::Domain(DomainError::NotAuthenticated))
}

impl FromRequestParts<AppState> for Ctx {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let now = state.clock.now();
        let user_id = match bearer_token(parts)? {
            Some(token) => Some(state.jwt.authenticate(token)?),
            None => None,
        };
        let caller = state.callers.resolve(user_id, now).await?;
        debug!(caller = ?caller.user_id(), "request context built");
        Ok(Ctx(RequestContext::new(caller, now, state.settings.clone())))
    }
}

impl Ctx {
    /// Members only, throttled per member.
    pub fn throttled(self, state: &AppState) -> Result<RequestContext, ApiError> {
        match &self.0.caller {
            Caller::Member(caps) => state.limiter.check(&caps.user_id)?,
            Caller::Anonymous => return Err(DomainError::NotAuthenticated.into()),
        }
        Ok(self.0)
    }
}
