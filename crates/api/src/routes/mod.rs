//! HTTP handlers and the state and extractors they share.

pub mod ops;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{AccountEmail, AggregateId, Caller};
use saga::{OrderLifecycleManager, PaymentSubmissionManager};

use crate::error::ApiError;

/// Header carrying the account authenticated by the upstream proxy.
pub const ACCOUNT_HEADER: &str = "x-account-email";

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderLifecycleManager>,
    pub payments: Arc<PaymentSubmissionManager>,
    /// Which event store backs the managers, for the health check.
    pub event_store: &'static str,
}

/// The caller of a request, taken from [`ACCOUNT_HEADER`].
///
/// A missing header means an anonymous caller; the managers decide whether
/// that is acceptable. A header that is not an email is rejected.
pub struct Identity(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACCOUNT_HEADER) else {
            return Ok(Identity(Caller::Anonymous));
        };
        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("Invalid {ACCOUNT_HEADER} header")))?;
        let email = AccountEmail::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;

        Ok(Identity(Caller::account(email)))
    }
}

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {id}")))
}
