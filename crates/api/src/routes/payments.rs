//! Payment endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::Money;
use domain::{Aggregate, Payment};
use serde::{Deserialize, Serialize};

use super::{AppState, Identity, parse_aggregate_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentRequest {
    pub order_id: String,
    pub amount: Money,
    pub idempotency_key: String,
}

#[derive(Deserialize, Default)]
pub struct RefundRequest {
    pub amount: Option<Money>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByOrderQuery {
    pub order_id: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: Option<String>,
    pub account: Option<String>,
    pub amount: Money,
    pub status: String,
    pub idempotency_key: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id().map(|id| id.to_string()).unwrap_or_default(),
            order_id: payment.order_id().map(|id| id.to_string()),
            account: payment.account().map(|a| a.to_string()),
            amount: payment.amount(),
            status: payment.status().to_string(),
            idempotency_key: payment.idempotency_key().to_string(),
            created_at: payment.created_at(),
            updated_at: payment.updated_at(),
        }
    }
}

// -- Handlers --

/// POST /api/v1/payments
///
/// Repeating a request with the same idempotency key returns the payment
/// the first request recorded.
#[tracing::instrument(skip(state, identity, req))]
pub async fn submit(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<SubmitPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let order_id = parse_aggregate_id(&req.order_id)?;
    let payment = state
        .payments
        .submit(&identity.0, order_id, req.amount, &req.idempotency_key)
        .await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// GET /api/v1/payments/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment_id = parse_aggregate_id(&id)?;
    Ok(Json(state.payments.get(payment_id).await?.into()))
}

/// GET /api/v1/payments/by-order?orderId=
#[tracing::instrument(skip(state, query))]
pub async fn get_by_order(
    State(state): State<AppState>,
    Query(query): Query<ByOrderQuery>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let order_id = parse_aggregate_id(&query.order_id)?;
    Ok(Json(state.payments.get_by_order(order_id).await?.into()))
}

/// POST /api/v1/payments/{id}/refund
///
/// The body is optional; `{"amount": "12.00"}` names the refunded amount.
#[tracing::instrument(skip(state, identity, body))]
pub async fn refund(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment_id = parse_aggregate_id(&id)?;
    let req: RefundRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RefundRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid refund body: {e}")))?
    };

    let payment = state
        .payments
        .refund(&identity.0, payment_id, req.amount)
        .await?;
    Ok(Json(payment.into()))
}
