//! Order endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AccountEmail, Money};
use domain::{Aggregate, Order, OrderLine};
use saga::LineRequest;
use serde::{Deserialize, Serialize};

use super::{AppState, Identity, parse_aggregate_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct OrderLinesRequest {
    pub lines: Vec<LineRequest>,
}

#[derive(Deserialize)]
pub struct ByAccountQuery {
    pub email: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub account: Option<String>,
    pub status: String,
    pub lines: Vec<OrderLineResponse>,
    pub total_amount: Money,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub item_id: String,
    pub upc: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            item_id: line.item_id.clone(),
            upc: line.upc.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total: line.line_total(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id().map(|id| id.to_string()).unwrap_or_default(),
            account: order.account().map(|a| a.to_string()),
            status: order.status().to_string(),
            lines: order.lines().iter().map(OrderLineResponse::from).collect(),
            total_amount: order.total_amount(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

fn responses(orders: Vec<Order>) -> Json<Vec<OrderResponse>> {
    Json(orders.into_iter().map(OrderResponse::from).collect())
}

// -- Handlers --

/// POST /api/v1/orders
#[tracing::instrument(skip(state, identity, req))]
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<OrderLinesRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orders.create(&identity.0, req.lines).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /api/v1/orders
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    Ok(responses(state.orders.list_all().await?))
}

/// GET /api/v1/orders/by-account?email=
#[tracing::instrument(skip(state, query))]
pub async fn list_by_account(
    State(state): State<AppState>,
    Query(query): Query<ByAccountQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let account =
        AccountEmail::parse(query.email).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(responses(state.orders.list_by_account(&account).await?))
}

/// GET /api/v1/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    Ok(Json(state.orders.get(order_id).await?.into()))
}

/// PUT /api/v1/orders/{id}
#[tracing::instrument(skip(state, identity, req))]
pub async fn update(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<OrderLinesRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    let order = state.orders.update(&identity.0, order_id, req.lines).await?;
    Ok(Json(order.into()))
}

/// POST /api/v1/orders/{id}/complete
#[tracing::instrument(skip(state))]
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    Ok(Json(state.orders.complete(order_id).await?.into()))
}

/// POST /api/v1/orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_aggregate_id(&id)?;
    Ok(Json(state.orders.cancel(order_id).await?.into()))
}
