//! Line handlers: add, batch add, update, remove, restore.

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::Json;
use chrono::Utc;

use super::{Reply, open_session, respond};
use crate::api::dto::{AddItemRequest, AddItemsRequest, CartQuery, UpdateItemRequest};
use crate::app_state::AppState;
use crate::domain::ItemKey;
use crate::error::CartError;

/// `POST /cart/add-item`: Add an item, merging with an identical line.
///
/// Returns the whole cart, or only the line when `return_item` is set.
///
/// # Errors
///
/// Returns [`CartError`] when the body is malformed or validation rejects
/// the item.
pub async fn add_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
    body: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Response, CartError> {
    let Json(req) = body?;
    let candidate = req.to_candidate()?;

    let now = Utc::now().timestamp();
    let mut session = open_session(&state, &headers, &query, now).await?;
    let outcome = state
        .carts
        .add_item(&mut session, candidate)
        .await
        .map(|line| {
            if req.return_item {
                Reply::Item(line)
            } else {
                Reply::Cart
            }
        });
    respond(&state, session, now, outcome, query.fields.as_deref()).await
}

/// `POST /cart/add-items`: Add several items in order.
///
/// Stops at the first rejected item; items before it stay in the cart.
///
/// # Errors
///
/// Returns [`CartError`] when the body is malformed or an item is
/// rejected.
pub async fn add_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
    body: Result<Json<AddItemsRequest>, JsonRejection>,
) -> Result<Response, CartError> {
    let Json(req) = body?;
    let candidates = req.to_candidates()?;

    let now = Utc::now().timestamp();
    let mut session = open_session(&state, &headers, &query, now).await?;
    let outcome = state
        .carts
        .add_items(&mut session, candidates)
        .await
        .map(|_| Reply::Cart);
    respond(&state, session, now, outcome, query.fields.as_deref()).await
}

/// `POST /cart/item/{item_key}`: Set a line's quantity; zero removes it.
///
/// # Errors
///
/// Returns [`CartError::NotFound`] for an unknown line, or the validation
/// error for the new quantity.
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_key): Path<String>,
    Query(query): Query<CartQuery>,
    body: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Response, CartError> {
    let Json(req) = body?;
    let quantity = req.quantity()?;
    let item_key = ItemKey::from_raw(item_key);

    let now = Utc::now().timestamp();
    let mut session = open_session(&state, &headers, &query, now).await?;
    let outcome = state
        .carts
        .update_item(&mut session, &item_key, quantity)
        .await
        .map(|_| Reply::Cart);
    respond(&state, session, now, outcome, query.fields.as_deref()).await
}

/// `DELETE /cart/item/{item_key}`: Move a line to the removed history.
///
/// # Errors
///
/// Returns [`CartError::NotFound`] for an unknown line.
pub async fn remove_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_key): Path<String>,
    Query(query): Query<CartQuery>,
) -> Result<Response, CartError> {
    let item_key = ItemKey::from_raw(item_key);
    let now = Utc::now().timestamp();
    let mut session = open_session(&state, &headers, &query, now).await?;
    let outcome = state
        .carts
        .remove_item(&mut session, &item_key)
        .await
        .map(|_| Reply::Cart);
    respond(&state, session, now, outcome, query.fields.as_deref()).await
}

/// `POST /cart/item/{item_key}/restore`: Bring a removed line back.
///
/// # Errors
///
/// Returns [`CartError::NotFound`] if the line is not in the removed
/// history, or the validation error that rejected it.
pub async fn restore_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_key): Path<String>,
    Query(query): Query<CartQuery>,
) -> Result<Response, CartError> {
    let item_key = ItemKey::from_raw(item_key);
    let now = Utc::now().timestamp();
    let mut session = open_session(&state, &headers, &query, now).await?;
    let outcome = state
        .carts
        .restore_item(&mut session, &item_key)
        .await
        .map(|_| Reply::Cart);
    respond(&state, session, now, outcome, query.fields.as_deref()).await
}

/// Line routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart/add-item", post(add_item))
        .route("/cart/add-items", post(add_items))
        .route("/cart/item/{item_key}", post(update_item).delete(remove_item))
        .route("/cart/item/{item_key}/restore", post(restore_item))
}
