//! Whole-cart handlers: read, clear, destroy.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;

use super::{Reply, open_session, respond, with_receipt};
use crate::api::dto::{CartQuery, ClearRequest};
use crate::app_state::AppState;
use crate::error::CartError;

/// `GET /cart`: Current cart.
///
/// Lines whose product vanished or became unpurchasable are moved to the
/// removed history before rendering.
///
/// # Errors
///
/// Returns [`CartError`] on a malformed explicit key or storage failure.
pub async fn get_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
) -> Result<Response, CartError> {
    let now = Utc::now().timestamp();
    let mut session = open_session(&state, &headers, &query, now).await?;
    let outcome = state.carts.revalidate(&mut session).await.map(|_| Reply::Cart);
    respond(&state, session, now, outcome, query.fields.as_deref()).await
}

/// `POST /cart/clear`: Empty the cart.
///
/// Accepts an optional `{"keep_removed_items": bool}` body.
///
/// # Errors
///
/// Returns [`CartError::InvalidInput`] for a malformed body and
/// [`CartError::Conflict`] if lines are still stored after clearing.
pub async fn clear_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
    body: Bytes,
) -> Result<Response, CartError> {
    let request: ClearRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ClearRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| CartError::invalid("cart_invalid_body", e.to_string()))?
    };

    let now = Utc::now().timestamp();
    let mut session = open_session(&state, &headers, &query, now).await?;
    let outcome = state
        .carts
        .clear(&mut session, request.keep_removed_items)
        .await
        .map(|()| Reply::Cart);
    respond(&state, session, now, outcome, query.fields.as_deref()).await
}

/// `DELETE /cart`: Delete the cart and forget the session cookie.
///
/// # Errors
///
/// Returns [`CartError::StorageFailure`] if the store fails.
pub async fn destroy_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CartQuery>,
) -> Result<Response, CartError> {
    let now = Utc::now().timestamp();
    let session = open_session(&state, &headers, &query, now).await?;
    let receipt = state.sessions.destroy(session).await?;
    Ok(with_receipt(&receipt, StatusCode::NO_CONTENT.into_response()))
}

/// Whole-cart routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(destroy_cart))
        .route("/cart/clear", post(clear_cart))
}
