//! REST endpoint handlers organized by resource.
//!
//! Every cart handler follows the same shape: open the session, run one
//! operation, finish the session (saving whatever succeeded), then render.
//! The resolved key and any cookie change are attached to the response
//! even when the operation itself failed.

pub mod cart;
pub mod item;
pub mod system;

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::api::dto::CartQuery;
use crate::app_state::AppState;
use crate::domain::CartItemLine;
use crate::error::CartError;
use crate::identity::{CART_KEY_HEADER, RequestContext};
use crate::service::select_fields;
use crate::session::{CartSession, SessionReceipt};

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().merge(cart::routes()).merge(item::routes())
}

/// What a successful operation renders.
#[derive(Debug)]
pub(crate) enum Reply {
    /// The whole cart.
    Cart,
    /// A single line.
    Item(CartItemLine),
}

/// Opens the request's session, fitting any merged guest lines to product
/// limits before the operation runs.
pub(crate) async fn open_session(
    state: &AppState,
    headers: &HeaderMap,
    query: &CartQuery,
    now: i64,
) -> Result<CartSession, CartError> {
    let ctx = RequestContext::from_parts(
        headers,
        query.cart_key.as_deref(),
        state.sessions.resolver().cookie_name(),
    );
    let mut session = state.sessions.open(&ctx, now).await?;
    if session.was_migrated() {
        state.carts.reconcile(&mut session).await?;
    }
    Ok(session)
}

/// Finishes the session and renders `outcome`.
pub(crate) async fn respond(
    state: &AppState,
    session: CartSession,
    now: i64,
    outcome: Result<Reply, CartError>,
    fields: Option<&str>,
) -> Result<Response, CartError> {
    let receipt = state.sessions.finish(session, now).await?;
    let response = match outcome {
        Ok(reply) => render(state, &receipt, reply, fields)
            .await
            .unwrap_or_else(IntoResponse::into_response),
        Err(err) => err.into_response(),
    };
    Ok(with_receipt(&receipt, response))
}

async fn render(
    state: &AppState,
    receipt: &SessionReceipt,
    reply: Reply,
    fields: Option<&str>,
) -> Result<Response, CartError> {
    let document = match reply {
        Reply::Cart => {
            let view = state.projector.project(&receipt.key, &receipt.state).await?;
            serde_json::to_value(view)
        }
        Reply::Item(line) => serde_json::to_value(state.projector.item(&line).await?),
    }
    .map_err(|e| CartError::StorageFailure(e.to_string()))?;

    let document = match fields {
        Some(fields) => select_fields(document, fields),
        None => document,
    };
    Ok(Json(document).into_response())
}

/// Adds `X-Cart-Key` and `Set-Cookie` from the receipt.
pub(crate) fn with_receipt(receipt: &SessionReceipt, mut response: Response) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(receipt.key.as_str()) {
        headers.insert(CART_KEY_HEADER, value);
    }
    if let Some(cookie) = &receipt.cookie
        && let Ok(value) = HeaderValue::from_str(cookie)
    {
        headers.append(SET_COOKIE, value);
    }
    response
}
