//! Dashboard API endpoints.

use crate::billing::PlanState;
use crate::routes::{ApiError, OfflineSession, ShopSession};
use crate::sessions::cookies::session_cookies;
use crate::sessions::SessionResolver;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use serde_json::{json, Value};

/// `GET /api/session`: identity of the resolved session.
pub async fn session(ShopSession(session): ShopSession) -> Json<Value> {
    Json(json!({
        "shop": session.shop,
        "sessionId": session.id,
        "isOnline": session.is_online,
        "hasAccessToken": session.has_access_token(),
        "scope": session.scope,
    }))
}

/// `POST /api/auth/token-exchange`
///
/// Trades the bearer session token for an offline access token, persists the
/// session and sets both session cookies.
pub async fn token_exchange(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = SessionResolver::bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer session token".to_string()))?;

    let session = state
        .token_exchange()
        .exchange_offline_token(state.config(), token)
        .await?;

    if !state.sessions().store(&session).await {
        tracing::warn!(shop = %session.shop, "offline session not persisted, relying on cookies");
    }

    let cipher = state.sessions().cipher();
    let sealed_id = cipher
        .seal_id(&session.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let envelope = cipher
        .seal(&session)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let [id_cookie, data_cookie] =
        session_cookies(&sealed_id, &envelope, state.config().is_production());

    Ok((
        AppendHeaders([
            (SET_COOKIE, id_cookie.to_string()),
            (SET_COOKIE, data_cookie.to_string()),
        ]),
        Json(json!({ "success": true, "shop": session.shop })),
    ))
}

/// `POST /api/billing/sync`
pub async fn billing_sync(
    State(state): State<AppState>,
    OfflineSession(session): OfflineSession,
) -> Result<Json<PlanState>, ApiError> {
    Ok(Json(state.billing().sync_from_shopify(&session).await?))
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
