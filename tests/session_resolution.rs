//! Integration tests for session resolution and the session-guarded routes.

mod common;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use common::*;
use giveaway_app::auth::TokenExchangeClient;
use giveaway_app::routes::router;
use giveaway_app::sessions::{SessionCipher, SessionResolver, SessionStore};
use giveaway_app::store::{DocumentStore, MemoryStore};
use giveaway_app::{AppState, EncryptionKey, Session, ShopDomain};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn shop() -> ShopDomain {
    ShopDomain::new(SHOP).unwrap()
}

fn offline_session() -> Session {
    Session::offline(shop(), "shpat_cookie".to_string(), "read_orders".to_string())
}

fn cipher() -> SessionCipher {
    SessionCipher::new(&EncryptionKey::from_hex(SESSION_KEY_HEX).unwrap())
}

fn resolver(store: Arc<dyn DocumentStore>) -> (SessionResolver, Arc<SessionStore>) {
    let sessions = Arc::new(SessionStore::new(store, cipher()));
    (
        SessionResolver::new(Arc::new(config()), sessions.clone()),
        sessions,
    )
}

fn headers(pairs: &[(axum::http::HeaderName, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(name.clone(), HeaderValue::from_str(value).unwrap());
    }
    map
}

fn id_cookie(session_id: &str) -> (axum::http::HeaderName, String) {
    (
        COOKIE,
        format!("shopify_app_session={}", cipher().seal_id(session_id).unwrap()),
    )
}

fn bearer(token: &str) -> (axum::http::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {token}"))
}

// ============================================================================
// Resolution order
// ============================================================================

#[tokio::test]
async fn test_no_credentials_resolves_to_none() {
    let (resolver, _) = resolver(Arc::new(MemoryStore::new()));
    assert!(resolver.resolve(&HeaderMap::new()).await.is_none());
}

#[tokio::test]
async fn test_bearer_token_yields_identity_only_session() {
    let (resolver, _) = resolver(Arc::new(MemoryStore::new()));
    let token = session_token(SHOP, API_KEY, API_SECRET);

    let session = resolver.resolve(&headers(&[bearer(&token)])).await.unwrap();

    assert_eq!(session.id, "offline_shop.myshopify.com");
    assert_eq!(session.shop, shop());
    assert!(!session.has_access_token());
    assert!(session.state.is_empty());
}

#[tokio::test]
async fn test_bearer_wins_over_valid_cookie() {
    let (resolver, sessions) = resolver(Arc::new(MemoryStore::new()));
    let stored = offline_session();
    assert!(sessions.store(&stored).await);

    let token = session_token(SHOP, API_KEY, API_SECRET);
    let session = resolver
        .resolve(&headers(&[
            bearer(&token),
            id_cookie(&stored.id),
        ]))
        .await
        .unwrap();

    assert!(!session.has_access_token());
}

#[tokio::test]
async fn test_invalid_bearer_falls_through_to_cookie() {
    let (resolver, sessions) = resolver(Arc::new(MemoryStore::new()));
    let stored = offline_session();
    assert!(sessions.store(&stored).await);

    for token in [
        session_token(SHOP, API_KEY, "wrong-secret"),
        session_token(SHOP, "other-app", API_SECRET),
        "not-a-jwt".to_string(),
    ] {
        let session = resolver
            .resolve(&headers(&[
                bearer(&token),
                id_cookie(&stored.id),
            ]))
            .await
            .unwrap();
        assert_eq!(session.access_token.as_deref(), Some("shpat_cookie"));
    }
}

#[tokio::test]
async fn test_session_data_cookie_used_when_store_has_no_record() {
    let (resolver, _) = resolver(Arc::new(MemoryStore::new()));
    let envelope = cipher().seal(&offline_session()).unwrap();

    let session = resolver
        .resolve(&headers(&[(
            COOKIE,
            format!(
                "shopify_app_session={}; shopify_session_data={envelope}",
                cipher().seal_id("offline_missing.myshopify.com").unwrap()
            ),
        )]))
        .await
        .unwrap();

    assert_eq!(session, offline_session());
}

#[tokio::test]
async fn test_tampered_session_data_cookie_resolves_to_none() {
    let (resolver, _) = resolver(Arc::new(MemoryStore::new()));
    let mut envelope = cipher().seal(&offline_session()).unwrap();
    let flipped = if &envelope[20..21] == "A" { "B" } else { "A" };
    envelope.replace_range(20..21, flipped);

    let resolved = resolver
        .resolve(&headers(&[(COOKIE, format!("shopify_session_data={envelope}"))]))
        .await;
    assert!(resolved.is_none());

    let resolved = resolver
        .resolve(&headers(&[(COOKIE, "shopify_session_data=garbage".to_string())]))
        .await;
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_plain_session_id_cookie_is_ignored() {
    let (resolver, sessions) = resolver(Arc::new(MemoryStore::new()));
    let stored = offline_session();
    assert!(sessions.store(&stored).await);

    for forged in [SHOP, stored.id.as_str()] {
        let resolved = resolver
            .resolve(&headers(&[(COOKIE, format!("shopify_app_session={forged}"))]))
            .await;
        assert!(resolved.is_none(), "forged id {forged} resolved a session");
    }

    let other_key = SessionCipher::new(&EncryptionKey::from_hex(&"ab".repeat(32)).unwrap());
    let resolved = resolver
        .resolve(&headers(&[(
            COOKIE,
            format!("shopify_app_session={}", other_key.seal_id(&stored.id).unwrap()),
        )]))
        .await;
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_resolution_survives_store_outage_via_fallback() {
    let (live, sessions) = resolver(Arc::new(DownStore));
    let stored = offline_session();
    assert!(sessions.store(&stored).await);

    let session = live
        .resolve(&headers(&[id_cookie(&stored.id)]))
        .await
        .unwrap();
    assert_eq!(session, stored);

    // A new store instance stands in for a restarted process.
    let (restarted, _) = resolver(Arc::new(DownStore));
    let lost = restarted
        .resolve(&headers(&[id_cookie(&stored.id)]))
        .await;
    assert!(lost.is_none());
}

// ============================================================================
// /api/session
// ============================================================================

#[tokio::test]
async fn test_session_route_requires_a_session() {
    let state = AppState::new(config(), Arc::new(MemoryStore::new()), assets());
    let response = router(state)
        .oneshot(Request::get("/api/session").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_route_returns_shop_identity() {
    let state = AppState::new(config(), Arc::new(MemoryStore::new()), assets());
    let token = session_token(SHOP, API_KEY, API_SECRET);

    let response = router(state)
        .oneshot(
            Request::get("/api/session")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["shop"], SHOP);
    assert_eq!(body["hasAccessToken"], false);
}

#[tokio::test]
async fn test_forged_shop_cookie_cannot_reach_stored_session() {
    let state = AppState::new(config(), Arc::new(MemoryStore::new()), assets());
    assert!(state.sessions().store(&offline_session()).await);
    let app = router(state);

    for uri in ["/api/session", "/api/billing/sync"] {
        let method = if uri == "/api/session" { "GET" } else { "POST" };
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(COOKIE, format!("shopify_app_session={SHOP}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

// ============================================================================
// /api/auth/token-exchange
// ============================================================================

#[tokio::test]
async fn test_token_exchange_persists_session_and_sets_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/oauth/access_token"))
        .and(body_partial_json(json!({
            "client_id": API_KEY,
            "grant_type": "urn:ietf:params:oauth:grant-type:token-exchange",
            "requested_token_type": "urn:shopify:params:oauth:token-type:offline-access-token",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "shpat_exchanged",
            "scope": "read_orders,write_script_tags",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(config(), store.clone(), assets())
        .with_token_exchange(TokenExchangeClient::with_base_url(server.uri()));
    let app = router(state.clone());
    let token = session_token(SHOP, API_KEY, API_SECRET);

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/auth/token-exchange")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("shopify_app_session="));
    assert!(!cookies[0].contains(SHOP));
    assert!(cookies[1].starts_with("shopify_session_data="));
    for cookie in &cookies {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=None"));
    }

    let persisted = state
        .sessions()
        .load("offline_shop.myshopify.com")
        .await
        .unwrap();
    assert_eq!(persisted.access_token.as_deref(), Some("shpat_exchanged"));

    // The returned cookies authenticate the next request on their own.
    let cookie_header = cookies
        .iter()
        .map(|cookie| cookie.split(';').next().unwrap())
        .collect::<Vec<_>>()
        .join("; ");
    let response = app
        .oneshot(
            Request::get("/api/session")
                .header(COOKIE, cookie_header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["hasAccessToken"], true);
}

#[tokio::test]
async fn test_token_exchange_without_bearer_is_unauthorized() {
    let state = AppState::new(config(), Arc::new(MemoryStore::new()), assets());
    let response = router(state)
        .oneshot(
            Request::post("/api/auth/token-exchange")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_exchange_with_rejected_subject_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/oauth/access_token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_subject_token"})),
        )
        .mount(&server)
        .await;

    let state = AppState::new(config(), Arc::new(MemoryStore::new()), assets())
        .with_token_exchange(TokenExchangeClient::with_base_url(server.uri()));
    let token = session_token(SHOP, API_KEY, API_SECRET);

    let response = router(state)
        .oneshot(
            Request::post("/api/auth/token-exchange")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
