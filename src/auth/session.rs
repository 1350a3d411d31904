//! Merchant session type.
//!
//! A [`Session`] is one merchant's OAuth grant. Offline sessions are keyed
//! `offline_<shop>` and are unique per shop; they carry the access token the
//! server uses for Admin API calls.
//!
//! Sessions synthesized from a verified session token prove which shop a
//! request comes from but never carry an access token.

use crate::config::ShopDomain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A merchant OAuth session.
///
/// Serialized with camelCase field names; this is the JSON sealed into the
/// session envelope (`{id, shop, state, isOnline, accessToken, scope}`).
///
/// The `Debug` implementation masks the access token.
///
/// # Example
///
/// ```rust
/// use giveaway_app::{Session, ShopDomain};
///
/// let shop = ShopDomain::new("my-store").unwrap();
/// let session = Session::offline(shop, "shpat_123".to_string(), "read_orders".to_string());
///
/// assert_eq!(session.id, "offline_my-store.myshopify.com");
/// assert!(session.has_access_token());
/// assert!(!format!("{session:?}").contains("shpat_123"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session id. Offline sessions use `offline_<shop>`.
    pub id: String,

    /// The shop this session belongs to.
    pub shop: ShopDomain,

    /// OAuth state nonce; empty for sessions created by token exchange.
    #[serde(default)]
    pub state: String,

    /// Whether this is a per-user online session.
    #[serde(default)]
    pub is_online: bool,

    /// The Admin API access token, absent until OAuth completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Comma-separated granted scopes.
    #[serde(default)]
    pub scope: String,
}

impl Session {
    /// Returns the offline session id for a shop.
    #[must_use]
    pub fn offline_id(shop: &ShopDomain) -> String {
        format!("offline_{shop}")
    }

    /// Creates an offline session holding an access token.
    #[must_use]
    pub fn offline(shop: ShopDomain, access_token: String, scope: String) -> Self {
        Self {
            id: Self::offline_id(&shop),
            shop,
            state: String::new(),
            is_online: false,
            access_token: Some(access_token),
            scope,
        }
    }

    /// Creates the lightweight session for a verified session token.
    ///
    /// It identifies the shop only: no access token, empty state and scope.
    #[must_use]
    pub fn identity_only(shop: ShopDomain) -> Self {
        Self {
            id: Self::offline_id(&shop),
            shop,
            state: String::new(),
            is_online: false,
            access_token: None,
            scope: String::new(),
        }
    }

    /// Returns `true` if this session can call the Admin API.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("shop", &self.shop)
            .field("is_online", &self.is_online)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "*****"),
            )
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
};
