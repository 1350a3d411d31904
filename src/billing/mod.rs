//! Billing and trial sync.
//!
//! [`BillingService::sync_from_shopify`] reads the shop's recurring
//! application charges from the Admin API, reduces them to one
//! [`PlanState`], and merges it into `merchants/<shop>` under `plan`.
//!
//! # Charge Selection
//!
//! The `active` charge wins. Without one, the most recently created
//! `pending` or `frozen` charge is reported. With neither, the shop is on the
//! free plan.

use crate::auth::Session;
use crate::clients::{AdminApiError, AdminClient};
use crate::config::ApiVersion;
use crate::store::{collections, Document, DocumentStore, StoreError, WriteOp};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Plan name reported when the shop has no relevant charge.
pub const FREE_PLAN: &str = "free";

const CHARGES_PATH: &str = "recurring_application_charges.json";

/// Errors from billing sync.
#[derive(Debug, Error)]
pub enum BillingError {
    /// The Admin API call failed, including a missing access token.
    #[error(transparent)]
    Admin(#[from] AdminApiError),

    /// The plan could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The charges response had an unexpected shape.
    #[error("Unexpected recurring charges response: {0}")]
    Malformed(String),
}

/// A recurring application charge, as far as sync needs it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecurringCharge {
    /// Charge id.
    pub id: u64,
    /// Plan name given when the charge was created.
    #[serde(default)]
    pub name: Option<String>,
    /// Price as a decimal string.
    #[serde(default)]
    pub price: Option<String>,
    /// `pending`, `active`, `frozen`, `cancelled`, ...
    pub status: String,
    /// Whether this is a test charge.
    #[serde(default)]
    pub test: Option<bool>,
    /// End of the trial (date or timestamp).
    #[serde(default)]
    pub trial_ends_on: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ChargesResponse {
    recurring_application_charges: Vec<RecurringCharge>,
}

/// Normalized subscription state stored under `merchants/<shop>.plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanState {
    /// Plan name, or [`FREE_PLAN`].
    pub plan: String,
    /// Charge status, or `none`.
    pub status: String,
    /// Selected charge id.
    pub charge_id: Option<u64>,
    /// Price of the selected charge.
    pub price: Option<String>,
    /// Whether the selected charge is a test charge.
    pub test: bool,
    /// Trial end date (`YYYY-MM-DD`).
    pub trial_ends_on: Option<String>,
    /// Whole days left in the trial; zero once it has ended.
    pub trial_days_remaining: i64,
    /// When this state was computed (RFC 3339).
    pub synced_at: String,
}

impl PlanState {
    /// Builds the plan state from a shop's charges as of `now`.
    #[must_use]
    pub fn from_charges(charges: &[RecurringCharge], now: DateTime<Utc>) -> Self {
        let synced_at = now.to_rfc3339();
        let Some(charge) = select_charge(charges) else {
            return Self {
                plan: FREE_PLAN.to_string(),
                status: "none".to_string(),
                charge_id: None,
                price: None,
                test: false,
                trial_ends_on: None,
                trial_days_remaining: 0,
                synced_at,
            };
        };

        let trial_end = charge.trial_ends_on.as_deref().and_then(parse_trial_end);
        let trial_days_remaining = trial_end
            .map_or(0, |end| (end - now.date_naive()).num_days().max(0));

        Self {
            plan: charge
                .name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| FREE_PLAN.to_string()),
            status: charge.status.clone(),
            charge_id: Some(charge.id),
            price: charge.price.clone(),
            test: charge.test.unwrap_or(false),
            trial_ends_on: trial_end.map(|date| date.format("%Y-%m-%d").to_string()),
            trial_days_remaining,
            synced_at,
        }
    }
}

fn select_charge(charges: &[RecurringCharge]) -> Option<&RecurringCharge> {
    charges
        .iter()
        .find(|charge| charge.status == "active")
        .or_else(|| {
            charges
                .iter()
                .filter(|charge| matches!(charge.status.as_str(), "pending" | "frozen"))
                .max_by_key(|charge| (charge.created_at, charge.id))
        })
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp.
fn parse_trial_end(value: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

/// Syncs subscription state from Shopify into the document store.
#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn DocumentStore>,
    api_version: ApiVersion,
    admin_base_uri: Option<String>,
}

impl BillingService {
    /// Creates a billing service.
    pub fn new(store: Arc<dyn DocumentStore>, api_version: ApiVersion) -> Self {
        Self {
            store,
            api_version,
            admin_base_uri: None,
        }
    }

    /// Sends Admin API calls to `base_uri` instead of the shop domain.
    #[must_use]
    pub fn with_admin_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.admin_base_uri = Some(base_uri.into());
        self
    }

    /// Reads the shop's charges and stores the resulting [`PlanState`].
    ///
    /// # Errors
    ///
    /// - [`BillingError::Admin`] if the session has no access token or the
    ///   Admin API call fails
    /// - [`BillingError::Malformed`] if the response cannot be read
    /// - [`BillingError::Store`] if the merchant document cannot be written
    pub async fn sync_from_shopify(&self, session: &Session) -> Result<PlanState, BillingError> {
        let mut client = AdminClient::new(session, &self.api_version)?;
        if let Some(base_uri) = &self.admin_base_uri {
            client = client.with_base_uri(base_uri.as_str());
        }

        let body = client.get(CHARGES_PATH).await?;
        let response: ChargesResponse =
            serde_json::from_value(body).map_err(|e| BillingError::Malformed(e.to_string()))?;

        let state = PlanState::from_charges(&response.recurring_application_charges, Utc::now());
        let plan =
            serde_json::to_value(&state).map_err(|e| BillingError::Malformed(e.to_string()))?;

        let mut set = Document::new();
        set.insert("shop".to_string(), Value::String(session.shop.to_string()));
        set.insert("plan".to_string(), plan);
        set.insert("updatedAt".to_string(), Value::String(state.synced_at.clone()));

        self.store
            .commit(vec![WriteOp::Update {
                collection: collections::MERCHANTS.to_string(),
                id: session.shop.to_string(),
                set,
                remove: Vec::new(),
                must_exist: false,
            }])
            .await?;

        tracing::info!(
            shop = %session.shop,
            plan = %state.plan,
            status = %state.status,
            trial_days_remaining = state.trial_days_remaining,
            "billing plan synced"
        );

        Ok(state)
    }
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService")
            .field("api_version", &self.api_version)
            .field("admin_base_uri", &self.admin_base_uri)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn charge(id: u64, status: &str, created: &str) -> RecurringCharge {
        RecurringCharge {
            id,
            name: Some("Pro".to_string()),
            price: Some("9.99".to_string()),
            status: status.to_string(),
            test: Some(true),
            trial_ends_on: None,
            created_at: Some(created.parse().unwrap()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_active_charge_wins() {
        let charges = vec![
            charge(1, "pending", "2025-02-20T00:00:00Z"),
            charge(2, "active", "2025-01-01T00:00:00Z"),
        ];
        let state = PlanState::from_charges(&charges, now());
        assert_eq!(state.status, "active");
        assert_eq!(state.charge_id, Some(2));
        assert_eq!(state.plan, "Pro");
        assert!(state.test);
    }

    #[test]
    fn test_most_recent_pending_or_frozen_without_active() {
        let charges = vec![
            charge(1, "pending", "2025-01-01T00:00:00Z"),
            charge(2, "frozen", "2025-02-01T00:00:00Z"),
            charge(3, "cancelled", "2025-02-15T00:00:00Z"),
        ];
        let state = PlanState::from_charges(&charges, now());
        assert_eq!(state.charge_id, Some(2));
        assert_eq!(state.status, "frozen");
    }

    #[test]
    fn test_no_relevant_charge_is_free_plan() {
        let charges = vec![charge(1, "declined", "2025-01-01T00:00:00Z")];
        let state = PlanState::from_charges(&charges, now());
        assert_eq!(state.plan, FREE_PLAN);
        assert_eq!(state.status, "none");
        assert_eq!(state.charge_id, None);
        assert_eq!(state.synced_at, now().to_rfc3339());
    }

    #[test]
    fn test_trial_days_remaining() {
        let mut active = charge(1, "active", "2025-02-01T00:00:00Z");
        active.trial_ends_on = Some("2025-03-08".to_string());
        let state = PlanState::from_charges(std::slice::from_ref(&active), now());
        assert_eq!(state.trial_days_remaining, 7);
        assert_eq!(state.trial_ends_on.as_deref(), Some("2025-03-08"));

        active.trial_ends_on = Some("2025-02-10T00:00:00-05:00".to_string());
        let state = PlanState::from_charges(&[active], now());
        assert_eq!(state.trial_days_remaining, 0);
        assert_eq!(state.trial_ends_on.as_deref(), Some("2025-02-10"));
    }

    #[test]
    fn test_plan_state_serializes_camel_case() {
        let state = PlanState::from_charges(&[], now());
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("trialDaysRemaining").is_some());
        assert!(json.get("syncedAt").is_some());
        assert!(json.get("chargeId").is_some());
    }
}
