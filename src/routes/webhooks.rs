//! Compliance webhook endpoints.
//!
//! Once a delivery is verified the answer is always
//! `200 {"success": true}`. Payload and processing errors are logged at
//! error level; Shopify redelivers on its own schedule.

use crate::compliance::ComplianceOutcome;
use crate::routes::VerifiedWebhook;
use crate::state::AppState;
use crate::webhooks::{CompliancePayload, WebhookTopic};
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// `POST /api/webhooks`: routes by the `X-Shopify-Topic` header.
pub async fn unified(State(state): State<AppState>, webhook: VerifiedWebhook) -> Json<Value> {
    match webhook.context.topic() {
        Some(topic) => process(&state, topic, &webhook).await,
        None => {
            tracing::info!(
                topic = webhook.context.topic_raw(),
                shop = webhook.context.shop_domain(),
                webhook_id = webhook.context.webhook_id(),
                "unhandled webhook topic acknowledged"
            );
            success()
        }
    }
}

/// `POST /api/webhooks/customers/data_request`
pub async fn customers_data_request(
    State(state): State<AppState>,
    webhook: VerifiedWebhook,
) -> Json<Value> {
    process(&state, WebhookTopic::CustomersDataRequest, &webhook).await
}

/// `POST /api/webhooks/customers/redact`
pub async fn customers_redact(State(state): State<AppState>, webhook: VerifiedWebhook) -> Json<Value> {
    process(&state, WebhookTopic::CustomersRedact, &webhook).await
}

/// `POST /api/webhooks/shop/redact`
pub async fn shop_redact(State(state): State<AppState>, webhook: VerifiedWebhook) -> Json<Value> {
    process(&state, WebhookTopic::ShopRedact, &webhook).await
}

/// `POST /api/webhooks/app/uninstalled`
pub async fn app_uninstalled(State(state): State<AppState>, webhook: VerifiedWebhook) -> Json<Value> {
    process(&state, WebhookTopic::AppUninstalled, &webhook).await
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

async fn process(state: &AppState, topic: WebhookTopic, webhook: &VerifiedWebhook) -> Json<Value> {
    let context = &webhook.context;
    let webhook_id = context.webhook_id();

    if context.topic().is_some_and(|header_topic| header_topic != topic) {
        tracing::debug!(%topic, header_topic = context.topic_raw(), "topic header differs from route");
    }

    let payload = match CompliancePayload::parse(topic, context.shop_domain(), &webhook.body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(%topic, webhook_id, error = %e, "compliance webhook payload rejected");
            return success();
        }
    };

    tracing::info!(%topic, shop = %payload.shop(), webhook_id, "processing compliance webhook");

    match state.compliance().handle(&payload).await {
        Ok(ComplianceOutcome::Exported(export)) => Json(json!({ "success": true, "data": export })),
        Ok(_) => success(),
        Err(e) => {
            tracing::error!(%topic, shop = %payload.shop(), webhook_id, error = %e, "compliance webhook processing failed");
            success()
        }
    }
}
