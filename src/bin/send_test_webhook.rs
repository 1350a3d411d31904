//! Sends a signed compliance webhook to a running server.
//!
//! Used to re-trigger processing for a shop or customer after a failure, or
//! to exercise a deployment end to end.
//!
//! ```text
//! send-test-webhook --topic shop/redact --shop my-store.myshopify.com
//! send-test-webhook --topic customers/redact --shop my-store --customer-id 1234
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::Parser;
use giveaway_app::auth::hmac::compute_signature_base64;
use giveaway_app::webhooks::{
    WebhookTopic, HEADER_HMAC, HEADER_SHOP_DOMAIN, HEADER_TOPIC, HEADER_WEBHOOK_ID,
};
use giveaway_app::ShopDomain;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "send-test-webhook")]
#[command(about = "Sign and send a compliance webhook")]
struct Cli {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Webhook topic, e.g. customers/data_request
    #[arg(long)]
    topic: WebhookTopic,

    /// Shop domain or shop name
    #[arg(long)]
    shop: String,

    /// Secret used to sign the body
    #[arg(long, env = "SHOPIFY_API_SECRET", hide_env_values = true)]
    secret: String,

    /// Customer id for customers/* topics
    #[arg(long)]
    customer_id: Option<String>,

    /// Customer email for customers/* topics
    #[arg(long)]
    email: Option<String>,

    /// Send this file as the body instead of a generated payload
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// Post to the unified /api/webhooks endpoint
    #[arg(long)]
    unified: bool,
}

impl Cli {
    fn body(&self, shop: &ShopDomain) -> std::io::Result<Vec<u8>> {
        if let Some(path) = &self.body_file {
            return std::fs::read(path);
        }

        let payload = if self.topic.is_customer_topic() {
            json!({
                "shop_domain": shop,
                "customer": {"id": self.customer_id, "email": self.email},
                "orders_requested": [],
            })
        } else {
            json!({ "shop_domain": shop, "shop_id": null })
        };
        Ok(payload.to_string().into_bytes())
    }

    fn endpoint(&self) -> String {
        let base = self.url.trim_end_matches('/');
        if self.unified {
            format!("{base}/api/webhooks")
        } else {
            format!("{base}/api/webhooks/{}", self.topic)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let shop = ShopDomain::new(&cli.shop)?;
    let body = cli.body(&shop)?;
    let signature = compute_signature_base64(&body, &cli.secret);
    let endpoint = cli.endpoint();
    let webhook_id = format!("manual-{}", chrono::Utc::now().timestamp_millis());

    println!("POST {endpoint} ({}, {} bytes)", cli.topic, body.len());

    let response = reqwest::Client::new()
        .post(&endpoint)
        .header("Content-Type", "application/json")
        .header(HEADER_HMAC, signature)
        .header(HEADER_TOPIC, cli.topic.as_str())
        .header(HEADER_SHOP_DOMAIN, shop.as_ref())
        .header(HEADER_WEBHOOK_ID, &webhook_id)
        .body(body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    println!("{status}");
    if !text.is_empty() {
        println!("{text}");
    }

    if status.is_success() {
        Ok(())
    } else {
        Err(format!("server answered {status}").into())
    }
}
