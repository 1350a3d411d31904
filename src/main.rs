//! Giveaway app server.
//!
//! Reads configuration from the environment (and `.env`), picks the document
//! store and asset store, and serves the router until Ctrl+C or SIGTERM.
//!
//! # Backends
//!
//! - `FIRESTORE_PROJECT_ID` set: Firestore REST, otherwise an in-memory store
//! - `FIREBASE_STORAGE_BUCKET` set: Firebase Storage, otherwise asset
//!   deletion is skipped

#![cfg_attr(not(test), forbid(unsafe_code))]

use giveaway_app::routes::router;
use giveaway_app::store::{
    AssetStore, DisabledAssets, DocumentStore, FirebaseStorage, FirestoreConfig, FirestoreStore,
    MemoryStore,
};
use giveaway_app::{AppConfig, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "giveaway_app=info,tower_http=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn backends() -> (Arc<dyn DocumentStore>, Arc<dyn AssetStore>) {
    let firestore = FirestoreConfig::from_env();
    let token = firestore
        .as_ref()
        .and_then(FirestoreConfig::token)
        .map(String::from);

    let store: Arc<dyn DocumentStore> = match firestore {
        Some(config) => {
            tracing::info!(project = config.project_id(), "using Firestore document store");
            Arc::new(FirestoreStore::new(config))
        }
        None => {
            tracing::warn!("FIRESTORE_PROJECT_ID not set, using in-memory document store");
            Arc::new(MemoryStore::new())
        }
    };

    let assets: Arc<dyn AssetStore> = match std::env::var("FIREBASE_STORAGE_BUCKET")
        .ok()
        .filter(|bucket| !bucket.trim().is_empty())
    {
        Some(bucket) => {
            tracing::info!(bucket = %bucket, "using Firebase Storage for assets");
            Arc::new(FirebaseStorage::new(bucket, token))
        }
        None => {
            tracing::warn!("FIREBASE_STORAGE_BUCKET not set, asset deletion disabled");
            Arc::new(DisabledAssets)
        }
    };

    (store, assets)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "invalid configuration");
    })?;
    let addr = config.bind_addr();
    if !config.is_production() {
        tracing::info!("APP_ENV is not production, session cookies are not marked Secure");
    }

    let (store, assets) = backends();
    let app = router(AppState::new(config, store, assets));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "giveaway app listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}
