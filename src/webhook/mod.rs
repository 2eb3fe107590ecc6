//! Admission webhooks for Application
//!
//! Two endpoints are served over TLS:
//! - a mutating hook that defaults replica counts
//! - a validating hook that runs the create/update/delete validators
//!
//! Certificates are read from `tls.crt` and `tls.key` in the configured
//! directory, matching what cert-manager mounts into the pod.

mod application;
mod defaulter;
mod validator;

pub use application::{defaulting_patch, mutate, mutate_handler, validate, validate_handler};
pub use defaulter::{ApplicationDefaulter, CLAMPED_REPLICAS, DEFAULT_REPLICAS, REPLICA_CLAMP_THRESHOLD};
pub use validator::{ApplicationValidator, Rejection, Validator, Warnings};

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{routing::post, Router};
use axum_server::tls_rustls::RustlsConfig;
use tracing::info;

/// Path the mutating webhook configuration points at
pub const MUTATE_PATH: &str = "/mutate-apps-aloys-cn-v1-application";

/// Path the validating webhook configuration points at
pub const VALIDATE_PATH: &str = "/validate-apps-aloys-cn-v1-application";

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Defaulting applied by the mutating hook
    pub defaulter: ApplicationDefaulter,
    /// Hooks run by the validating endpoint
    pub validator: Arc<dyn Validator>,
}

impl WebhookState {
    /// Create webhook state from a defaulter and validator
    pub fn new(defaulter: ApplicationDefaulter, validator: Arc<dyn Validator>) -> Self {
        Self {
            defaulter,
            validator,
        }
    }
}

/// Create the webhook router with the mutating and validating endpoints
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(application::mutate_handler))
        .route(VALIDATE_PATH, post(application::validate_handler))
        .with_state(state)
}

/// Serve the admission webhooks over TLS until the future is dropped
pub async fn serve_webhooks(
    state: Arc<WebhookState>,
    addr: SocketAddr,
    cert_dir: &Path,
) -> std::io::Result<()> {
    let tls = RustlsConfig::from_pem_file(cert_dir.join("tls.crt"), cert_dir.join("tls.key")).await?;

    info!(%addr, cert_dir = %cert_dir.display(), "Starting admission webhook server");
    axum_server::bind_rustls(addr, tls)
        .serve(webhook_router(state).into_make_service())
        .await
}
