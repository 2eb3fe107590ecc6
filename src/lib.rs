//! Application operator - reconciles Application resources into workloads
//!
//! An `Application` (`apps.aloys.cn/v1`) carries a Deployment template and a
//! Service template. The operator keeps exactly one Deployment and one
//! Service per Application and mirrors their status back onto it.
//!
//! # Modules
//!
//! - [`crd`] - The Application custom resource
//! - [`controller`] - Reconciliation logic for Applications and their children
//! - [`controller_runner`] - Watch wiring and work-queue configuration
//! - [`predicate`] - Watch event classification and filtering
//! - [`webhook`] - Defaulting and validating admission webhooks
//! - [`events`] - Kubernetes Event publishing
//! - [`health`] - Liveness and readiness endpoints
//! - [`config`] - Command-line and environment configuration
//! - [`telemetry`] - Logging setup
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod config;
pub mod controller;
pub mod controller_runner;
pub mod crd;
pub mod error;
pub mod events;
pub mod health;
pub mod predicate;
pub mod telemetry;
pub mod webhook;

use std::time::Duration;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager and event reporter name for everything the operator writes
pub const FIELD_MANAGER: &str = "application-operator";

/// Delay before a failed reconcile is retried
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(60);

/// Default upper bound on reconciles running at once
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 10;

/// Default quiet period before a queued reconcile starts
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);
