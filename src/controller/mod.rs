//! Controller implementation for Application resources
//!
//! Controllers follow the Kubernetes controller pattern with observe-diff-act
//! loops. The Application controller owns a Deployment and a Service per
//! Application.

mod application;
mod deployment;
#[cfg(test)]
pub(crate) mod memory;
mod service;

pub use application::{
    error_policy, reconcile, Context, KubeClient, KubeClientImpl, ReconcileCounter, SyncOutcome,
};
pub use deployment::{build_deployment, sync_deployment, workflow_status_converged};
pub use service::{build_service, network_status_converged, sync_service};
