//! Application Custom Resource Definition
//!
//! An Application declares a Deployment template and a Service template.
//! The operator realizes them as two owned children and mirrors their live
//! status back onto the Application.

use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
use k8s_openapi::api::core::v1::{ServiceSpec, ServiceStatus};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Suffix appended to the Application name to derive its Deployment name
pub const DEPLOYMENT_SUFFIX: &str = "-deployment";

/// Suffix appended to the Application name to derive its Service name
pub const SERVICE_SUFFIX: &str = "-service";

/// Desired state of an Application
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "apps.aloys.cn",
    version = "v1",
    kind = "Application",
    plural = "applications",
    singular = "application",
    shortname = "app",
    status = "ApplicationStatus",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.deployment.replicas"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Template for the owned Deployment
    #[serde(default)]
    pub deployment: DeploymentSpec,

    /// Template for the owned Service
    #[serde(default)]
    pub service: ServiceSpec,
}

/// Last observed state of the owned children
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    /// Status of the owned Deployment as last recorded
    #[serde(default)]
    pub workflow: DeploymentStatus,

    /// Status of the owned Service as last recorded
    #[serde(default)]
    pub network: ServiceStatus,
}

impl Application {
    /// Name of the Deployment owned by this Application
    pub fn deployment_name(&self) -> String {
        format!("{}{}", self.name_any(), DEPLOYMENT_SUFFIX)
    }

    /// Name of the Service owned by this Application
    pub fn service_name(&self) -> String {
        format!("{}{}", self.name_any(), SERVICE_SUFFIX)
    }

    /// Deployment status currently recorded on the Application
    pub fn recorded_workflow_status(&self) -> Option<&DeploymentStatus> {
        self.status.as_ref().map(|s| &s.workflow)
    }

    /// Service status currently recorded on the Application
    pub fn recorded_network_status(&self) -> Option<&ServiceStatus> {
        self.status.as_ref().map(|s| &s.network)
    }

    /// Mutable access to the status, creating an empty one if absent
    pub fn status_mut(&mut self) -> &mut ApplicationStatus {
        self.status.get_or_insert_with(ApplicationStatus::default)
    }
}
