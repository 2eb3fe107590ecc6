//! Defaulting for Application specs

use tracing::info;

use crate::crd::Application;
use kube::ResourceExt;

/// Replica count applied when the Deployment template leaves it unset
pub const DEFAULT_REPLICAS: i32 = 1;

/// Replica counts strictly above this value are clamped
pub const REPLICA_CLAMP_THRESHOLD: i32 = 9;

/// Replica count used when clamping
pub const CLAMPED_REPLICAS: i32 = 8;

/// Normalizes an Application before it is persisted
#[derive(Clone, Debug)]
pub struct ApplicationDefaulter {
    /// Replica count for templates that do not set one
    pub default_replicas: i32,
}

impl Default for ApplicationDefaulter {
    fn default() -> Self {
        Self {
            default_replicas: DEFAULT_REPLICAS,
        }
    }
}

impl ApplicationDefaulter {
    /// Create a defaulter with the given default replica count
    pub fn new(default_replicas: i32) -> Self {
        Self { default_replicas }
    }

    /// Apply defaults to `app` in place.
    ///
    /// Unset replicas become `default_replicas`; anything above
    /// [`REPLICA_CLAMP_THRESHOLD`] becomes [`CLAMPED_REPLICAS`]. A value of
    /// exactly the threshold is kept.
    pub fn apply_defaults(&self, app: &mut Application) {
        let name = app.name_any();
        info!(application = %name, "defaulting application");

        let replicas = app
            .spec
            .deployment
            .replicas
            .get_or_insert(self.default_replicas);
        if *replicas > REPLICA_CLAMP_THRESHOLD {
            info!(
                application = %name,
                requested = *replicas,
                replicas = CLAMPED_REPLICAS,
                "clamping replicas"
            );
            *replicas = CLAMPED_REPLICAS;
        }
    }
}
