//! Event admission for the Application controller
//!
//! Every watched type gets an [`EventFilter`] deciding, per create/update/delete,
//! whether the event should turn into a reconcile request. Filters are pure
//! functions over the classified event; the [`classifier`] module turns the raw
//! watch feed into those events.
//!
//! | Type        | Create | Update                      | Delete |
//! |-------------|--------|-----------------------------|--------|
//! | Application | yes    | version and spec changed    | no     |
//! | Deployment  | no     | version and spec changed    | yes    |
//! | Service     | no     | version and spec changed    | yes    |

pub mod classifier;

use std::marker::PhantomData;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use kube::{Resource, ResourceExt};
use tracing::debug;

use crate::crd::{Application, ApplicationSpec};

pub use classifier::{admitted_objects, EventClassifier, ResourceEvent};

/// A watched resource whose declared spec can be compared across versions
pub trait WatchedResource: Resource {
    /// The declared part of the object; status is deliberately excluded
    type Spec: PartialEq;

    /// The declared spec, if the object carries one
    fn declared_spec(&self) -> Option<&Self::Spec>;
}

impl WatchedResource for Application {
    type Spec = ApplicationSpec;

    fn declared_spec(&self) -> Option<&ApplicationSpec> {
        Some(&self.spec)
    }
}

impl WatchedResource for Deployment {
    type Spec = DeploymentSpec;

    fn declared_spec(&self) -> Option<&DeploymentSpec> {
        self.spec.as_ref()
    }
}

impl WatchedResource for Service {
    type Spec = ServiceSpec;

    fn declared_spec(&self) -> Option<&ServiceSpec> {
        self.spec.as_ref()
    }
}

/// True when the version token moved and the declared spec differs.
///
/// A status-only write bumps the version but leaves the spec alone, so it
/// is not a spec change.
pub fn spec_changed<K: WatchedResource>(old: &K, new: &K) -> bool {
    if old.resource_version() == new.resource_version() {
        return false;
    }
    old.declared_spec() != new.declared_spec()
}

/// Decides whether a watch event on `K` should enqueue a reconcile
pub trait EventFilter<K>: Send + Sync {
    /// An object appeared
    fn create(&self, obj: &K) -> bool;

    /// An object changed from `old` to `new`
    fn update(&self, old: &K, new: &K) -> bool;

    /// An object disappeared
    fn delete(&self, obj: &K) -> bool;

    /// Dispatch a classified event to the matching hook
    fn admit(&self, event: &ResourceEvent<K>) -> bool {
        match event {
            ResourceEvent::Created(obj) => self.create(obj),
            ResourceEvent::Updated { old, new } => self.update(old, new),
            ResourceEvent::Deleted(obj) => self.delete(obj),
        }
    }
}

/// Filter for the parent Application type
#[derive(Clone, Copy, Debug, Default)]
pub struct ApplicationFilter;

impl EventFilter<Application> for ApplicationFilter {
    fn create(&self, obj: &Application) -> bool {
        debug!(application = %obj.name_any(), "application created");
        true
    }

    fn update(&self, old: &Application, new: &Application) -> bool {
        let changed = spec_changed(old, new);
        if changed {
            debug!(application = %new.name_any(), "application spec updated");
        }
        changed
    }

    // Children are removed by owner-reference cascade.
    fn delete(&self, obj: &Application) -> bool {
        debug!(application = %obj.name_any(), "application deleted");
        false
    }
}

/// Filter for children owned by an Application (Deployment, Service)
///
/// Creates are ignored because the controller made the child itself. Status
/// updates are ignored because the controller copies child status onto the
/// Application, which would otherwise loop forever.
pub struct OwnedResourceFilter<K> {
    _kind: PhantomData<fn() -> K>,
}

impl<K> OwnedResourceFilter<K> {
    /// Create a filter for owned children of type `K`
    pub fn new() -> Self {
        Self { _kind: PhantomData }
    }
}

impl<K> Default for OwnedResourceFilter<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EventFilter<K> for OwnedResourceFilter<K>
where
    K: WatchedResource<DynamicType = ()>,
{
    fn create(&self, _obj: &K) -> bool {
        false
    }

    fn update(&self, old: &K, new: &K) -> bool {
        let changed = spec_changed(old, new);
        if changed {
            debug!(kind = %K::kind(&()), name = %new.name_any(), "owned child spec updated");
        }
        changed
    }

    fn delete(&self, obj: &K) -> bool {
        debug!(kind = %K::kind(&()), name = %obj.name_any(), "owned child deleted");
        true
    }
}
