//! In-memory object store for controller tests
//!
//! Models the parts of the API server the controller depends on: resource
//! versions, optimistic concurrency on status writes, AlreadyExists on
//! create, and cascade deletion of children through controller owner
//! references.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::{Service, ServiceStatus};
use kube::core::ErrorResponse;
use kube::ResourceExt;
use parking_lot::Mutex;

use super::application::{status_replacement, KubeClient};
use crate::crd::Application;
use crate::Error;

type Key = (String, String);

#[derive(Default)]
struct Inner {
    version: u64,
    writes: usize,
    deployment_creates: usize,
    service_creates: usize,
    applications: BTreeMap<Key, Application>,
    deployments: BTreeMap<Key, Deployment>,
    services: BTreeMap<Key, Service>,
}

impl Inner {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

fn api_error(code: u16, reason: &str, message: String) -> Error {
    Error::from(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn key_of<K: kube::Resource>(obj: &K) -> Key {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

fn controlled_by<K: kube::Resource>(obj: &K, owner_uid: &str) -> bool {
    obj.owner_references()
        .iter()
        .any(|o| o.controller == Some(true) && o.uid == owner_uid)
}

/// Test double for the API server
#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Persist an Application as a user would, assigning uid and version
    pub(crate) fn insert_application(&self, mut app: Application) -> Application {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        app.metadata.uid = Some(format!("uid-{}", app.name_any()));
        app.metadata.resource_version = Some(version);
        inner.applications.insert(key_of(&app), app.clone());
        app
    }

    pub(crate) fn application(&self, namespace: &str, name: &str) -> Option<Application> {
        self.inner
            .lock()
            .applications
            .get(&key(namespace, name))
            .cloned()
    }

    /// Simulate an unrelated write that bumps the Application's version
    pub(crate) fn touch_application(&self, namespace: &str, name: &str) {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        if let Some(app) = inner.applications.get_mut(&key(namespace, name)) {
            app.metadata.resource_version = Some(version);
        }
    }

    /// Delete an Application and garbage-collect everything it controls
    pub(crate) fn delete_application(&self, namespace: &str, name: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(app) = inner.applications.remove(&key(namespace, name)) else {
            return false;
        };
        let uid = app.uid().unwrap_or_default();
        inner.deployments.retain(|_, d| !controlled_by(d, &uid));
        inner.services.retain(|_, s| !controlled_by(s, &uid));
        true
    }

    /// Out-of-band child deletion
    pub(crate) fn delete_deployment(&self, namespace: &str, name: &str) -> bool {
        self.inner
            .lock()
            .deployments
            .remove(&key(namespace, name))
            .is_some()
    }

    /// Simulate the deployment controller reporting rollout progress
    pub(crate) fn set_deployment_status(&self, namespace: &str, name: &str, status: DeploymentStatus) {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        if let Some(deployment) = inner.deployments.get_mut(&key(namespace, name)) {
            deployment.status = Some(status);
            deployment.metadata.resource_version = Some(version);
        }
    }

    /// Out-of-band child deletion
    pub(crate) fn delete_service(&self, namespace: &str, name: &str) -> bool {
        self.inner
            .lock()
            .services
            .remove(&key(namespace, name))
            .is_some()
    }

    /// Simulate the service controller reporting load balancer state
    pub(crate) fn set_service_status(&self, namespace: &str, name: &str, status: ServiceStatus) {
        let mut inner = self.inner.lock();
        let version = inner.next_version();
        if let Some(service) = inner.services.get_mut(&key(namespace, name)) {
            service.status = Some(status);
            service.metadata.resource_version = Some(version);
        }
    }

    pub(crate) fn service_creates(&self) -> usize {
        self.inner.lock().service_creates
    }

    pub(crate) fn deployments(&self) -> Vec<Deployment> {
        self.inner.lock().deployments.values().cloned().collect()
    }

    pub(crate) fn services(&self) -> Vec<Service> {
        self.inner.lock().services.values().cloned().collect()
    }

    /// Writes issued through the [`KubeClient`] interface
    pub(crate) fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    pub(crate) fn deployment_creates(&self) -> usize {
        self.inner.lock().deployment_creates
    }
}

#[async_trait]
impl KubeClient for MemoryStore {
    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Application>, Error> {
        Ok(self.application(namespace, name))
    }

    async fn update_application_status(&self, app: &Application) -> Result<Application, Error> {
        let mut inner = self.inner.lock();
        let k = key_of(app);
        let current_version = match inner.applications.get(&k) {
            Some(stored) => stored.resource_version(),
            None => {
                return Err(api_error(404, "NotFound", format!("applications {:?} not found", k)))
            }
        };
        if current_version != app.resource_version() {
            return Err(api_error(
                409,
                "Conflict",
                "the object has been modified; please apply your changes to the latest version"
                    .to_string(),
            ));
        }

        // Apply exactly what goes over the wire: the status is replaced whole
        let sent: Application = serde_json::from_slice(&status_replacement(app)?)?;
        let version = inner.next_version();
        inner.writes += 1;
        let stored = inner
            .applications
            .get_mut(&k)
            .ok_or_else(|| api_error(404, "NotFound", "vanished".to_string()))?;
        stored.status = sent.status;
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        Ok(self.inner.lock().deployments.get(&key(namespace, name)).cloned())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, Error> {
        let mut inner = self.inner.lock();
        let k = key_of(deployment);
        if inner.deployments.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists", format!("{:?} already exists", k)));
        }
        let mut created = deployment.clone();
        created.metadata.resource_version = Some(inner.next_version());
        inner.writes += 1;
        inner.deployment_creates += 1;
        inner.deployments.insert(k, created.clone());
        Ok(created)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        Ok(self.inner.lock().services.get(&key(namespace, name)).cloned())
    }

    async fn create_service(&self, service: &Service) -> Result<Service, Error> {
        let mut inner = self.inner.lock();
        let k = key_of(service);
        if inner.services.contains_key(&k) {
            return Err(api_error(409, "AlreadyExists", format!("{:?} already exists", k)));
        }
        let mut created = service.clone();
        created.metadata.resource_version = Some(inner.next_version());
        inner.writes += 1;
        inner.service_creates += 1;
        inner.services.insert(k, created.clone());
        Ok(created)
    }
}
