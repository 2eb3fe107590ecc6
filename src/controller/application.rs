//! Application controller implementation
//!
//! Each reconcile fetches the latest Application, then syncs its Deployment
//! and its Service in that order. Both syncs are get-or-create: an existing
//! child only has its status mirrored onto the Application, a missing child
//! is built from the template and created. A successful pass never schedules
//! a requeue; the next pass is driven by watch events admitted by
//! [`crate::predicate`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use super::deployment::sync_deployment;
use super::service::sync_service;
use crate::crd::Application;
use crate::events::{EventPublisher, KubeEventPublisher};
use crate::{Error, DEFAULT_REQUEUE_AFTER, FIELD_MANAGER};

/// Trait abstracting Kubernetes client operations for the Application controller
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production. Lookups return `Ok(None)` for a 404.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get an Application by namespace and name
    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Application>, Error>;

    /// Write the status of an Application through the status subresource
    ///
    /// The status is replaced as a whole, so fields missing from `app.status`
    /// are cleared. The write carries the Application's resourceVersion, so a
    /// stale copy is rejected with a conflict. Returns the Application as
    /// persisted.
    async fn update_application_status(&self, app: &Application) -> Result<Application, Error>;

    /// Get a Deployment by namespace and name
    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, Error>;

    /// Get a Service by namespace and name
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error>;

    /// Create a Service
    async fn create_service(&self, service: &Service) -> Result<Service, Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Body of a status subresource replace.
///
/// The whole Application is sent, so the stored status becomes exactly
/// `app.status` (fields absent here are cleared) and the carried
/// resourceVersion makes a stale copy fail with a conflict.
pub(crate) fn status_replacement(app: &Application) -> Result<Vec<u8>, Error> {
    Ok(serde_json::to_vec(app)?)
}

fn namespace_of<K: Resource<DynamicType = ()>>(obj: &K) -> Result<String, Error> {
    obj.namespace().ok_or_else(|| {
        Error::invalid_resource(
            K::kind(&()).to_string(),
            format!("{} has no namespace", obj.name_any()),
        )
    })
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_application(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Application>, Error> {
        let api: Api<Application> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn update_application_status(&self, app: &Application) -> Result<Application, Error> {
        let namespace = namespace_of(app)?;
        let api: Api<Application> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        let updated = api
            .replace_status(&app.name_any(), &params, status_replacement(app)?)
            .await?;
        Ok(updated)
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, Error> {
        let namespace = namespace_of(deployment)?;
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.create(&params, deployment).await?)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_service(&self, service: &Service) -> Result<Service, Error> {
        let namespace = namespace_of(service)?;
        let api: Api<Service> = Api::namespaced(self.client.clone(), &namespace);
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        Ok(api.create(&params, service).await?)
    }
}

/// Counts reconcile passes for log correlation.
///
/// Owned by the [`Context`], so every controller (and every test) has its own.
#[derive(Debug, Default)]
pub struct ReconcileCounter(AtomicU64);

impl ReconcileCounter {
    /// Take the next reconcile number, starting at 1
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of reconciles started so far
    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// What a child sync did on this pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Child exists and its status is already recorded on the Application
    Unchanged,
    /// Child exists and its status was copied onto the Application
    StatusUpdated,
    /// Child was missing and has been created
    Created,
}

/// Controller context shared by all reconciles
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Event publisher for Application events
    pub events: Arc<dyn EventPublisher>,
    /// Delay before retrying a failed reconcile
    pub requeue_after: Duration,
    /// Reconcile pass counter
    pub reconciles: ReconcileCounter,
}

impl Context {
    /// Create a context from explicit collaborators
    pub fn new(kube: Arc<dyn KubeClient>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            kube,
            events,
            requeue_after: DEFAULT_REQUEUE_AFTER,
            reconciles: ReconcileCounter::default(),
        }
    }

    /// Create a production context from a Kubernetes client
    pub fn from_client(client: Client) -> Self {
        Self::new(
            Arc::new(KubeClientImpl::new(client.clone())),
            Arc::new(KubeEventPublisher::new(client, FIELD_MANAGER)),
        )
    }

    /// Override the retry delay used after a failed reconcile
    pub fn with_requeue_after(mut self, requeue_after: Duration) -> Self {
        self.requeue_after = requeue_after;
        self
    }

    /// Publish an event on the Application, ignoring failures
    pub(crate) async fn publish(
        &self,
        app: &Application,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        self.events
            .publish(&app.object_ref(&()), type_, reason, action, Some(note))
            .await;
    }
}

/// Reconcile an Application
///
/// The Application handed in by the runtime only identifies the request; the
/// latest copy is fetched before anything is written.
///
/// # Returns
///
/// `Action::await_change()` on success (including when the Application is
/// gone). Errors are turned into a delayed retry by [`error_policy`].
#[instrument(skip(app, ctx), fields(application = %app.name_any(), namespace = ?app.namespace()))]
pub async fn reconcile(app: Arc<Application>, ctx: Arc<Context>) -> Result<Action, Error> {
    let number = ctx.reconciles.next();
    info!(number, "starting reconcile");

    let name = app.name_any();
    let namespace = namespace_of(app.as_ref())?;

    let fetched = ctx
        .kube
        .get_application(&namespace, &name)
        .await
        .inspect_err(|e| error!(error = %e, "failed to get application, will retry"))?;
    let Some(mut current) = fetched else {
        debug!(number, "application no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    let deployment = sync_deployment(&mut current, &ctx)
        .await
        .inspect_err(|e| error!(error = %e, "failed to reconcile deployment"))?;
    let service = sync_service(&mut current, &ctx)
        .await
        .inspect_err(|e| error!(error = %e, "failed to reconcile service"))?;

    info!(number, ?deployment, ?service, "finished reconcile");
    Ok(Action::await_change())
}

/// Error policy for the Application controller
///
/// Every failure is retried after the context's fixed delay. Failures stay
/// local to this Application's key.
pub fn error_policy(app: Arc<Application>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_conflict() {
        warn!(
            application = %app.name_any(),
            namespace = ?app.namespace(),
            retry_in_secs = ctx.requeue_after.as_secs(),
            "application changed during reconcile"
        );
    } else {
        error!(
            ?error,
            application = %app.name_any(),
            namespace = ?app.namespace(),
            retry_in_secs = ctx.requeue_after.as_secs(),
            "reconciliation failed"
        );
    }
    Action::requeue(ctx.requeue_after)
}
