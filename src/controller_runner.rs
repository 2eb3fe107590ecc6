//! Controller runner - wires the Application controller to its watches
//!
//! The parent and both child watches run through the event classifier and
//! predicate filters in [`crate::predicate`] before anything reaches the
//! work-queue. Child events are mapped to their owning Application by
//! controller owner reference.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::{self, Controller};
use kube::runtime::watcher::{watcher, Config as WatcherConfig};
use kube::runtime::{reflector, WatchStreamExt};
use kube::{Api, Client};

use crate::controller::{error_policy, reconcile, Context};
use crate::crd::Application;
use crate::predicate::{admitted_objects, ApplicationFilter, OwnedResourceFilter};
use crate::{DEFAULT_DEBOUNCE, DEFAULT_MAX_CONCURRENT_RECONCILES};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
pub const WATCH_TIMEOUT_SECS: u32 = 25;

/// Work-queue settings for the Application controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Upper bound on reconciles running at once
    pub max_concurrent_reconciles: u16,
    /// Quiet period before a queued request is handed to a worker
    pub debounce: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: DEFAULT_MAX_CONCURRENT_RECONCILES,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl RunnerConfig {
    fn controller_config(&self) -> controller::Config {
        controller::Config::default()
            .concurrency(self.max_concurrent_reconciles)
            .debounce(self.debounce)
    }
}

fn watcher_config() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

/// Build the Application controller future
///
/// Watches Applications, Deployments and Services cluster-wide. The returned
/// future completes once a shutdown signal has drained the work-queue.
pub fn build_application_controller(
    client: Client,
    ctx: Arc<Context>,
    config: &RunnerConfig,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let applications: Api<Application> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client);

    let (reader, writer) = reflector::store();
    let parent_events = watcher(applications, watcher_config())
        .default_backoff()
        .reflect(writer);
    let deployment_events = watcher(deployments, watcher_config()).default_backoff();
    let service_events = watcher(services, watcher_config()).default_backoff();

    tracing::info!(
        concurrency = config.max_concurrent_reconciles,
        debounce_ms = config.debounce.as_millis() as u64,
        "- Application controller"
    );

    Box::pin(
        Controller::for_stream(admitted_objects(parent_events, ApplicationFilter), reader)
            .owns_stream(admitted_objects(
                deployment_events,
                OwnedResourceFilter::<Deployment>::new(),
            ))
            .owns_stream(admitted_objects(
                service_events,
                OwnedResourceFilter::<Service>::new(),
            ))
            .with_config(config.controller_config())
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("Application")),
    )
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
