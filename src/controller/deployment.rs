//! Deployment child of an Application
//!
//! The Deployment is named `<application>-deployment`. Its selector and pod
//! template labels are both forced to the template's `selector.matchLabels`,
//! so the Deployment always selects its own pods.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

use super::application::{Context, SyncOutcome};
use crate::crd::Application;
use crate::events::{actions, reasons};
use crate::Error;

/// Build the Deployment an Application should own
pub fn build_deployment(app: &Application) -> Result<Deployment, Error> {
    let name = app.deployment_name();
    let owner = app.controller_owner_ref(&()).ok_or_else(|| {
        Error::owner_reference("Deployment", &name, "application has no name or uid")
    })?;

    let mut spec = app.spec.deployment.clone();
    let selector_labels = spec.selector.match_labels.clone();
    spec.template
        .metadata
        .get_or_insert_with(ObjectMeta::default)
        .labels = selector_labels;

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: app.namespace(),
            labels: app.metadata.labels.clone(),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(spec),
        status: None,
    })
}

/// True when the Application already records the Deployment's live status.
///
/// A missing status on either side compares as an empty status.
pub fn workflow_status_converged(app: &Application, live: &Deployment) -> bool {
    let empty = DeploymentStatus::default();
    let recorded = app.recorded_workflow_status().unwrap_or(&empty);
    let observed = live.status.as_ref().unwrap_or(&empty);
    recorded == observed
}

/// Ensure the Application's Deployment exists and its status is recorded.
///
/// On a status write `app` is replaced with the persisted copy so later
/// writes in the same pass carry the new resourceVersion.
pub async fn sync_deployment(app: &mut Application, ctx: &Context) -> Result<SyncOutcome, Error> {
    let name = app.deployment_name();
    let namespace = app
        .namespace()
        .ok_or_else(|| Error::invalid_resource("Application", "missing namespace"))?;

    match ctx.kube.get_deployment(&namespace, &name).await? {
        Some(live) => {
            debug!(deployment = %name, "deployment already exists");
            if workflow_status_converged(app, &live) {
                return Ok(SyncOutcome::Unchanged);
            }

            app.status_mut().workflow = live.status.unwrap_or_default();
            *app = ctx.kube.update_application_status(app).await?;
            info!(deployment = %name, "application workflow status updated");
            ctx.publish(
                app,
                EventType::Normal,
                reasons::STATUS_SYNCED,
                actions::RECONCILE,
                format!("Recorded status of Deployment {name}"),
            )
            .await;
            Ok(SyncOutcome::StatusUpdated)
        }
        None => {
            let desired = build_deployment(app)?;
            if let Err(e) = ctx.kube.create_deployment(&desired).await {
                warn!(deployment = %name, error = %e, "failed to create deployment");
                ctx.publish(
                    app,
                    EventType::Warning,
                    reasons::CREATE_FAILED,
                    actions::CREATE,
                    format!("Failed to create Deployment {name}: {e}"),
                )
                .await;
                return Err(e);
            }
            info!(deployment = %name, "deployment created");
            ctx.publish(
                app,
                EventType::Normal,
                reasons::DEPLOYMENT_CREATED,
                actions::CREATE,
                format!("Created Deployment {name}"),
            )
            .await;
            Ok(SyncOutcome::Created)
        }
    }
}
