//! Service child of an Application
//!
//! The Service is named `<application>-service` and selects pods carrying the
//! Application's own labels, whatever selector the template declared.

use k8s_openapi::api::core::v1::{Service, ServiceStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

use super::application::{Context, SyncOutcome};
use crate::crd::Application;
use crate::events::{actions, reasons};
use crate::Error;

/// Build the Service an Application should own
pub fn build_service(app: &Application) -> Result<Service, Error> {
    let name = app.service_name();
    let owner = app.controller_owner_ref(&()).ok_or_else(|| {
        Error::owner_reference("Service", &name, "application has no name or uid")
    })?;

    let mut spec = app.spec.service.clone();
    spec.selector = app.metadata.labels.clone();

    Ok(Service {
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

/// True when the Application already records the Service's live status
pub fn network_status_converged(app: &Application, live: &Service) -> bool {
    let empty = ServiceStatus::default();
    let recorded = app.recorded_network_status().unwrap_or(&empty);
    let observed = live.status.as_ref().unwrap_or(&empty);
    recorded == observed
}

/// Ensure the Application's Service exists and its status is recorded
pub async fn sync_service(app: &mut Application, ctx: &Context) -> Result<SyncOutcome, Error> {
    let name = app.service_name();
    let namespace = app
        .namespace()
        .ok_or_else(|| Error::invalid_resource("Application", "missing namespace"))?;

    let Some(live) = ctx.kube.get_service(&namespace, &name).await? else {
        let desired = build_service(app)?;
        if let Err(e) = ctx.kube.create_service(&desired).await {
            warn!(service = %name, error = %e, "failed to create service");
            ctx.publish(
                app,
                EventType::Warning,
                reasons::CREATE_FAILED,
                actions::CREATE,
                format!("Failed to create Service {name}: {e}"),
            )
            .await;
            return Err(e);
        }
        info!(service = %name, "service created");
        ctx.publish(
            app,
            EventType::Normal,
            reasons::SERVICE_CREATED,
            actions::CREATE,
            format!("Created Service {name}"),
        )
        .await;
        return Ok(SyncOutcome::Created);
    };

    debug!(service = %name, "service already exists");
    if network_status_converged(app, &live) {
        return Ok(SyncOutcome::Unchanged);
    }

    app.status_mut().network = live.status.unwrap_or_default();
    *app = ctx.kube.update_application_status(app).await?;
    info!(service = %name, "application network status updated");
    ctx.publish(
        app,
        EventType::Normal,
        reasons::STATUS_SYNCED,
        actions::RECONCILE,
        format!("Recorded status of Service {name}"),
    )
    .await;
    Ok(SyncOutcome::StatusUpdated)
}
