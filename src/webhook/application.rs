//! Application admission handlers
//!
//! Handles AdmissionReview requests for Application resources. The mutating
//! handler runs the [`ApplicationDefaulter`] and answers with a JSON patch;
//! the validating handler dispatches to the configured [`Validator`].

use std::sync::Arc;

use axum::{extract::State, Json};
use kube::{
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation},
    Resource,
};
use tracing::{debug, error, info, warn};

use super::defaulter::ApplicationDefaulter;
use super::validator::{Rejection, Validator, Warnings};
use super::WebhookState;
use crate::crd::Application;
use crate::Error;

/// Handle mutating admission review for Applications
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    Json(mutate(&state.defaulter, &req).into_review())
}

/// Handle validating admission review for Applications
pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    Json(validate(state.validator.as_ref(), &req).into_review())
}

/// Default the Application in `request` and return the resulting patch
pub fn mutate(
    defaulter: &ApplicationDefaulter,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = request.uid.clone();

    let obj = match &request.object {
        Some(obj) => obj,
        None => {
            debug!(uid = %uid, "No object in request, allowing unchanged");
            return AdmissionResponse::from(request);
        }
    };

    if let Err(e) = ensure_application_kind(request) {
        warn!(uid = %uid, error = %e, "Rejecting mutation of foreign kind");
        return AdmissionResponse::from(request).deny(e.to_string());
    }

    let patch = match defaulting_patch(defaulter, obj) {
        Ok(patch) => patch,
        Err(e) => {
            warn!(uid = %uid, error = %e, "Failed to default application");
            return AdmissionResponse::from(request).deny(e.to_string());
        }
    };

    if patch.0.is_empty() {
        debug!(uid = %uid, name = %request.name, "Application already defaulted");
        return AdmissionResponse::from(request);
    }

    info!(
        uid = %uid,
        name = %request.name,
        patch_ops = patch.0.len(),
        "Applying defaults to application"
    );

    match AdmissionResponse::from(request).with_patch(patch) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to serialize patch");
            AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
        }
    }
}

/// Run the validation hook matching the request's operation
pub fn validate(
    validator: &dyn Validator,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = request.uid.clone();

    if let Err(e) = ensure_application_kind(request) {
        warn!(uid = %uid, error = %e, "Rejecting validation of foreign kind");
        return AdmissionResponse::from(request).deny(e.to_string());
    }

    let verdict = match request.operation {
        Operation::Create => {
            required_application(request.object.as_ref(), "object")
                .map(|app| validator.validate_create(&app))
        }
        Operation::Update => {
            required_application(request.old_object.as_ref(), "oldObject").and_then(|old| {
                required_application(request.object.as_ref(), "object")
                    .map(|new| validator.validate_update(&old, &new))
            })
        }
        Operation::Delete => {
            required_application(request.old_object.as_ref(), "oldObject")
                .map(|app| validator.validate_delete(&app))
        }
        Operation::Connect => Ok(Ok(Warnings::new())),
    };

    match verdict {
        Ok(Ok(warnings)) => {
            debug!(uid = %uid, operation = ?request.operation, "Application admitted");
            let mut response = AdmissionResponse::from(request);
            if !warnings.is_empty() {
                response.warnings = Some(warnings);
            }
            response
        }
        Ok(Err(Rejection(reason))) => {
            info!(uid = %uid, operation = ?request.operation, %reason, "Application rejected");
            AdmissionResponse::from(request).deny(reason)
        }
        Err(e) => {
            warn!(uid = %uid, error = %e, "Malformed application in request");
            AdmissionResponse::from(request).deny(e.to_string())
        }
    }
}

/// Compute the JSON patch that applies defaults to `obj`.
///
/// The patch is a diff against the object exactly as submitted, so fields
/// absent from the request are never added except for the defaulted ones.
pub fn defaulting_patch(
    defaulter: &ApplicationDefaulter,
    obj: &DynamicObject,
) -> Result<json_patch::Patch, Error> {
    let original = serde_json::to_value(obj)?;
    let mut app: Application = serde_json::from_value(original.clone())?;
    defaulter.apply_defaults(&mut app);

    let mut defaulted = original.clone();
    defaulted["spec"]["deployment"]["replicas"] =
        serde_json::to_value(app.spec.deployment.replicas)?;

    Ok(json_patch::diff(&original, &defaulted))
}

fn ensure_application_kind(request: &AdmissionRequest<DynamicObject>) -> Result<(), Error> {
    let gvk = &request.kind;
    if gvk.group == Application::group(&()) && gvk.kind == Application::kind(&()) {
        return Ok(());
    }
    Err(Error::admission_type(
        "an Application",
        format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind),
    ))
}

fn required_application(obj: Option<&DynamicObject>, field: &str) -> Result<Application, Error> {
    let obj = obj.ok_or_else(|| {
        Error::invalid_resource("AdmissionRequest", format!("missing {field}"))
    })?;
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}
