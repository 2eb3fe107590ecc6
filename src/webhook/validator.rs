//! Validation hooks for Application writes
//!
//! The admission pipeline needs one hook per operation. The shipped
//! [`ApplicationValidator`] accepts everything; stricter rules belong in a
//! new [`Validator`] implementation.

use kube::ResourceExt;
use tracing::info;

use crate::crd::Application;

/// Non-fatal messages returned to the client alongside an accepted write
pub type Warnings = Vec<String>;

/// Reason a write was rejected
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Rejection(pub String);

/// Validation hooks invoked before an Application write is persisted
pub trait Validator: Send + Sync {
    /// Validate a new Application
    fn validate_create(&self, app: &Application) -> Result<Warnings, Rejection>;

    /// Validate a change from `old` to `new`
    fn validate_update(&self, old: &Application, new: &Application)
        -> Result<Warnings, Rejection>;

    /// Validate the removal of an Application
    fn validate_delete(&self, app: &Application) -> Result<Warnings, Rejection>;
}

/// Accept-all validator
#[derive(Clone, Copy, Debug, Default)]
pub struct ApplicationValidator;

impl Validator for ApplicationValidator {
    fn validate_create(&self, app: &Application) -> Result<Warnings, Rejection> {
        info!(application = %app.name_any(), "validating application create");
        Ok(Warnings::new())
    }

    fn validate_update(
        &self,
        _old: &Application,
        new: &Application,
    ) -> Result<Warnings, Rejection> {
        info!(application = %new.name_any(), "validating application update");
        Ok(Warnings::new())
    }

    fn validate_delete(&self, app: &Application) -> Result<Warnings, Rejection> {
        info!(application = %app.name_any(), "validating application delete");
        Ok(Warnings::new())
    }
}
