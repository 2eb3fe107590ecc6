//! Error types for the Application operator
//!
//! Errors carry the kind and name of the resource involved so that the
//! reconcile log line alone is enough to locate the failing object.

use thiserror::Error;

/// Main error type for Application operator operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error (get, create, status write, optimistic-concurrency conflict)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The owner reference linking a child to its Application could not be built
    #[error("cannot set owner reference on {kind} {name}: {message}")]
    OwnerReference {
        /// Kind of the child being created (Deployment, Service)
        kind: String,
        /// Name of the child being created
        name: String,
        /// Why the reference could not be built
        message: String,
    },

    /// A watched object is missing an identity field the operator relies on
    #[error("invalid {kind}: {message}")]
    InvalidResource {
        /// Kind of the offending object
        kind: String,
        /// What is missing or malformed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// An admission hook received an object that is not an Application
    #[error("expected {expected} object but got {got}")]
    AdmissionType {
        /// The kind the hook is registered for
        expected: String,
        /// What was actually received
        got: String,
    },
}

impl Error {
    /// Create an owner reference error for the given child
    pub fn owner_reference(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::OwnerReference {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid resource error
    pub fn invalid_resource(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidResource {
            kind: kind.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an admission type error
    pub fn admission_type(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::AdmissionType {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Returns true if this is an optimistic-concurrency conflict (HTTP 409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Kube { source: kube::Error::Api(e) } if e.code == 409)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
