//! Custom Resource Definitions for the Application operator

mod application;

pub use application::{
    Application, ApplicationSpec, ApplicationStatus, DEPLOYMENT_SUFFIX, SERVICE_SUFFIX,
};
