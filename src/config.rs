//! Command-line and environment configuration
//!
//! Every option can also be set through the environment variable named in its
//! help text, which is how the Deployment manifest configures the operator.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::controller_runner::RunnerConfig;
use crate::telemetry::LogFormat;
use crate::webhook::DEFAULT_REPLICAS;
use crate::{DEFAULT_MAX_CONCURRENT_RECONCILES, DEFAULT_REQUEUE_AFTER};

/// Certificate directory used in a cluster
pub const DEFAULT_CERT_DIR: &str = "/tmp/k8s-webhook-server/serving-certs";

/// Application operator - reconciles Applications into a Deployment and a Service
#[derive(Parser, Debug, Clone)]
#[command(name = "application-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print the Application CRD manifest and exit
    #[arg(long)]
    pub crd: bool,

    /// Address the admission webhook server binds to
    #[arg(long, env = "WEBHOOK_BIND_ADDRESS", default_value = "0.0.0.0:9443")]
    pub webhook_bind_address: SocketAddr,

    /// Address the liveness/readiness endpoints bind to
    #[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", default_value = "0.0.0.0:8081")]
    pub health_probe_bind_address: SocketAddr,

    /// Directory holding tls.crt and tls.key for the webhook server
    ///
    /// Defaults to ./certs when ENV=DEV, otherwise to the in-cluster mount.
    #[arg(long, env = "WEBHOOK_CERT_DIR")]
    pub cert_dir: Option<PathBuf>,

    /// Serve the admission webhooks
    #[arg(
        long,
        env = "ENABLE_WEBHOOKS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub enable_webhooks: bool,

    /// Upper bound on reconciles running at once
    #[arg(long, env = "MAX_CONCURRENT_RECONCILES", default_value_t = DEFAULT_MAX_CONCURRENT_RECONCILES)]
    pub max_concurrent_reconciles: u16,

    /// Delay before a failed reconcile is retried, in seconds
    #[arg(long, env = "REQUEUE_AFTER_SECS", default_value_t = DEFAULT_REQUEUE_AFTER.as_secs())]
    pub requeue_after_secs: u64,

    /// Quiet period before a queued reconcile starts, in milliseconds
    #[arg(long, env = "DEBOUNCE_MILLIS", default_value_t = 1000)]
    pub debounce_millis: u64,

    /// Replica count the defaulting webhook applies when none is set
    #[arg(long, env = "DEFAULT_REPLICAS", default_value_t = DEFAULT_REPLICAS)]
    pub default_replicas: i32,

    /// Log line format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

impl Cli {
    /// Work-queue settings derived from the flags
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_concurrent_reconciles: self.max_concurrent_reconciles,
            debounce: Duration::from_millis(self.debounce_millis),
        }
    }

    /// Retry delay for failed reconciles
    pub fn requeue_after(&self) -> Duration {
        Duration::from_secs(self.requeue_after_secs)
    }

    /// Resolve the webhook certificate directory
    pub fn resolved_cert_dir(&self) -> std::io::Result<PathBuf> {
        if let Some(dir) = &self.cert_dir {
            return Ok(dir.clone());
        }
        let env = std::env::var("ENV").ok();
        Ok(default_cert_dir(env.as_deref(), &std::env::current_dir()?))
    }
}

/// Certificate directory for the given `ENV` value and working directory
pub fn default_cert_dir(env: Option<&str>, cwd: &Path) -> PathBuf {
    match env {
        Some("DEV") => cwd.join("certs"),
        _ => PathBuf::from(DEFAULT_CERT_DIR),
    }
}
