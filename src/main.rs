//! Application operator - reconciles Applications into a Deployment and a Service

use std::sync::Arc;

use clap::Parser;
use kube::{Client, CustomResourceExt};

use application_operator::config::Cli;
use application_operator::controller::Context;
use application_operator::controller_runner::build_application_controller;
use application_operator::crd::Application;
use application_operator::health::serve_probes;
use application_operator::telemetry::{init_telemetry, TelemetryConfig};
use application_operator::webhook::{
    serve_webhooks, ApplicationDefaulter, ApplicationValidator, WebhookState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Application::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        anyhow::bail!("Failed to install crypto provider: {:?}", e);
    }

    init_telemetry(TelemetryConfig {
        log_format: cli.log_format,
    })?;

    run_operator(cli).await
}

/// Run the controller, the admission webhooks and the probe server
async fn run_operator(cli: Cli) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let ctx = Arc::new(Context::from_client(client.clone()).with_requeue_after(cli.requeue_after()));
    let controller = build_application_controller(client, ctx, &cli.runner_config());

    let webhooks = async {
        if !cli.enable_webhooks {
            tracing::info!("Admission webhooks disabled");
            return std::future::pending().await;
        }
        let cert_dir = cli.resolved_cert_dir()?;
        let state = Arc::new(WebhookState::new(
            ApplicationDefaulter::new(cli.default_replicas),
            Arc::new(ApplicationValidator),
        ));
        serve_webhooks(state, cli.webhook_bind_address, &cert_dir).await
    };

    tracing::info!("Starting Application operator");

    tokio::select! {
        _ = controller => {
            tracing::info!("Application controller completed");
        }
        result = webhooks => {
            result.map_err(|e| anyhow::anyhow!("Webhook server failed: {}", e))?;
        }
        result = serve_probes(cli.health_probe_bind_address) => {
            result.map_err(|e| anyhow::anyhow!("Health probe server failed: {}", e))?;
        }
    }

    Ok(())
}
