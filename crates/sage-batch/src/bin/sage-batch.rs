//! sage-batch CLI - run a batch inference job against a temporary endpoint.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sage_batch::{BatchInference, Config, EndpointStatus, Error};

/// sage-batch CLI - one-shot batch inference on SageMaker.
#[derive(Parser)]
#[command(name = "sage-batch")]
#[command(about = "Score a CSV dataset in S3 with a temporary SageMaker endpoint")]
struct Cli {
    /// Job configuration file (TOML).
    #[arg(long, short, env = "SAGE_BATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Per-field overrides applied on top of the configuration file.
#[derive(Args)]
struct Overrides {
    /// AWS region.
    #[arg(long, env = "SAGE_BATCH_REGION", global = true)]
    region: Option<String>,

    /// S3 bucket for input and output.
    #[arg(long, env = "SAGE_BATCH_BUCKET", global = true)]
    bucket: Option<String>,

    /// Key of the input dataset.
    #[arg(long, env = "SAGE_BATCH_INPUT_KEY", global = true)]
    input_key: Option<String>,

    /// Key receiving the dataset with predictions.
    #[arg(long, env = "SAGE_BATCH_OUTPUT_KEY", global = true)]
    output_key: Option<String>,

    /// Key receiving the dataset after column removal.
    #[arg(long, env = "SAGE_BATCH_MODIFIED_KEY", global = true)]
    modified_key: Option<String>,

    /// Hosted model to serve.
    #[arg(long, env = "SAGE_BATCH_MODEL_NAME", global = true)]
    model_name: Option<String>,

    /// Endpoint name.
    #[arg(long, env = "SAGE_BATCH_ENDPOINT_NAME", global = true)]
    endpoint_name: Option<String>,

    /// Endpoint configuration name.
    #[arg(long, env = "SAGE_BATCH_ENDPOINT_CONFIG_NAME", global = true)]
    endpoint_config_name: Option<String>,

    /// Seconds between endpoint status checks.
    #[arg(long, env = "SAGE_BATCH_POLL_INTERVAL_SECS", global = true)]
    poll_interval_secs: Option<u64>,

    /// Seconds to wait for the endpoint before giving up.
    #[arg(long, env = "SAGE_BATCH_READY_TIMEOUT_SECS", global = true)]
    ready_timeout_secs: Option<u64>,

    /// Delete an endpoint left behind under the same name before provisioning.
    #[arg(long, env = "SAGE_BATCH_REPLACE_EXISTING", global = true)]
    replace_existing: bool,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.region {
            config.region = v;
        }
        if let Some(v) = self.bucket {
            config.storage.bucket = v;
        }
        if let Some(v) = self.input_key {
            config.storage.input_key = v;
        }
        if let Some(v) = self.output_key {
            config.storage.output_key = v;
        }
        if let Some(v) = self.modified_key {
            config.storage.modified_key = Some(v);
        }
        if let Some(v) = self.model_name {
            config.endpoint.model_name = v;
        }
        if let Some(v) = self.endpoint_name {
            config.endpoint.endpoint_name = v;
        }
        if let Some(v) = self.endpoint_config_name {
            config.endpoint.endpoint_config_name = v;
        }
        if let Some(v) = self.poll_interval_secs {
            config.polling.interval_secs = v;
        }
        if let Some(v) = self.ready_timeout_secs {
            config.polling.timeout_secs = v;
        }
        if self.replace_existing {
            config.endpoint.replace_existing = true;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full job: provision, predict, write results, tear down.
    Run,

    /// Show the status of the configured endpoint.
    Status,

    /// Delete the configured endpoint and configuration if they exist.
    Teardown,

    /// Validate the configuration and print it.
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    cli.overrides.apply(&mut config);
    config.validate().context("Configuration is invalid")?;

    match cli.command {
        Commands::Validate => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            println!("{rendered}");
        }

        Commands::Run => {
            let job = build_job(config)?;
            let report = job.run().await.context("Batch inference failed")?;

            println!("\nBatch inference complete");
            println!("  Endpoint:  {}", report.endpoint_name);
            println!("  Rows:      {}", report.rows);
            println!("  Output:    {}", report.output);
            if let Some(modified) = &report.modified_output {
                println!("  Modified:  {modified}");
            }
            println!(
                "  Duration:  {}s",
                (report.finished_at - report.started_at).num_seconds()
            );
        }

        Commands::Status => match build_job(config)?.status().await {
            Ok(description) => {
                println!("\nEndpoint: {}", description.name);
                println!("  Status: {}", description.status);
                if description.status == EndpointStatus::Failed {
                    println!(
                        "  Reason: {}",
                        description.failure_reason.unwrap_or_default()
                    );
                }
            }
            Err(Error::NotFound(name)) => {
                println!("\nEndpoint {name} does not exist");
            }
            Err(e) => return Err(e).context("Failed to describe endpoint"),
        },

        Commands::Teardown => {
            build_job(config)?
                .teardown()
                .await
                .context("Teardown failed")?;
            info!("Teardown complete");
        }
    }

    Ok(())
}

/// Build the job and cancel it on Ctrl+C or SIGTERM.
fn build_job(config: Config) -> Result<BatchInference> {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let job = BatchInference::from_config(config)
        .context("Failed to create service clients")?
        .with_cancellation(cancel);
    Ok(job)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Received Ctrl+C, cancelling and cleaning up");
        },
        () = terminate => {
            warn!("Received SIGTERM, cancelling and cleaning up");
        },
    }
}
