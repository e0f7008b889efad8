//! The batch inference job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::dataset::Dataset;
use crate::endpoint::{self, EndpointLease};
use crate::error::{Error, Result};
use crate::providers::{
    ControlPlane, EndpointDescription, EndpointStatus, InferenceRuntime, ObjectLocation,
    ObjectStore, S3, SageMaker, SageMakerRuntime,
};

/// Content type of inference payloads.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Summary of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub endpoint_name: String,
    /// Rows sent for inference.
    pub rows: usize,
    /// Where the dataset with predictions was written.
    pub output: ObjectLocation,
    /// Where the dataset without the dropped columns was written, if enabled.
    pub modified_output: Option<ObjectLocation>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs one batch inference job against injected service clients.
pub struct BatchInference {
    config: Config,
    storage: Arc<dyn ObjectStore>,
    control: Arc<dyn ControlPlane>,
    runtime: Arc<dyn InferenceRuntime>,
    cancel: CancellationToken,
}

impl BatchInference {
    /// Create a job from a configuration and service clients.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration does not validate.
    pub fn new(
        config: Config,
        storage: Arc<dyn ObjectStore>,
        control: Arc<dyn ControlPlane>,
        runtime: Arc<dyn InferenceRuntime>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            storage,
            control,
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a job backed by the AWS clients the configuration points at.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or a client cannot be built.
    pub fn from_config(config: Config) -> Result<Self> {
        let storage = Arc::new(S3::new(&config.s3_url())?);
        let control = Arc::new(SageMaker::new(&config.sagemaker_url())?);
        let runtime = Arc::new(SageMakerRuntime::new(&config.runtime_url())?);
        Self::new(config, storage, control, runtime)
    }

    /// Use `cancel` to stop the job early. Cleanup still runs.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read and parse a dataset.
    ///
    /// # Errors
    /// Returns the storage error, or [`Error::Dataset`] if the object is not CSV.
    pub async fn fetch_dataset(&self, location: &ObjectLocation) -> Result<Dataset> {
        let text = self.storage.get_object(location).await?;
        let data = Dataset::from_csv(&text)?;
        info!(
            location = %location,
            rows = data.row_count(),
            columns = data.column_count(),
            "Loaded dataset"
        );
        debug!(columns = ?data.columns(), "Dataset columns");
        Ok(data)
    }

    /// Write a dataset with its header row, replacing any existing object.
    ///
    /// # Errors
    /// Returns the storage error.
    pub async fn persist(&self, location: &ObjectLocation, data: &Dataset) -> Result<()> {
        self.storage.put_object(location, data.to_csv(true)?).await?;
        info!(location = %location, rows = data.row_count(), "CSV has been saved");
        Ok(())
    }

    /// Send the dataset to the endpoint and return one prediction per row.
    ///
    /// # Errors
    /// Returns [`Error::Dataset`] if the dataset has no columns, the runtime
    /// error, or [`Error::PredictionCountMismatch`] if the response does not
    /// have exactly one line per row.
    pub async fn invoke(&self, endpoint_name: &str, data: &Dataset) -> Result<Vec<String>> {
        ensure_features(data)?;
        let payload = data.to_csv(false)?;
        let body = self
            .runtime
            .invoke_endpoint(endpoint_name, CSV_CONTENT_TYPE, payload)
            .await?;

        let predictions: Vec<String> = body.lines().map(str::to_string).collect();
        if predictions.len() != data.row_count() {
            return Err(Error::PredictionCountMismatch {
                expected: data.row_count(),
                actual: predictions.len(),
            });
        }

        info!(endpoint = %endpoint_name, predictions = predictions.len(), "Received predictions");
        Ok(predictions)
    }

    /// Describe the configured endpoint.
    ///
    /// # Errors
    /// Returns the control-plane error, [`Error::NotFound`] if it does not exist.
    pub async fn status(&self) -> Result<EndpointDescription> {
        self.control
            .describe_endpoint(&self.config.endpoint.endpoint_name)
            .await
    }

    /// Delete the configured endpoint and configuration if they exist.
    ///
    /// # Errors
    /// Returns any deletion error other than not-found.
    pub async fn teardown(&self) -> Result<()> {
        let endpoint = &self.config.endpoint;
        endpoint::remove_existing(
            self.control.as_ref(),
            &endpoint.endpoint_name,
            &endpoint.endpoint_config_name,
            self.config.poll_policy(),
            &self.cancel,
        )
        .await
    }

    /// Run the whole job: load, drop columns, provision, wait, infer, write,
    /// deprovision.
    ///
    /// Once the endpoint has been provisioned it is deleted on every path,
    /// including failure and cancellation. If both the job and the cleanup
    /// fail, the job error is returned and the cleanup error is logged.
    ///
    /// # Errors
    /// Returns the first error encountered.
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let config = &self.config;

        let mut data = self.fetch_dataset(&config.input_location()).await?;
        data.drop_columns(&config.dataset.drop_columns)?;
        info!(columns = ?config.dataset.drop_columns, "Dropped columns");
        ensure_features(&data)?;

        let modified_output = config.modified_location();
        if let Some(location) = &modified_output {
            self.persist(location, &data).await?;
        }

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let spec = config.endpoint_spec();
        if config.endpoint.replace_existing {
            endpoint::remove_existing(
                self.control.as_ref(),
                &spec.endpoint_name,
                &spec.config_name,
                config.poll_policy(),
                &self.cancel,
            )
            .await?;
        }

        let lease = endpoint::provision(Arc::clone(&self.control), &spec).await?;

        let outcome = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.serve(&lease, data) => result,
        };
        let released = lease.release().await;

        let rows = match (outcome, released) {
            (Ok(rows), Ok(())) => rows,
            (Ok(_), Err(cleanup)) => return Err(cleanup),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(cleanup)) => {
                error!(error = %cleanup, "Endpoint cleanup failed after job error");
                return Err(e);
            }
        };

        Ok(RunReport {
            endpoint_name: spec.endpoint_name,
            rows,
            output: config.output_location(),
            modified_output,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Wait for the leased endpoint, run inference and write the result.
    async fn serve(&self, lease: &EndpointLease, mut data: Dataset) -> Result<usize> {
        let endpoint_name = lease.endpoint_name();
        let ready = endpoint::await_ready(
            self.control.as_ref(),
            endpoint_name,
            self.config.poll_policy(),
            &self.cancel,
        )
        .await?;

        if ready.status == EndpointStatus::Failed {
            return Err(Error::EndpointFailed {
                endpoint: endpoint_name.to_string(),
                reason: ready
                    .failure_reason
                    .unwrap_or_else(|| "no failure reason reported".to_string()),
            });
        }

        info!(endpoint = %endpoint_name, rows = data.row_count(), "Prediction started");
        let predictions = self.invoke(endpoint_name, &data).await?;
        data.set_column(self.config.dataset.prediction_column.clone(), predictions)?;

        self.persist(&self.config.output_location(), &data).await?;
        Ok(data.row_count())
    }
}

fn ensure_features(data: &Dataset) -> Result<()> {
    if data.column_count() == 0 {
        return Err(Error::Dataset("no feature columns left to send".into()));
    }
    Ok(())
}
