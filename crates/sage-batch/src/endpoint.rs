//! Endpoint lifecycle: provision, wait for readiness, deprovision.
//!
//! [`provision`] hands back an [`EndpointLease`]. The lease owns the
//! obligation to delete the endpoint and its configuration, and must be
//! consumed with [`EndpointLease::release`] on every path out of the job.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::providers::{ControlPlane, EndpointDescription, EndpointStatus, ProductionVariant};

/// How often and for how long to poll an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between status checks.
    pub interval: Duration,
    /// Give up once this much time has passed since the first check.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(crate::config::DEFAULT_READY_TIMEOUT_SECS),
        }
    }
}

/// Everything needed to create an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    pub endpoint_name: String,
    pub config_name: String,
    pub variants: Vec<ProductionVariant>,
}

/// A provisioned endpoint that still has to be deleted.
pub struct EndpointLease {
    control: Arc<dyn ControlPlane>,
    endpoint_name: String,
    config_name: String,
    released: bool,
}

impl EndpointLease {
    #[must_use]
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    #[must_use]
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Delete the endpoint, then its configuration.
    ///
    /// # Errors
    /// Returns [`Error::Cleanup`] wrapping the first deletion failure.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        deprovision(self.control.as_ref(), &self.endpoint_name, &self.config_name)
            .await
            .map_err(|e| Error::Cleanup {
                endpoint: self.endpoint_name.clone(),
                source: Box::new(e),
            })
    }
}

impl Drop for EndpointLease {
    fn drop(&mut self) {
        if !self.released {
            error!(
                endpoint = %self.endpoint_name,
                config = %self.config_name,
                "Endpoint lease dropped without release; remove it with `sage-batch teardown`"
            );
        }
    }
}

/// Create the endpoint configuration, then request the endpoint.
///
/// If the endpoint request fails, the configuration created a moment earlier
/// is deleted again before the error is returned.
///
/// # Errors
/// Returns [`Error::Provisioning`] wrapping the control-plane failure.
pub async fn provision(control: Arc<dyn ControlPlane>, spec: &EndpointSpec) -> Result<EndpointLease> {
    let wrap = |e: Error| Error::Provisioning {
        endpoint: spec.endpoint_name.clone(),
        source: Box::new(e),
    };

    control
        .create_endpoint_config(&spec.config_name, &spec.variants)
        .await
        .map_err(wrap)?;

    if let Err(e) = control
        .create_endpoint(&spec.endpoint_name, &spec.config_name)
        .await
    {
        if let Err(cleanup) = control.delete_endpoint_config(&spec.config_name).await {
            warn!(
                config = %spec.config_name,
                error = %cleanup,
                "Failed to delete endpoint configuration after endpoint creation failed"
            );
        }
        return Err(wrap(e));
    }

    info!(endpoint = %spec.endpoint_name, "Endpoint is being created");
    Ok(EndpointLease {
        control,
        endpoint_name: spec.endpoint_name.clone(),
        config_name: spec.config_name.clone(),
        released: false,
    })
}

/// Poll the endpoint until it is `InService` or `Failed`.
///
/// Checks once immediately and then once per `policy.interval`. The last
/// check happens at the deadline.
///
/// # Errors
/// Returns [`Error::ReadinessTimeout`] past the deadline, [`Error::Cancelled`]
/// if `cancel` fires, or the describe error as-is.
pub async fn await_ready(
    control: &dyn ControlPlane,
    endpoint_name: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<EndpointDescription> {
    info!(
        endpoint = %endpoint_name,
        timeout_secs = policy.timeout.as_secs(),
        "Waiting for endpoint to be ready"
    );

    let start = Instant::now();
    loop {
        let description = control.describe_endpoint(endpoint_name).await?;
        let elapsed = start.elapsed();

        debug!(
            endpoint = %endpoint_name,
            status = %description.status,
            elapsed_secs = elapsed.as_secs(),
            "Polling endpoint status"
        );

        if description.status.is_terminal() {
            info!(endpoint = %endpoint_name, status = %description.status, "Endpoint settled");
            return Ok(description);
        }

        if elapsed >= policy.timeout {
            return Err(Error::ReadinessTimeout {
                endpoint: endpoint_name.to_string(),
                secs: policy.timeout.as_secs(),
            });
        }

        info!(
            endpoint = %endpoint_name,
            status = %description.status,
            "Endpoint not ready yet"
        );
        pause(policy.interval.min(policy.timeout - elapsed), cancel).await?;
    }
}

/// Delete the endpoint, then its configuration.
///
/// Both deletions are attempted; the first failure is returned.
///
/// # Errors
/// Returns the control-plane error of the first failed deletion.
pub async fn deprovision(
    control: &dyn ControlPlane,
    endpoint_name: &str,
    config_name: &str,
) -> Result<()> {
    let endpoint = control.delete_endpoint(endpoint_name).await;
    if let Err(e) = &endpoint {
        warn!(endpoint = %endpoint_name, error = %e, "Failed to delete endpoint");
    }

    let config = control.delete_endpoint_config(config_name).await;
    if let Err(e) = &config {
        warn!(config = %config_name, error = %e, "Failed to delete endpoint configuration");
    }

    endpoint?;
    config?;
    info!(
        endpoint = %endpoint_name,
        config = %config_name,
        "Endpoint and its configuration have been deleted"
    );
    Ok(())
}

/// Remove an endpoint and configuration that may or may not exist, and wait
/// until the endpoint name is free again.
///
/// # Errors
/// Returns any deletion error other than not-found, [`Error::ReadinessTimeout`]
/// if the endpoint is still present at the deadline, or [`Error::Cancelled`].
pub async fn remove_existing(
    control: &dyn ControlPlane,
    endpoint_name: &str,
    config_name: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<()> {
    match control.delete_endpoint(endpoint_name).await {
        Ok(()) => info!(endpoint = %endpoint_name, "Deleted existing endpoint"),
        Err(e) if e.is_not_found() => debug!(endpoint = %endpoint_name, "No existing endpoint"),
        Err(e) => return Err(e),
    }

    match control.delete_endpoint_config(config_name).await {
        Ok(()) => info!(config = %config_name, "Deleted existing endpoint configuration"),
        Err(e) if e.is_not_found() => debug!(config = %config_name, "No existing configuration"),
        Err(e) => return Err(e),
    }

    let start = Instant::now();
    loop {
        let status = match control.describe_endpoint(endpoint_name).await {
            Ok(description) => description.status,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(Error::ReadinessTimeout {
                endpoint: endpoint_name.to_string(),
                secs: policy.timeout.as_secs(),
            });
        }

        if status != EndpointStatus::Deleting {
            warn!(endpoint = %endpoint_name, status = %status, "Endpoint still present after delete");
        }
        pause(policy.interval.min(policy.timeout - elapsed), cancel).await?;
    }
}

async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}
