//! Job configuration.
//!
//! A job is described by a TOML file whose sections mirror the workflow:
//!
//! ```toml
//! region = "us-east-1"
//!
//! [storage]
//! bucket = "sagunprojectbucket"
//! input_key = "sagemaker/calorie_prediction/predictions/full_dataset.csv"
//! output_key = "calorie-predictions"
//!
//! [endpoint]
//! model_name = "Custom-sklearn-model-2024-04-18-02-14-56"
//! endpoint_name = "sagun-endpoint"
//! endpoint_config_name = "my-endpoint-sagun"
//! ```
//!
//! Everything else has a default. [`Config::validate`] must pass before a
//! job is started.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::endpoint::{EndpointSpec, PollPolicy};
use crate::error::{Error, Result};
use crate::providers::{ObjectLocation, ProductionVariant};

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default instance type for the temporary endpoint.
pub const DEFAULT_INSTANCE_TYPE: &str = "ml.t2.medium";

/// Default production variant name.
pub const DEFAULT_VARIANT_NAME: &str = "AllTraffic";

/// Default seconds between endpoint status checks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default seconds to wait for the endpoint to become ready.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 1800;

/// Columns removed from the input before inference.
pub const DEFAULT_DROP_COLUMNS: [&str; 3] = ["Id", "ActivityDate", "Calculated Calories"];

/// Column that receives the predictions.
pub const DEFAULT_PREDICTION_COLUMN: &str = "Prediction_calories";

/// Names of SageMaker models, endpoints, configs and variants. Hyphen runs are
/// unbounded here, so the 63 character limit is checked separately.
static RESOURCE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9](-*[a-zA-Z0-9]){0,62}$").expect("valid regex"));

const MAX_RESOURCE_NAME_LEN: usize = 63;

static BUCKET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid regex"));

/// Complete job configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// AWS region used to derive service URLs.
    pub region: String,
    pub storage: StorageConfig,
    pub endpoint: EndpointConfig,
    pub polling: PollingConfig,
    pub dataset: DatasetConfig,
    pub services: ServiceUrls,
}

/// Where the job reads and writes data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Bucket holding input and output objects.
    pub bucket: String,
    /// Key of the input dataset.
    pub input_key: String,
    /// Key receiving the dataset with predictions.
    pub output_key: String,
    /// Key receiving the dataset right after column removal, if set.
    pub modified_key: Option<String>,
}

/// The temporary endpoint and the model it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub model_name: String,
    pub endpoint_name: String,
    pub endpoint_config_name: String,
    pub variant_name: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub variant_weight: f32,
    /// Delete an endpoint and config left behind under the same names first.
    pub replace_existing: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            model_name: String::new(),
            endpoint_name: String::new(),
            endpoint_config_name: String::new(),
            variant_name: DEFAULT_VARIANT_NAME.to_string(),
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            instance_count: 1,
            variant_weight: 1.0,
            replace_existing: false,
        }
    }
}

/// Readiness polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
        }
    }
}

/// Dataset shaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// Columns removed before inference. All must be present in the input.
    pub drop_columns: Vec<String>,
    /// Name of the appended prediction column.
    pub prediction_column: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            drop_columns: DEFAULT_DROP_COLUMNS.iter().map(ToString::to_string).collect(),
            prediction_column: DEFAULT_PREDICTION_COLUMN.to_string(),
        }
    }
}

/// Service URL overrides. Unset entries derive from the region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceUrls {
    pub s3: Option<String>,
    pub sagemaker: Option<String>,
    pub runtime: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            storage: StorageConfig::default(),
            endpoint: EndpointConfig::default(),
            polling: PollingConfig::default(),
            dataset: DatasetConfig::default(),
            services: ServiceUrls::default(),
        }
    }
}

impl Config {
    /// Parse configuration from TOML text. Does not validate.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the text is not valid for this schema.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read configuration from a TOML file. Does not validate.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Check every field once, before any remote call is made.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        require("region", &self.region)?;

        let storage = &self.storage;
        if !BUCKET_NAME.is_match(&storage.bucket) {
            return Err(Error::Config(format!(
                "storage.bucket is not a valid bucket name: {:?}",
                storage.bucket
            )));
        }
        require("storage.input_key", &storage.input_key)?;
        require("storage.output_key", &storage.output_key)?;
        if let Some(modified) = &storage.modified_key {
            require("storage.modified_key", modified)?;
            if modified == &storage.output_key {
                return Err(Error::Config(
                    "storage.modified_key and storage.output_key must differ".to_string(),
                ));
            }
        }

        let endpoint = &self.endpoint;
        resource_name("endpoint.model_name", &endpoint.model_name)?;
        resource_name("endpoint.endpoint_name", &endpoint.endpoint_name)?;
        resource_name("endpoint.endpoint_config_name", &endpoint.endpoint_config_name)?;
        resource_name("endpoint.variant_name", &endpoint.variant_name)?;
        require("endpoint.instance_type", &endpoint.instance_type)?;
        if endpoint.instance_count == 0 {
            return Err(Error::Config(
                "endpoint.instance_count must be at least 1".to_string(),
            ));
        }
        if !endpoint.variant_weight.is_finite() || endpoint.variant_weight < 0.0 {
            return Err(Error::Config(
                "endpoint.variant_weight must be a non-negative number".to_string(),
            ));
        }

        if self.polling.interval_secs == 0 {
            return Err(Error::Config(
                "polling.interval_secs must be positive".to_string(),
            ));
        }
        if self.polling.timeout_secs < self.polling.interval_secs {
            return Err(Error::Config(
                "polling.timeout_secs must be at least polling.interval_secs".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.dataset.drop_columns {
            if !seen.insert(column) {
                return Err(Error::Config(format!(
                    "dataset.drop_columns lists {column:?} twice"
                )));
            }
        }
        require("dataset.prediction_column", &self.dataset.prediction_column)?;

        for (field, url) in [
            ("services.s3", &self.services.s3),
            ("services.sagemaker", &self.services.sagemaker),
            ("services.runtime", &self.services.runtime),
        ] {
            if let Some(url) = url {
                url::Url::parse(url)
                    .map_err(|e| Error::Config(format!("{field} is not a valid URL: {e}")))?;
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn input_location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.storage.bucket, &self.storage.input_key)
    }

    #[must_use]
    pub fn output_location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.storage.bucket, &self.storage.output_key)
    }

    #[must_use]
    pub fn modified_location(&self) -> Option<ObjectLocation> {
        self.storage
            .modified_key
            .as_ref()
            .map(|key| ObjectLocation::new(&self.storage.bucket, key))
    }

    /// The endpoint to provision for this job.
    #[must_use]
    pub fn endpoint_spec(&self) -> EndpointSpec {
        let endpoint = &self.endpoint;
        EndpointSpec {
            endpoint_name: endpoint.endpoint_name.clone(),
            config_name: endpoint.endpoint_config_name.clone(),
            variants: vec![ProductionVariant {
                variant_name: endpoint.variant_name.clone(),
                model_name: endpoint.model_name.clone(),
                initial_instance_count: endpoint.instance_count,
                instance_type: endpoint.instance_type.clone(),
                initial_variant_weight: endpoint.variant_weight,
            }],
        }
    }

    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.polling.interval_secs),
            timeout: Duration::from_secs(self.polling.timeout_secs),
        }
    }

    #[must_use]
    pub fn s3_url(&self) -> String {
        self.services
            .s3
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }

    #[must_use]
    pub fn sagemaker_url(&self) -> String {
        self.services
            .sagemaker
            .clone()
            .unwrap_or_else(|| format!("https://api.sagemaker.{}.amazonaws.com", self.region))
    }

    #[must_use]
    pub fn runtime_url(&self) -> String {
        self.services
            .runtime
            .clone()
            .unwrap_or_else(|| format!("https://runtime.sagemaker.{}.amazonaws.com", self.region))
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{field} must be set")));
    }
    Ok(())
}

fn resource_name(field: &str, value: &str) -> Result<()> {
    require(field, value)?;
    if value.len() > MAX_RESOURCE_NAME_LEN || !RESOURCE_NAME.is_match(value) {
        return Err(Error::Config(format!(
            "{field} must be 1-63 alphanumeric characters or hyphens, got {value:?}"
        )));
    }
    Ok(())
}
