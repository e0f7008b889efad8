//! In-memory stand-ins for the storage, control-plane and runtime services.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use sage_batch::{
    Config, ControlPlane, EndpointDescription, EndpointStatus, Error, InferenceRuntime,
    ObjectLocation, ObjectStore, ProductionVariant, Result,
};

pub const JOB_TOML: &str = r#"
region = "us-east-1"

[storage]
bucket = "sagunprojectbucket"
input_key = "sagemaker/calorie_prediction/predictions/full_dataset.csv"
output_key = "calorie-predictions"

[endpoint]
model_name = "Custom-sklearn-model-2024-04-18-02-14-56"
endpoint_name = "sagun-endpoint"
endpoint_config_name = "my-endpoint-sagun"
"#;

pub const ACTIVITY_CSV: &str = "Id,ActivityDate,Calculated Calories,Steps\n\
    1503960366,4/12/2016,1985,13162\n\
    1503960366,4/13/2016,1797,10735\n\
    1624580081,4/14/2016,1432,8506\n\
    1644430081,4/15/2016,2010,11398\n\
    1844505072,4/16/2016,2140,12522\n";

pub fn job_config() -> Config {
    Config::from_toml_str(JOB_TOML).unwrap()
}

// ============================================================================
// Object storage
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ObjectLocation, String>>,
}

impl MemoryStore {
    pub fn with_object(location: &ObjectLocation, body: &str) -> Arc<Self> {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .insert(location.clone(), body.to_string());
        Arc::new(store)
    }

    pub fn object(&self, location: &ObjectLocation) -> Option<String> {
        self.objects.lock().unwrap().get(location).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, location: &ObjectLocation) -> Result<String> {
        self.object(location)
            .ok_or_else(|| Error::NotFound(location.to_string()))
    }

    async fn put_object(&self, location: &ObjectLocation, body: String) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(location.clone(), body);
        Ok(())
    }
}

// ============================================================================
// Control plane
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateConfig(String),
    CreateEndpoint(String),
    Describe(String),
    DeleteEndpoint(String),
    DeleteConfig(String),
}

/// Control plane that replays a scripted sequence of statuses.
///
/// The last status repeats once the script runs out.
pub struct FakeControlPlane {
    statuses: Mutex<VecDeque<EndpointStatus>>,
    calls: Mutex<Vec<Call>>,
    describe_times: Mutex<Vec<Instant>>,
    failure_reason: Option<String>,
    fail_create_config: bool,
    fail_create_endpoint: bool,
    fail_delete_endpoint: bool,
    /// Whether describe and delete report the endpoint as missing.
    missing: Mutex<bool>,
    /// Describe calls that still see the endpoint after it was deleted.
    lingering_describes: Mutex<usize>,
}

impl FakeControlPlane {
    pub fn new(statuses: impl IntoIterator<Item = EndpointStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            describe_times: Mutex::new(Vec::new()),
            failure_reason: None,
            fail_create_config: false,
            fail_create_endpoint: false,
            fail_delete_endpoint: false,
            missing: Mutex::new(false),
            lingering_describes: Mutex::new(0),
        }
    }

    pub fn failing_create_config(mut self) -> Self {
        self.fail_create_config = true;
        self
    }

    pub fn failing_create_endpoint(mut self) -> Self {
        self.fail_create_endpoint = true;
        self
    }

    pub fn failing_delete_endpoint(mut self) -> Self {
        self.fail_delete_endpoint = true;
        self
    }

    pub fn with_failure_reason(mut self, reason: &str) -> Self {
        self.failure_reason = Some(reason.to_string());
        self
    }

    pub fn missing(self) -> Self {
        *self.missing.lock().unwrap() = true;
        self
    }

    /// Keep reporting `Deleting` for this many describes after a delete.
    pub fn lingering(self, describes: usize) -> Self {
        *self.lingering_describes.lock().unwrap() = describes;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn describe_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Describe(_)))
            .count()
    }

    pub fn describe_times(&self) -> Vec<Instant> {
        self.describe_times.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn rejected(operation: &str) -> Error {
        Error::Api {
            status: 400,
            message: format!("ValidationException: {operation} rejected"),
        }
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn create_endpoint_config(
        &self,
        name: &str,
        _variants: &[ProductionVariant],
    ) -> Result<()> {
        self.record(Call::CreateConfig(name.to_string()));
        if self.fail_create_config {
            return Err(Self::rejected("CreateEndpointConfig"));
        }
        Ok(())
    }

    async fn create_endpoint(&self, name: &str, _config_name: &str) -> Result<()> {
        self.record(Call::CreateEndpoint(name.to_string()));
        if self.fail_create_endpoint {
            return Err(Self::rejected("CreateEndpoint"));
        }
        *self.missing.lock().unwrap() = false;
        Ok(())
    }

    async fn describe_endpoint(&self, name: &str) -> Result<EndpointDescription> {
        self.record(Call::Describe(name.to_string()));
        self.describe_times.lock().unwrap().push(Instant::now());

        if *self.missing.lock().unwrap() {
            let mut lingering = self.lingering_describes.lock().unwrap();
            if *lingering == 0 {
                return Err(Error::NotFound(name.to_string()));
            }
            *lingering -= 1;
            return Ok(EndpointDescription {
                name: name.to_string(),
                status: EndpointStatus::Deleting,
                failure_reason: None,
            });
        }

        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap_or(EndpointStatus::Creating)
        };

        let failure_reason = (status == EndpointStatus::Failed)
            .then(|| self.failure_reason.clone())
            .flatten();
        Ok(EndpointDescription {
            name: name.to_string(),
            status,
            failure_reason,
        })
    }

    async fn delete_endpoint(&self, name: &str) -> Result<()> {
        self.record(Call::DeleteEndpoint(name.to_string()));
        if self.fail_delete_endpoint {
            return Err(Self::rejected("DeleteEndpoint"));
        }
        let mut missing = self.missing.lock().unwrap();
        if *missing && *self.lingering_describes.lock().unwrap() == 0 {
            return Err(Error::NotFound(name.to_string()));
        }
        *missing = true;
        Ok(())
    }

    async fn delete_endpoint_config(&self, name: &str) -> Result<()> {
        self.record(Call::DeleteConfig(name.to_string()));
        Ok(())
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Runtime that answers every request with the same body.
pub struct FakeRuntime {
    response: Option<String>,
    requests: Mutex<Vec<(String, String, String)>>,
}

impl FakeRuntime {
    pub fn answering(lines: &[&str]) -> Self {
        let mut body = lines.join("\n");
        body.push('\n');
        Self {
            response: Some(body),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(endpoint, content type, body)` of every request received.
    pub fn requests(&self) -> Vec<(String, String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceRuntime for FakeRuntime {
    async fn invoke_endpoint(
        &self,
        name: &str,
        content_type: &str,
        body: String,
    ) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((name.to_string(), content_type.to_string(), body));
        self.response.clone().ok_or_else(|| Error::Api {
            status: 424,
            message: "ModelError: model container crashed".to_string(),
        })
    }
}
