//! One-shot batch inference against a temporary SageMaker endpoint.
//!
//! A job reads a CSV dataset from S3, drops the columns the model was not
//! trained on, stands up an endpoint for a hosted model, sends the whole
//! dataset in one request, appends the predictions as a new column, writes
//! the result back to S3 and deletes the endpoint again.
//!
//! ## Lifecycle
//!
//! ```text
//!  fetch ─► drop columns ─► provision ─► await ready ─► invoke ─► persist
//!                               │                                    │
//!                               └──────────── release ◄──────────────┘
//!                                        (every exit path)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use sage_batch::{BatchInference, Config};
//!
//! let config = Config::from_file("job.toml".as_ref())?;
//! let job = BatchInference::from_config(config)?;
//! let report = job.run().await?;
//! println!("{} rows written to {}", report.rows, report.output);
//! ```

pub mod config;
pub mod dataset;
pub mod endpoint;
pub mod error;
pub mod orchestrator;
pub mod providers;

pub use config::Config;
pub use dataset::Dataset;
pub use endpoint::{EndpointLease, EndpointSpec, PollPolicy};
pub use error::{Error, Result};
pub use orchestrator::{BatchInference, RunReport};
pub use providers::{
    ControlPlane, EndpointDescription, EndpointStatus, InferenceRuntime, ObjectLocation,
    ObjectStore, ProductionVariant,
};
