//! AWS implementations of the service traits.
//!
//! ## Services
//!
//! - **S3** - input datasets and prediction output (path-style URLs)
//! - **SageMaker** - endpoint configuration and endpoint lifecycle (JSON 1.1 protocol)
//! - **SageMaker Runtime** - endpoint invocation
//!
//! Requests are sent unsigned to the configured base URLs; point them at a
//! signing proxy or a local emulator as needed.

mod http;
mod models;
mod runtime;
mod s3;
mod sagemaker;

pub use runtime::SageMakerRuntime;
pub use s3::S3;
pub use sagemaker::SageMaker;
