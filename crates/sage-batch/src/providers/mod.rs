//! Storage and model-hosting service abstractions.
//!
//! The workflow talks to three services through the traits defined here,
//! so tests and alternative backends can stand in for the AWS clients.

pub mod aws;
mod traits;

pub use traits::{
    ControlPlane, EndpointDescription, EndpointStatus, InferenceRuntime, ObjectLocation,
    ObjectStore, ProductionVariant,
};

// Re-export AWS clients
pub use aws::{S3, SageMaker, SageMakerRuntime};
