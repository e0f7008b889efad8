//! Wire-format tests for the AWS clients against a mock HTTP server.

mod common;

use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

use common::{job_config, ACTIVITY_CSV};
use sage_batch::providers::{S3, SageMaker, SageMakerRuntime};
use sage_batch::{
    BatchInference, ControlPlane, Dataset, EndpointStatus, Error, InferenceRuntime,
    ObjectLocation, ObjectStore, ProductionVariant,
};

const JSON_11: &str = "application/x-amz-json-1.1";

fn sagemaker_call(operation: &str) -> MockBuilder {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("X-Amz-Target", format!("SageMaker.{operation}").as_str()))
        .and(header("Content-Type", JSON_11))
}

#[tokio::test]
async fn test_s3_put_then_get() {
    let server = MockServer::start().await;
    let location = ObjectLocation::new("sagunprojectbucket", "predictions/out.csv");
    let csv = "Steps,Prediction_calories\n13162,100\n";

    Mock::given(method("PUT"))
        .and(path("/sagunprojectbucket/predictions/out.csv"))
        .and(header("Content-Type", "text/csv"))
        .and(body_string(csv))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sagunprojectbucket/predictions/out.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv))
        .expect(1)
        .mount(&server)
        .await;

    let s3 = S3::new(&server.uri()).unwrap();
    s3.put_object(&location, csv.to_string()).await.unwrap();
    let fetched = s3.get_object(&location).await.unwrap();

    assert_eq!(
        Dataset::from_csv(&fetched).unwrap(),
        Dataset::from_csv(csv).unwrap()
    );
}

#[tokio::test]
async fn test_s3_missing_object_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<Error><Code>NoSuchKey</Code></Error>"))
        .mount(&server)
        .await;

    let s3 = S3::new(&server.uri()).unwrap();
    let err = s3
        .get_object(&ObjectLocation::new("bucket", "missing.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(ref what) if what == "bucket/missing.csv"));
}

#[tokio::test]
async fn test_s3_access_denied_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
        .mount(&server)
        .await;

    let s3 = S3::new(&server.uri()).unwrap();
    let err = s3
        .put_object(&ObjectLocation::new("bucket", "out.csv"), String::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api { status: 403, ref message } if message == "AccessDenied"));
}

#[tokio::test]
async fn test_create_endpoint_config_body() {
    let server = MockServer::start().await;
    sagemaker_call("CreateEndpointConfig")
        .and(body_json(json!({
            "EndpointConfigName": "my-endpoint-sagun",
            "ProductionVariants": [{
                "VariantName": "AllTraffic",
                "ModelName": "Custom-sklearn-model-2024-04-18-02-14-56",
                "InitialInstanceCount": 1,
                "InstanceType": "ml.t2.medium",
                "InitialVariantWeight": 1.0
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "EndpointConfigArn": "arn:aws:sagemaker:us-east-1:123456789012:endpoint-config/my-endpoint-sagun"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sagemaker = SageMaker::new(&server.uri()).unwrap();
    let variant = ProductionVariant {
        variant_name: "AllTraffic".into(),
        model_name: "Custom-sklearn-model-2024-04-18-02-14-56".into(),
        initial_instance_count: 1,
        instance_type: "ml.t2.medium".into(),
        initial_variant_weight: 1.0,
    };

    sagemaker
        .create_endpoint_config("my-endpoint-sagun", &[variant])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_describe_endpoint_maps_status() {
    let server = MockServer::start().await;
    sagemaker_call("DescribeEndpoint")
        .and(body_json(json!({ "EndpointName": "sagun-endpoint" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "EndpointName": "sagun-endpoint",
            "EndpointArn": "arn:aws:sagemaker:us-east-1:123456789012:endpoint/sagun-endpoint",
            "EndpointConfigName": "my-endpoint-sagun",
            "EndpointStatus": "Failed",
            "FailureReason": "Image not found",
            "CreationTime": 1713406496.0
        })))
        .mount(&server)
        .await;

    let sagemaker = SageMaker::new(&server.uri()).unwrap();
    let description = sagemaker.describe_endpoint("sagun-endpoint").await.unwrap();

    assert_eq!(description.status, EndpointStatus::Failed);
    assert_eq!(description.failure_reason.as_deref(), Some("Image not found"));
}

#[tokio::test]
async fn test_describe_missing_endpoint_is_not_found() {
    let server = MockServer::start().await;
    sagemaker_call("DescribeEndpoint")
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazonaws.sagemaker#ValidationException",
            "message": "Could not find endpoint \"sagun-endpoint\"."
        })))
        .mount(&server)
        .await;

    let sagemaker = SageMaker::new(&server.uri()).unwrap();
    let err = sagemaker.describe_endpoint("sagun-endpoint").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_control_plane_error_keeps_code_and_message() {
    let server = MockServer::start().await;
    sagemaker_call("CreateEndpoint")
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "ResourceLimitExceeded",
            "message": "The account-level service limit for ml.t2.medium is 0 Instances"
        })))
        .mount(&server)
        .await;

    let sagemaker = SageMaker::new(&server.uri()).unwrap();
    let err = sagemaker
        .create_endpoint("sagun-endpoint", "my-endpoint-sagun")
        .await
        .unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("ResourceLimitExceeded:"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let server = MockServer::start().await;
    sagemaker_call("DeleteEndpoint")
        .and(body_json(json!({ "EndpointName": "sagun-endpoint" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    sagemaker_call("DeleteEndpointConfig")
        .and(body_json(json!({ "EndpointConfigName": "my-endpoint-sagun" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let sagemaker = SageMaker::new(&server.uri()).unwrap();
    sagemaker.delete_endpoint("sagun-endpoint").await.unwrap();
    sagemaker
        .delete_endpoint_config("my-endpoint-sagun")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_runtime_invocation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/endpoints/sagun-endpoint/invocations"))
        .and(header("Content-Type", "text/csv"))
        .and(body_string("13162\n10735\n"))
        .respond_with(ResponseTemplate::new(200).set_body_string("100\n110\n"))
        .expect(1)
        .mount(&server)
        .await;

    let runtime = SageMakerRuntime::new(&server.uri()).unwrap();
    let body = runtime
        .invoke_endpoint("sagun-endpoint", "text/csv", "13162\n10735\n".to_string())
        .await
        .unwrap();

    assert_eq!(body, "100\n110\n");
}

#[tokio::test]
async fn test_full_job_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/sagunprojectbucket/sagemaker/calorie_prediction/predictions/full_dataset.csv",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(ACTIVITY_CSV))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sagunprojectbucket/calorie-predictions"))
        .and(body_string(
            "Steps,Prediction_calories\n13162,100\n10735,110\n8506,95\n11398,120\n12522,130\n",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    sagemaker_call("CreateEndpointConfig")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "EndpointConfigArn": "arn:aws:sagemaker:us-east-1:123456789012:endpoint-config/my-endpoint-sagun"
        })))
        .expect(1)
        .mount(&server)
        .await;
    sagemaker_call("CreateEndpoint")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "EndpointArn": "arn:aws:sagemaker:us-east-1:123456789012:endpoint/sagun-endpoint"
        })))
        .expect(1)
        .mount(&server)
        .await;
    sagemaker_call("DescribeEndpoint")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "EndpointName": "sagun-endpoint",
            "EndpointStatus": "InService"
        })))
        .mount(&server)
        .await;
    sagemaker_call("DeleteEndpoint")
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    sagemaker_call("DeleteEndpointConfig")
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/endpoints/sagun-endpoint/invocations"))
        .and(body_string("13162\n10735\n8506\n11398\n12522\n"))
        .respond_with(ResponseTemplate::new(200).set_body_string("100\n110\n95\n120\n130\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = job_config();
    config.services.s3 = Some(server.uri());
    config.services.sagemaker = Some(server.uri());
    config.services.runtime = Some(server.uri());

    let report = BatchInference::from_config(config)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.rows, 5);
}
