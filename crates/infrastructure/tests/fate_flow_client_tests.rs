mod common;

use common::FakeServer;
use portal_domain::{EngineJobStatus, JobParticipantRole, JobRunner};
use portal_errors::PortalError;
use portal_infrastructure::FateFlowClient;

#[tokio::test]
async fn test_submit_job_reads_job_and_model_ids() {
    let server = FakeServer::new(r#"{"retcode":0,"retmsg":"success"}"#);
    server.respond(
        "/v1/job/submit",
        200,
        r#"{"retcode":0,"retmsg":"success","jobId":"202401010000001","data":{"model_info":{"model_id":"guest-9999#model","model_version":"202401010000001"}}}"#,
    );
    let client = FateFlowClient::new(server.start().await, 5).unwrap();

    let submission = client
        .submit_job(r#"{"dsl_version":2}"#, r#"{"components":{}}"#)
        .await
        .unwrap();
    assert_eq!(submission.job_id, "202401010000001");
    assert_eq!(submission.model_id, "guest-9999#model");
    assert_eq!(submission.model_version, "202401010000001");

    let body: serde_json::Value = serde_json::from_str(&server.last_request().body).unwrap();
    assert_eq!(body["job_runtime_conf"]["dsl_version"], 2);
    assert!(body["job_dsl"]["components"].is_object());
}

#[tokio::test]
async fn test_query_job_maps_status() {
    let server = FakeServer::new(r#"{"retcode":0,"retmsg":"success"}"#);
    server.respond(
        "/v1/job/query",
        200,
        r#"{"retcode":0,"retmsg":"success","data":[{"f_job_id":"202401","f_status":"success"}]}"#,
    );
    let client = FateFlowClient::new(server.start().await, 5).unwrap();

    let info = client
        .query_job("202401", JobParticipantRole::Guest, 9999)
        .await
        .unwrap();
    assert_eq!(info.status, EngineJobStatus::Success);
    assert_eq!(info.raw_status, "success");

    let body: serde_json::Value = serde_json::from_str(&server.last_request().body).unwrap();
    assert_eq!(body["role"], "guest");
    assert_eq!(body["party_id"], 9999);
}

#[tokio::test]
async fn test_non_zero_retcode_is_remote_error() {
    let server = FakeServer::new(r#"{"retcode":100,"retmsg":"no found job"}"#);
    let client = FateFlowClient::new(server.start().await, 5).unwrap();

    let err = client
        .component_metrics("202401", JobParticipantRole::Host, 10000, "evaluation_0")
        .await
        .unwrap_err();
    match err {
        PortalError::Remote { service, message, .. } => {
            assert_eq!(service, "FATE-Flow");
            assert!(message.contains("no found job"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(server.last_request().path, "/v1/tracking/component/metric/all");
}
