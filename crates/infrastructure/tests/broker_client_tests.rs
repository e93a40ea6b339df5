mod common;

use common::FakeServer;
use indexmap::IndexMap;
use portal_domain::{
    BrokerClient, JobApprovalResponse, JobParticipantStatus, JobStatus, JobStatusUpdate,
    ProjectDataDismissalRequest, ProjectParticipantStatus,
};
use portal_errors::PortalError;
use portal_infrastructure::BrokerHttpClient;
use uuid::Uuid;

const OK: &str = r#"{"code":0,"message":"success","data":null}"#;

async fn client_for(server: &FakeServer) -> BrokerHttpClient {
    let endpoint = server.start().await;
    BrokerHttpClient::new(endpoint, 5).unwrap()
}

#[tokio::test]
async fn test_invitation_lifecycle_paths() {
    let server = FakeServer::new(OK);
    let client = client_for(&server).await;
    let invitation = Uuid::new_v4();

    client.accept_invitation(invitation).await.unwrap();
    client.reject_invitation(invitation).await.unwrap();
    client.revoke_invitation(invitation).await.unwrap();

    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            format!("/api/v1/project/invitation/{invitation}/accept"),
            format!("/api/v1/project/invitation/{invitation}/reject"),
            format!("/api/v1/project/invitation/{invitation}/revoke"),
        ]
    );
    assert!(server.requests().iter().all(|r| r.method == "POST"));
}

#[tokio::test]
async fn test_participant_and_data_paths() {
    let server = FakeServer::new(OK);
    let client = client_for(&server).await;
    let project = Uuid::new_v4();
    let site = Uuid::new_v4();
    let data = Uuid::new_v4();

    client.leave_project(project, site).await.unwrap();
    client.dismiss_participant(project, site).await.unwrap();
    client
        .dismiss_data(
            project,
            &ProjectDataDismissalRequest {
                site_uuid: site,
                data_uuid_list: vec![data],
            },
        )
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(
        requests[0].path,
        format!("/api/v1/project/{project}/participant/{site}/leave")
    );
    assert_eq!(
        requests[1].path,
        format!("/api/v1/project/{project}/participant/{site}/dismiss")
    );
    assert_eq!(requests[2].path, format!("/api/v1/project/{project}/data/dismiss"));
    let body: serde_json::Value = serde_json::from_str(&requests[2].body).unwrap();
    assert_eq!(body["data_uuid_list"][0], data.to_string());
}

#[tokio::test]
async fn test_job_status_body() {
    let server = FakeServer::new(OK);
    let client = client_for(&server).await;
    let job = Uuid::new_v4();
    let site = Uuid::new_v4();

    let mut participant_status_map = IndexMap::new();
    participant_status_map.insert(site, JobParticipantStatus::Approved);
    client
        .send_job_status(
            job,
            &JobStatusUpdate {
                status: JobStatus::Running,
                fate_job_id: "202401".to_string(),
                fate_job_status: "running".to_string(),
                fate_model_id: String::new(),
                fate_model_version: String::new(),
                participant_status_map,
            },
        )
        .await
        .unwrap();
    client
        .send_job_response(
            job,
            &JobApprovalResponse {
                site_uuid: site,
                approved: true,
            },
        )
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].path, format!("/api/v1/job/{job}/status"));
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["status"], "running");
    assert_eq!(body["participant_status_map"][site.to_string()], "approved");
    assert_eq!(requests[1].path, format!("/api/v1/job/{job}/response"));
}

#[tokio::test]
async fn test_non_zero_code_is_failure_with_body() {
    let server = FakeServer::new(OK);
    let project = Uuid::new_v4();
    let failure = r#"{"code":10001,"message":"project not found","data":null}"#;
    server.respond(&format!("/api/v1/project/{project}/close"), 200, failure);
    let client = client_for(&server).await;

    let err = client.close_project(project).await.unwrap_err();
    match err {
        PortalError::Remote { message, body, .. } => {
            assert!(message.contains("10001"));
            assert_eq!(body, failure);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_is_failure_with_body() {
    let server = FakeServer::new(OK);
    server.respond("/api/v1/job/create", 502, "bad gateway");
    let client = client_for(&server).await;
    let job = Uuid::new_v4();

    let request = portal_domain::RemoteJobCreationRequest {
        uuid: job,
        name: "job".to_string(),
        description: String::new(),
        project_uuid: Uuid::new_v4(),
        job_type: portal_domain::JobType::Psi,
        algorithm_type: None,
        initiating_site_uuid: Uuid::new_v4(),
        initiating_site_name: "guest".to_string(),
        initiating_site_party_id: 9999,
        request_json: "{}".to_string(),
        conf_json: "{}".to_string(),
        dsl_json: "{}".to_string(),
        participants: Vec::new(),
    };
    let err = client.create_job(&request).await.unwrap_err();
    match err {
        PortalError::Remote { message, body, .. } => {
            assert!(message.contains("502"));
            assert_eq!(body, "bad gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_broker_is_network_error() {
    let client = BrokerHttpClient::new("http://127.0.0.1:1", 2).unwrap();
    let err = client.close_project(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PortalError::Network(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_reconciliation_reads_decode_maps() {
    let server = FakeServer::new(OK);
    let project = Uuid::new_v4();
    let site = Uuid::new_v4();
    let participants = serde_json::json!({
        "code": 0,
        "message": "success",
        "data": {
            site.to_string(): {
                "site_uuid": site,
                "site_name": "host",
                "site_party_id": 10000,
                "site_description": "",
                "status": "joined"
            }
        }
    });
    server.respond(
        &format!("/api/v1/project/{project}/participant"),
        200,
        &participants.to_string(),
    );
    let client = client_for(&server).await;

    let remote = client.list_project_participants(project).await.unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[&site].status, ProjectParticipantStatus::Joined);

    // data 为 null 时视为空集合
    let data = client.list_project_data(project).await.unwrap();
    assert!(data.is_empty());

    client.list_projects(site).await.unwrap();
    let last = server.last_request();
    assert_eq!(last.path, "/api/v1/project");
    assert_eq!(last.query, Some(format!("participant={site}")));
}
