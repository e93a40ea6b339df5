mod common;

use common::{submission, SiteHarness};
use portal_application::JobAggregate;
use portal_domain::{
    AlgorithmType, JobParticipantRole, JobParticipantStatus, JobStatus, JobType, ModelRef,
    PortalError, ProjectType, RemoteJobCreationRequest,
};
use portal_testing_utils::{
    connected, disconnected, test_site, BrokerCall, JobBuilder, JobParticipantBuilder,
    MockBrokerClient, ProjectBuilder,
};

fn created_job(broker: &MockBrokerClient) -> RemoteJobCreationRequest {
    broker
        .calls()
        .into_iter()
        .find_map(|call| match call {
            BrokerCall::CreateJob(request) => Some(request),
            _ => None,
        })
        .expect("create_job should have been sent")
}

#[tokio::test]
async fn test_single_party_homo_training_is_rejected() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[]);

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    let err = job.submit_job(&connected(&guest)).await.unwrap_err();
    assert!(err.is_validation());

    let stored = harness.repos.jobs.get_by_uuid(job.job.uuid).await;
    assert!(stored.unwrap_err().is_not_found());
    assert_eq!(harness.runner.submission_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_single_party_psi_is_rejected() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let request = submission(JobType::Psi, None, &guest, &[]);

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    let err = job.submit_job(&connected(&guest)).await.unwrap_err();
    assert!(matches!(err, PortalError::ValidationError(_)));
    assert_eq!(harness.runner.submission_count(), 0);
    assert!(harness.broker.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_single_party_predicting_runs_to_completion() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let mut request = submission(JobType::Predicting, Some(AlgorithmType::HomoLr), &guest, &[]);
    request.options.predicting_model = Some(ModelRef {
        model_id: "model-1".to_string(),
        model_version: "version-1".to_string(),
    });
    let ctx = disconnected(&guest);

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    job.submit_job(&ctx).await?;
    assert_eq!(job.job.status, JobStatus::Running);
    assert_eq!(harness.runner.submission_count(), 1);

    harness.tasks.wait_idle().await;

    let stored = harness.repos.jobs.get_by_uuid(job.job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Succeeded);
    assert_eq!(stored.fate_job_id, "20240101000000000001");
    assert!(stored.result_json.contains("\"count\":100"));
    assert_eq!(
        harness.runner.result_queries()[0],
        (
            stored.fate_job_id.clone(),
            JobParticipantRole::Guest,
            9999,
            "HomoLR_0".to_string()
        )
    );

    let job = JobAggregate::load(harness.job_services(), stored.uuid).await?;
    let download = job.get_data_result_download_request(&ctx)?;
    assert_eq!(download.body["party_id"], 9999);
    assert_eq!(download.body["component_name"], "HomoLR_0");
    assert_eq!(download.body["role"], "guest");
    Ok(())
}

#[tokio::test]
async fn test_job_with_peers_waits_for_every_approval() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host_a = test_site("host_a", 10000);
    let host_b = test_site("host_b", 10001);
    let ctx = connected(&guest);
    let request = submission(
        JobType::Training,
        Some(AlgorithmType::HomoLr),
        &guest,
        &[&host_a, &host_b],
    );

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    job.submit_job(&ctx).await?;
    let job_uuid = job.job.uuid;

    let created = created_job(&harness.broker);
    let sites: Vec<_> = created.participants.iter().map(|p| p.site_uuid).collect();
    assert_eq!(sites, vec![guest.uuid, host_a.uuid, host_b.uuid]);
    assert!(created
        .conf_json
        .contains(r#""role":{"guest":["9999"],"host":["10000","10001"],"arbiter":["10000"]}"#));
    assert!(created.dsl_json.contains("HomoLR_0"));

    job.handle_job_approval_response(&ctx, host_a.uuid, true).await?;
    harness.tasks.wait_idle().await;
    assert_eq!(harness.runner.submission_count(), 0);
    let stored = harness.repos.jobs.get_by_uuid(job_uuid).await?;
    assert_eq!(stored.status, JobStatus::Pending);

    job.handle_job_approval_response(&ctx, host_b.uuid, true).await?;
    harness.tasks.wait_idle().await;
    assert_eq!(harness.runner.submission_count(), 1);

    let stored = harness.repos.jobs.get_by_uuid(job_uuid).await?;
    assert_eq!(stored.status, JobStatus::Succeeded);

    let updates = harness.broker.job_status_updates(job_uuid);
    assert_eq!(updates.first().map(|u| u.status), Some(JobStatus::Running));
    assert_eq!(updates.last().map(|u| u.status), Some(JobStatus::Succeeded));
    assert!(updates[0]
        .participant_status_map
        .values()
        .all(|status| *status == JobParticipantStatus::Approved));
    Ok(())
}

#[tokio::test]
async fn test_participant_rejection_prevents_engine_submission() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let ctx = connected(&guest);
    let request = submission(JobType::Training, Some(AlgorithmType::HeteroLr), &guest, &[&host]);

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    job.submit_job(&ctx).await?;
    job.handle_job_approval_response(&ctx, host.uuid, false).await?;
    harness.tasks.wait_idle().await;

    let stored = harness.repos.jobs.get_by_uuid(job.job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Rejected);
    let row = harness
        .repos
        .job_participants
        .get_by_job_and_site(job.job.uuid, host.uuid)
        .await?;
    assert_eq!(row.status, JobParticipantStatus::Rejected);
    assert_eq!(harness.runner.submission_count(), 0);

    let updates = harness.broker.job_status_updates(job.job.uuid);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, JobStatus::Rejected);
    Ok(())
}

#[tokio::test]
async fn test_submission_with_peers_requires_broker() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    let err = job.submit_job(&disconnected(&guest)).await.unwrap_err();
    assert!(matches!(err, PortalError::BrokerNotConnected));
    assert!(harness.repos.jobs.get_by_uuid(job.job.uuid).await.is_err());
    assert!(harness.broker.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_only_initiator_can_submit() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    let err = job.submit_job(&connected(&host)).await.unwrap_err();
    assert!(matches!(err, PortalError::Permission(_)));
    Ok(())
}

#[tokio::test]
async fn test_broker_failure_marks_job_deleted() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    harness.broker.fail_on("create_job");
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    let err = job.submit_job(&connected(&guest)).await.unwrap_err();
    assert!(matches!(err, PortalError::Remote { .. }));

    let stored = harness.repos.jobs.get_by_uuid(job.job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Deleted);
    let rows = harness.repos.job_participants.list_by_job(job.job.uuid).await?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_engine_failure_on_direct_submission_marks_job_deleted() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    harness.runner.fail_submit(true);
    let mut request = submission(JobType::Predicting, Some(AlgorithmType::HomoSbt), &guest, &[]);
    request.options.predicting_model = Some(ModelRef {
        model_id: "m".to_string(),
        model_version: "v".to_string(),
    });

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    assert!(job.submit_job(&connected(&guest)).await.is_err());
    let stored = harness.repos.jobs.get_by_uuid(job.job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Deleted);
    Ok(())
}

#[tokio::test]
async fn test_host_order_follows_submission_order() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let first = test_site("first", 3);
    let second = test_site("second", 2);
    let request = submission(
        JobType::Training,
        Some(AlgorithmType::HeteroLr),
        &guest,
        &[&first, &second],
    );

    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    job.submit_job(&connected(&guest)).await?;
    assert!(job.job.conf.contains(r#""host":["3","2"]"#));
    assert!(job.job.conf.contains(r#""arbiter":["3"]"#));

    let reloaded = JobAggregate::load(harness.job_services(), job.job.uuid).await?;
    assert_eq!(reloaded.host_order, vec![first.uuid, second.uuid]);
    Ok(())
}

#[tokio::test]
async fn test_remote_job_creation_is_idempotent() -> anyhow::Result<()> {
    let initiator_site = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(initiator_site.job_services(), request)?;
    job.submit_job(&connected(&guest)).await?;
    let remote_request = created_job(&initiator_site.broker);

    let host_site = SiteHarness::new();
    let ctx = connected(&host);
    let first =
        JobAggregate::handle_remote_job_creation(host_site.job_services(), &ctx, remote_request.clone())
            .await?;
    let rows_after_first = host_site.repos.job_participants.list_by_job(first.job.uuid).await?;

    let second =
        JobAggregate::handle_remote_job_creation(host_site.job_services(), &ctx, remote_request)
            .await?;
    let rows_after_second = host_site.repos.job_participants.list_by_job(second.job.uuid).await?;
    host_site.tasks.wait_idle().await;

    assert_eq!(rows_after_first, rows_after_second);
    assert_eq!(rows_after_second.len(), 2);
    assert_eq!(second.job.status, JobStatus::Pending);
    assert_eq!(second.job.conf, job.job.conf);
    assert_eq!(second.job.dsl, job.job.dsl);
    assert_eq!(second.host_order, vec![host.uuid]);
    assert!(host_site.broker.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_remote_job_is_auto_approved_when_project_allows() -> anyhow::Result<()> {
    let initiator_site = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(initiator_site.job_services(), request)?;
    job.submit_job(&connected(&guest)).await?;
    let remote_request = created_job(&initiator_site.broker);

    let host_site = SiteHarness::new();
    let project = ProjectBuilder::new(&guest)
        .with_uuid(remote_request.project_uuid)
        .with_type(ProjectType::Remote)
        .with_auto_approval(true)
        .build();
    host_site.repos.projects.create(&project).await?;

    let ctx = connected(&host);
    JobAggregate::handle_remote_job_creation(host_site.job_services(), &ctx, remote_request)
        .await?;
    host_site.tasks.wait_idle().await;

    let row = host_site
        .repos
        .job_participants
        .get_by_job_and_site(job.job.uuid, host.uuid)
        .await?;
    assert_eq!(row.status, JobParticipantStatus::Approved);
    assert!(host_site.broker.calls().iter().any(|call| matches!(
        call,
        BrokerCall::SendJobResponse { response, .. } if response.approved && response.site_uuid == host.uuid
    )));
    Ok(())
}

#[tokio::test]
async fn test_peer_rejection_marks_job_rejected() -> anyhow::Result<()> {
    let initiator_site = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(initiator_site.job_services(), request)?;
    job.submit_job(&connected(&guest)).await?;

    let host_site = SiteHarness::new();
    let mut remote = JobAggregate::handle_remote_job_creation(
        host_site.job_services(),
        &connected(&host),
        created_job(&initiator_site.broker),
    )
    .await?;

    let err = remote.reject_job(&disconnected(&host)).await.unwrap_err();
    assert!(matches!(err, PortalError::BrokerNotConnected));

    remote.reject_job(&connected(&host)).await?;
    assert_eq!(remote.job.status, JobStatus::Rejected);
    let stored = host_site.repos.jobs.get_by_uuid(job.job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Rejected);

    let err = remote.approve_job(&connected(&host)).await.unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)));
    Ok(())
}

#[tokio::test]
async fn test_status_update_on_peer_extracts_own_results() -> anyhow::Result<()> {
    let initiator_site = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let guest_ctx = connected(&guest);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(initiator_site.job_services(), request)?;
    job.submit_job(&guest_ctx).await?;

    let host_site = SiteHarness::new();
    let host_ctx = connected(&host);
    let mut remote = JobAggregate::handle_remote_job_creation(
        host_site.job_services(),
        &host_ctx,
        created_job(&initiator_site.broker),
    )
    .await?;
    remote.approve_job(&host_ctx).await?;

    job.handle_job_approval_response(&guest_ctx, host.uuid, true).await?;
    initiator_site.tasks.wait_idle().await;

    let updates = initiator_site.broker.job_status_updates(job.job.uuid);
    for update in updates {
        remote.handle_job_status_update(&host_ctx, update).await?;
    }
    host_site.tasks.wait_idle().await;

    let stored = host_site.repos.jobs.get_by_uuid(job.job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Succeeded);
    assert_eq!(stored.fate_job_id, "20240101000000000001");
    assert!(stored.result_json.contains("evaluation"));
    assert!(host_site.runner.queries().is_empty());
    assert_eq!(
        host_site.runner.result_queries(),
        vec![(
            stored.fate_job_id.clone(),
            JobParticipantRole::Host,
            10000,
            "evaluation_0".to_string()
        )]
    );
    Ok(())
}

#[tokio::test]
async fn test_out_of_order_status_updates_do_not_regress_peer() -> anyhow::Result<()> {
    let initiator_site = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let guest_ctx = connected(&guest);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(initiator_site.job_services(), request)?;
    job.submit_job(&guest_ctx).await?;

    let host_site = SiteHarness::new();
    let host_ctx = connected(&host);
    let mut remote = JobAggregate::handle_remote_job_creation(
        host_site.job_services(),
        &host_ctx,
        created_job(&initiator_site.broker),
    )
    .await?;
    remote.approve_job(&host_ctx).await?;

    job.handle_job_approval_response(&guest_ctx, host.uuid, true).await?;
    initiator_site.tasks.wait_idle().await;

    let mut updates = initiator_site.broker.job_status_updates(job.job.uuid);
    let statuses: Vec<_> = updates.iter().map(|u| u.status).collect();
    assert_eq!(statuses, vec![JobStatus::Running, JobStatus::Succeeded]);
    updates.reverse();
    for update in updates {
        remote.handle_job_status_update(&host_ctx, update).await?;
    }
    host_site.tasks.wait_idle().await;

    let stored = host_site.repos.jobs.get_by_uuid(job.job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Succeeded);
    assert_eq!(remote.job.status, JobStatus::Succeeded);
    let guest_row = host_site
        .repos
        .job_participants
        .get_by_job_and_site(job.job.uuid, guest.uuid)
        .await?;
    assert_eq!(guest_row.status, JobParticipantStatus::Approved);
    // 结果只提取一次
    assert_eq!(host_site.runner.result_queries().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_rejection_after_submission_is_refused() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let ctx = connected(&guest);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    job.submit_job(&ctx).await?;
    let job_uuid = job.job.uuid;

    job.handle_job_approval_response(&ctx, host.uuid, true).await?;
    harness.tasks.wait_idle().await;
    assert_eq!(harness.runner.submission_count(), 1);
    let before = harness.repos.jobs.get_by_uuid(job_uuid).await?.status;
    assert_ne!(before, JobStatus::Pending);
    let broadcasts = harness.broker.job_status_updates(job_uuid).len();

    let err = job
        .handle_job_approval_response(&ctx, host.uuid, false)
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)));

    let stored = harness.repos.jobs.get_by_uuid(job_uuid).await?;
    assert_eq!(stored.status, before);
    let row = harness
        .repos
        .job_participants
        .get_by_job_and_site(job_uuid, host.uuid)
        .await?;
    assert_eq!(row.status, JobParticipantStatus::Approved);
    assert_eq!(harness.broker.job_status_updates(job_uuid).len(), broadcasts);
    Ok(())
}

#[tokio::test]
async fn test_load_tolerates_unreadable_submission_request() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let mut stored = JobBuilder::new(&guest)
        .with_status(JobStatus::Running)
        .with_fate_job_id("20240101000000000042")
        .build();
    stored.request_json = "{not json".to_string();
    harness.repos.jobs.create(&stored).await?;
    harness
        .repos
        .job_participants
        .create(
            &JobParticipantBuilder::new(stored.uuid, &guest)
                .with_status(JobParticipantStatus::Approved)
                .build(),
        )
        .await?;

    let mut job = JobAggregate::load(harness.job_services(), stored.uuid).await?;
    assert_eq!(job.initiator.site_uuid, guest.uuid);
    assert!(job.participants.is_empty());

    let status = job.refresh_job(&connected(&guest)).await?;
    assert_eq!(status, JobStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_completion_checks_submit_once() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let ctx = connected(&guest);
    let request = submission(JobType::Training, Some(AlgorithmType::HomoLr), &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    job.submit_job(&ctx).await?;
    harness
        .repos
        .job_participants
        .update_status(job.job.uuid, host.uuid, JobParticipantStatus::Approved)
        .await?;

    let (first, second) = tokio::join!(
        JobAggregate::check_pending_participant_status(harness.job_services(), &ctx, job.job.uuid),
        JobAggregate::check_pending_participant_status(harness.job_services(), &ctx, job.job.uuid),
    );
    first?;
    second?;
    harness.tasks.wait_idle().await;

    assert_eq!(harness.runner.submission_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_download_request_requires_finished_predicting_or_psi() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let guest = test_site("guest", 9999);
    let host = test_site("host", 10000);
    let ctx = connected(&guest);

    let request = submission(JobType::Psi, None, &guest, &[&host]);
    let mut job = JobAggregate::from_submission_request(harness.job_services(), request)?;
    job.submit_job(&ctx).await?;
    let err = job.get_data_result_download_request(&ctx).unwrap_err();
    assert!(matches!(err, PortalError::InvalidState(_)));

    job.job.status = JobStatus::Succeeded;
    let download = job.get_data_result_download_request(&ctx)?;
    assert_eq!(download.body["component_name"], "intersection_0");

    job.job.job_type = JobType::Training;
    assert!(job.get_data_result_download_request(&ctx).is_err());
    Ok(())
}
