mod common;

use common::SiteHarness;
use portal_application::ReconciliationService;
use portal_domain::{
    JobParticipantRole, JobParticipantStatus, JobStatus, LocalSite, Project,
    ProjectParticipantStatus, ProjectStatus, ProjectType, RemoteProject,
};
use portal_testing_utils::{
    connected, disconnected, project_participant, test_site, JobBuilder, JobParticipantBuilder,
    ProjectBuilder,
};

fn remote_project(
    project: &Project,
    status: ProjectStatus,
    participant_status: ProjectParticipantStatus,
) -> RemoteProject {
    RemoteProject {
        uuid: project.uuid,
        name: project.name.clone(),
        description: project.description.clone(),
        auto_approval_enabled: project.auto_approval_enabled,
        managing_site_uuid: project.managing_site_uuid,
        managing_site_name: project.managing_site_name.clone(),
        managing_site_party_id: project.managing_site_party_id,
        status,
        participant_status,
    }
}

fn service(harness: &SiteHarness) -> ReconciliationService {
    ReconciliationService::new(harness.project_services(), harness.job_services())
}

async fn seed_joined_project(harness: &SiteHarness, manager: &LocalSite) -> anyhow::Result<Project> {
    let project = ProjectBuilder::new(manager)
        .with_type(ProjectType::Remote)
        .with_status(ProjectStatus::Joined)
        .build();
    harness.repos.projects.create(&project).await?;
    harness
        .repos
        .project_participants
        .create(&project_participant(
            project.uuid,
            manager,
            ProjectParticipantStatus::Owner,
        ))
        .await?;
    Ok(project)
}

#[tokio::test]
async fn test_sync_all_reconciles_project_list() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let manager = test_site("manager", 9999);
    let site = test_site("guest", 10000);
    let ctx = connected(&site);

    let unknown = ProjectBuilder::new(&manager)
        .with_type(ProjectType::Remote)
        .with_status(ProjectStatus::Joined)
        .build();
    let dismissed = seed_joined_project(&harness, &manager).await?;
    let vanished = seed_joined_project(&harness, &manager).await?;
    let stale_member = test_site("stale", 10001);
    harness
        .repos
        .project_participants
        .create(&project_participant(
            dismissed.uuid,
            &stale_member,
            ProjectParticipantStatus::Joined,
        ))
        .await?;

    harness.broker.set_projects(vec![
        remote_project(&unknown, ProjectStatus::Managed, ProjectParticipantStatus::Joined),
        remote_project(&dismissed, ProjectStatus::Managed, ProjectParticipantStatus::Dismissed),
    ]);

    let report = service(&harness).sync_all(&ctx).await?;
    assert_eq!(report.failures, 0);
    assert_eq!(report.projects_synced, 3);

    let created = harness.repos.projects.get_by_uuid(unknown.uuid).await?;
    assert_eq!(created.project_type, ProjectType::Remote);
    assert_eq!(created.status, ProjectStatus::Joined);
    let owner = harness
        .repos
        .project_participants
        .get_by_project_and_site(unknown.uuid, manager.uuid)
        .await?;
    assert_eq!(owner.status, ProjectParticipantStatus::Owner);

    let corrected = harness.repos.projects.get_by_uuid(dismissed.uuid).await?;
    assert_eq!(corrected.status, ProjectStatus::Dismissed);
    let gone = harness.repos.projects.get_by_uuid(vanished.uuid).await?;
    assert_eq!(gone.status, ProjectStatus::Dismissed);

    // 代理没有报告的参与方被置为 Dismissed，所有者记录保持不变
    let member = harness
        .repos
        .project_participants
        .get_by_project_and_site(dismissed.uuid, stale_member.uuid)
        .await?;
    assert_eq!(member.status, ProjectParticipantStatus::Dismissed);
    let owner = harness
        .repos
        .project_participants
        .get_by_project_and_site(dismissed.uuid, manager.uuid)
        .await?;
    assert_eq!(owner.status, ProjectParticipantStatus::Owner);
    Ok(())
}

#[tokio::test]
async fn test_sync_all_requires_broker() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let site = test_site("guest", 10000);
    assert!(service(&harness).sync_all(&disconnected(&site)).await.is_err());
    assert!(harness.broker.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sync_all_continues_after_project_failure() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let manager = test_site("manager", 9999);
    let site = test_site("guest", 10000);
    seed_joined_project(&harness, &manager).await?;
    harness.broker.fail_on("list_project_participants");

    let report = service(&harness).sync_all(&connected(&site)).await?;
    assert_eq!(report.failures, 1);
    assert_eq!(report.projects_synced, 1);
    Ok(())
}

#[tokio::test]
async fn test_refresh_running_jobs() -> anyhow::Result<()> {
    let harness = SiteHarness::new();
    let site = test_site("guest", 9999);
    let other = test_site("other", 10000);
    let ctx = connected(&site);

    let own_job = JobBuilder::new(&site)
        .with_status(JobStatus::Running)
        .with_fate_job_id("202401010000001")
        .build();
    harness.repos.jobs.create(&own_job).await?;
    harness
        .repos
        .job_participants
        .create(
            &JobParticipantBuilder::new(own_job.uuid, &site)
                .with_role(JobParticipantRole::Guest)
                .with_status(JobParticipantStatus::Approved)
                .build(),
        )
        .await?;

    let foreign_job = JobBuilder::new(&other)
        .with_status(JobStatus::Running)
        .with_fate_job_id("202401010000002")
        .build();
    harness.repos.jobs.create(&foreign_job).await?;
    harness
        .repos
        .job_participants
        .create(
            &JobParticipantBuilder::new(foreign_job.uuid, &other)
                .with_role(JobParticipantRole::Guest)
                .build(),
        )
        .await?;

    let report = service(&harness).refresh_running_jobs(&ctx).await?;
    assert_eq!(report.refreshed, 1);
    assert_eq!(report.finished, 1);
    assert_eq!(report.failures, 0);
    harness.tasks.wait_idle().await;

    let stored = harness.repos.jobs.get_by_uuid(own_job.uuid).await?;
    assert_eq!(stored.status, JobStatus::Succeeded);
    assert_eq!(stored.fate_job_status, "success");
    assert!(stored.result_json.contains("evaluation"));
    assert_eq!(
        harness.runner.queries(),
        vec![(
            "202401010000001".to_string(),
            JobParticipantRole::Guest,
            9999
        )]
    );

    let untouched = harness.repos.jobs.get_by_uuid(foreign_job.uuid).await?;
    assert_eq!(untouched.status, JobStatus::Running);
    Ok(())
}
