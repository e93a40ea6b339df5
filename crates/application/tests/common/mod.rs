#![allow(dead_code)]

use portal_application::{
    BackgroundTasks, JobDataRef, JobServices, JobSettings, JobSubmissionRequest, ProjectServices,
};
use portal_domain::{AlgorithmOptions, AlgorithmType, JobType, LocalSite, RemoteSite};
use portal_infrastructure::{MemoryStore, Repositories};
use portal_testing_utils::{MockBrokerClient, MockJobRunner};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 单个站点的测试环境：内存存储 + 记录调用的代理与执行引擎
pub struct SiteHarness {
    pub repos: Repositories,
    pub broker: MockBrokerClient,
    pub runner: MockJobRunner,
    pub tasks: BackgroundTasks,
}

impl SiteHarness {
    pub fn new() -> Self {
        Self {
            repos: Repositories::in_memory(&MemoryStore::new()),
            broker: MockBrokerClient::new(),
            runner: MockJobRunner::new(),
            tasks: BackgroundTasks::new(),
        }
    }

    pub fn job_services(&self) -> JobServices {
        JobServices {
            jobs: self.repos.jobs.clone(),
            participants: self.repos.job_participants.clone(),
            projects: self.repos.projects.clone(),
            broker: Arc::new(self.broker.clone()),
            runner: Arc::new(self.runner.clone()),
            tasks: self.tasks.clone(),
            settings: JobSettings {
                auto_approval_delay: Duration::from_millis(10),
                monitor_interval: Duration::from_millis(10),
            },
        }
    }

    pub fn project_services(&self) -> ProjectServices {
        ProjectServices {
            projects: self.repos.projects.clone(),
            participants: self.repos.project_participants.clone(),
            invitations: self.repos.project_invitations.clone(),
            data: self.repos.project_data.clone(),
            broker: Arc::new(self.broker.clone()),
        }
    }
}

pub fn data_ref(site: &LocalSite) -> JobDataRef {
    JobDataRef {
        site_uuid: site.uuid,
        site_name: site.name.clone(),
        site_party_id: site.party_id,
        data_uuid: Uuid::new_v4(),
        table_name: format!("{}_tbl", site.name),
        table_namespace: "ns".to_string(),
        label_name: "y".to_string(),
    }
}

pub fn remote_site(site: &LocalSite) -> RemoteSite {
    RemoteSite {
        uuid: site.uuid,
        name: site.name.clone(),
        description: site.description.clone(),
        party_id: site.party_id,
    }
}

pub fn submission(
    job_type: JobType,
    algorithm_type: Option<AlgorithmType>,
    initiator: &LocalSite,
    others: &[&LocalSite],
) -> JobSubmissionRequest {
    JobSubmissionRequest {
        name: "test_job".to_string(),
        description: String::new(),
        project_uuid: Uuid::new_v4(),
        job_type,
        algorithm_type,
        options: AlgorithmOptions::default(),
        initiator_data: data_ref(initiator),
        other_data: others.iter().map(|site| data_ref(site)).collect(),
        conf_json: String::new(),
        dsl_json: String::new(),
    }
}
