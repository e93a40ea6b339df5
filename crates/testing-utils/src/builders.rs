//! Test data builders with sensible defaults

use chrono::Utc;
use portal_domain::{
    AlgorithmType, Job, JobParticipant, JobParticipantRole, JobParticipantStatus, JobStatus,
    JobType, LocalSite, Project, ProjectData, ProjectDataStatus, ProjectDataType,
    ProjectParticipant, ProjectParticipantStatus, ProjectStatus, ProjectType, SiteContext,
};
use uuid::Uuid;

pub fn test_site(name: &str, party_id: u64) -> LocalSite {
    LocalSite {
        uuid: Uuid::new_v4(),
        name: name.to_string(),
        party_id,
        description: format!("{name} site"),
    }
}

pub fn connected(site: &LocalSite) -> SiteContext {
    SiteContext::new(site.clone(), true)
}

pub fn disconnected(site: &LocalSite) -> SiteContext {
    SiteContext::new(site.clone(), false)
}

/// Builder for Job entities
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(initiator: &LocalSite) -> Self {
        let now = Utc::now();
        Self {
            job: Job {
                uuid: Uuid::new_v4(),
                name: "test_job".to_string(),
                description: String::new(),
                project_uuid: Uuid::new_v4(),
                job_type: JobType::Training,
                algorithm_type: Some(AlgorithmType::HomoLr),
                status: JobStatus::Pending,
                initiating_site_uuid: initiator.uuid,
                initiating_site_name: initiator.name.clone(),
                initiating_site_party_id: initiator.party_id,
                request_json: String::new(),
                conf: String::new(),
                dsl: String::new(),
                fate_job_id: String::new(),
                fate_job_status: String::new(),
                fate_model_id: String::new(),
                fate_model_version: String::new(),
                result_json: String::new(),
                created_at: now,
                updated_at: now,
                finished_at: None,
            },
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.job.uuid = uuid;
        self
    }

    pub fn with_project(mut self, project_uuid: Uuid) -> Self {
        self.job.project_uuid = project_uuid;
        self
    }

    pub fn with_type(mut self, job_type: JobType, algorithm_type: Option<AlgorithmType>) -> Self {
        self.job.job_type = job_type;
        self.job.algorithm_type = algorithm_type;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_spec(mut self, conf: &str, dsl: &str) -> Self {
        self.job.conf = conf.to_string();
        self.job.dsl = dsl.to_string();
        self
    }

    pub fn with_fate_job_id(mut self, fate_job_id: &str) -> Self {
        self.job.fate_job_id = fate_job_id.to_string();
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

/// Builder for JobParticipant entities
pub struct JobParticipantBuilder {
    participant: JobParticipant,
}

impl JobParticipantBuilder {
    pub fn new(job_uuid: Uuid, site: &LocalSite) -> Self {
        let now = Utc::now();
        Self {
            participant: JobParticipant {
                uuid: Uuid::new_v4(),
                job_uuid,
                site_uuid: site.uuid,
                site_name: site.name.clone(),
                site_party_id: site.party_id,
                site_role: JobParticipantRole::Host,
                data_uuid: Uuid::new_v4(),
                data_table_name: format!("{}_tbl", site.name),
                data_table_namespace: "ns".to_string(),
                data_label_name: String::new(),
                status: JobParticipantStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_role(mut self, role: JobParticipantRole) -> Self {
        self.participant.site_role = role;
        self
    }

    pub fn with_status(mut self, status: JobParticipantStatus) -> Self {
        self.participant.status = status;
        self
    }

    pub fn build(self) -> JobParticipant {
        self.participant
    }
}

/// Builder for Project entities
pub struct ProjectBuilder {
    project: Project,
}

impl ProjectBuilder {
    pub fn new(managing_site: &LocalSite) -> Self {
        let now = Utc::now();
        Self {
            project: Project {
                uuid: Uuid::new_v4(),
                name: "test_project".to_string(),
                description: String::new(),
                auto_approval_enabled: false,
                project_type: ProjectType::Local,
                status: ProjectStatus::Managed,
                managing_site_uuid: managing_site.uuid,
                managing_site_name: managing_site.name.clone(),
                managing_site_party_id: managing_site.party_id,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.project.uuid = uuid;
        self
    }

    pub fn with_type(mut self, project_type: ProjectType) -> Self {
        self.project.project_type = project_type;
        self
    }

    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.project.status = status;
        self
    }

    pub fn with_auto_approval(mut self, enabled: bool) -> Self {
        self.project.auto_approval_enabled = enabled;
        self
    }

    pub fn build(self) -> Project {
        self.project
    }
}

pub fn project_participant(
    project_uuid: Uuid,
    site: &LocalSite,
    status: ProjectParticipantStatus,
) -> ProjectParticipant {
    let now = Utc::now();
    ProjectParticipant {
        uuid: Uuid::new_v4(),
        project_uuid,
        site_uuid: site.uuid,
        site_name: site.name.clone(),
        site_party_id: site.party_id,
        site_description: site.description.clone(),
        status,
        created_at: now,
        updated_at: now,
    }
}

pub fn project_data(
    project_uuid: Uuid,
    site: &LocalSite,
    data_type: ProjectDataType,
    status: ProjectDataStatus,
) -> ProjectData {
    let now = Utc::now();
    ProjectData {
        uuid: Uuid::new_v4(),
        project_uuid,
        data_uuid: Uuid::new_v4(),
        name: format!("{}_data", site.name),
        description: String::new(),
        data_type,
        status,
        site_uuid: site.uuid,
        site_name: site.name.clone(),
        site_party_id: site.party_id,
        table_name: format!("{}_tbl", site.name),
        table_namespace: "ns".to_string(),
        created_at: now,
        updated_at: now,
    }
}
