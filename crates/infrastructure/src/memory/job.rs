use async_trait::async_trait;
use chrono::Utc;
use portal_domain::{
    Job, JobEngineInfo, JobParticipant, JobParticipantRepository, JobParticipantStatus,
    JobRepository, JobStatus,
};
use portal_errors::{PortalError, PortalResult};
use tracing::debug;
use uuid::Uuid;

use super::MemoryStore;

pub struct MemoryJobRepository {
    store: MemoryStore,
}

impl MemoryJobRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn create(&self, job: &Job) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        if tables.jobs.contains_key(&job.uuid) {
            return Err(PortalError::database_error(format!("作业已存在: {}", job.uuid)));
        }
        tables.jobs.insert(job.uuid, job.clone());
        debug!("创建作业: {}", job.uuid);
        Ok(())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<Job> {
        let tables = self.store.tables().read().await;
        tables
            .jobs
            .get(&uuid)
            .cloned()
            .ok_or_else(|| PortalError::job_not_found(uuid))
    }

    async fn list_by_status(&self, status: JobStatus) -> PortalResult<Vec<Job>> {
        let tables = self.store.tables().read().await;
        Ok(tables
            .jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect())
    }

    async fn update_status(&self, uuid: Uuid, status: JobStatus) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let job = tables
            .jobs
            .get_mut(&uuid)
            .ok_or_else(|| PortalError::job_not_found(uuid))?;
        let now = Utc::now();
        job.status = status;
        job.updated_at = now;
        if status.is_terminal() {
            job.finished_at = Some(now);
        }
        Ok(())
    }

    async fn compare_and_update_status(
        &self,
        uuid: Uuid,
        expected: JobStatus,
        status: JobStatus,
    ) -> PortalResult<bool> {
        let mut tables = self.store.tables().write().await;
        let job = tables
            .jobs
            .get_mut(&uuid)
            .ok_or_else(|| PortalError::job_not_found(uuid))?;
        if job.status != expected {
            return Ok(false);
        }
        let now = Utc::now();
        job.status = status;
        job.updated_at = now;
        if status.is_terminal() {
            job.finished_at = Some(now);
        }
        Ok(true)
    }

    async fn update_engine_info(&self, uuid: Uuid, info: &JobEngineInfo) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let job = tables
            .jobs
            .get_mut(&uuid)
            .ok_or_else(|| PortalError::job_not_found(uuid))?;
        job.fate_job_id = info.fate_job_id.clone();
        job.fate_job_status = info.fate_job_status.clone();
        job.fate_model_id = info.fate_model_id.clone();
        job.fate_model_version = info.fate_model_version.clone();
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update_result_info(&self, uuid: Uuid, result_json: &str) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let job = tables
            .jobs
            .get_mut(&uuid)
            .ok_or_else(|| PortalError::job_not_found(uuid))?;
        job.result_json = result_json.to_string();
        job.updated_at = Utc::now();
        Ok(())
    }
}

pub struct MemoryJobParticipantRepository {
    store: MemoryStore,
}

impl MemoryJobParticipantRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobParticipantRepository for MemoryJobParticipantRepository {
    async fn create(&self, participant: &JobParticipant) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let key = (participant.job_uuid, participant.site_uuid);
        if tables.job_participants.contains_key(&key) {
            return Err(PortalError::database_error(format!(
                "作业参与方已存在: job={}, site={}",
                key.0, key.1
            )));
        }
        tables.job_participants.insert(key, participant.clone());
        Ok(())
    }

    async fn get_by_job_and_site(
        &self,
        job_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<JobParticipant> {
        let tables = self.store.tables().read().await;
        tables
            .job_participants
            .get(&(job_uuid, site_uuid))
            .cloned()
            .ok_or(PortalError::JobParticipantNotFound {
                job_uuid,
                site_uuid,
            })
    }

    async fn list_by_job(&self, job_uuid: Uuid) -> PortalResult<Vec<JobParticipant>> {
        let tables = self.store.tables().read().await;
        Ok(tables
            .job_participants
            .values()
            .filter(|p| p.job_uuid == job_uuid)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        job_uuid: Uuid,
        site_uuid: Uuid,
        status: JobParticipantStatus,
    ) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let participant = tables
            .job_participants
            .get_mut(&(job_uuid, site_uuid))
            .ok_or(PortalError::JobParticipantNotFound {
                job_uuid,
                site_uuid,
            })?;
        participant.status = status;
        participant.updated_at = Utc::now();
        Ok(())
    }
}
