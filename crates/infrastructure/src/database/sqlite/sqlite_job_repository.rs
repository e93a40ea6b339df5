use async_trait::async_trait;
use chrono::Utc;
use portal_domain::{
    Job, JobEngineInfo, JobParticipant, JobParticipantRepository, JobParticipantStatus,
    JobRepository, JobStatus,
};
use portal_errors::{PortalError, PortalResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

const JOB_COLUMNS: &str = "uuid, name, description, project_uuid, job_type, algorithm_type, status, \
    initiating_site_uuid, initiating_site_name, initiating_site_party_id, request_json, conf, dsl, \
    fate_job_id, fate_job_status, fate_model_id, fate_model_version, result_json, \
    created_at, updated_at, finished_at";

const PARTICIPANT_COLUMNS: &str = "uuid, job_uuid, site_uuid, site_name, site_party_id, site_role, \
    data_uuid, data_table_name, data_table_namespace, data_label_name, status, created_at, updated_at";

pub struct SqliteJobRepository {
    pool: SqlitePool,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &SqliteRow) -> PortalResult<Job> {
        Ok(Job {
            uuid: MappingHelpers::uuid(row, "uuid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            project_uuid: MappingHelpers::uuid(row, "project_uuid")?,
            job_type: MappingHelpers::enum_value(row, "job_type")?,
            algorithm_type: MappingHelpers::optional_enum_value(row, "algorithm_type")?,
            status: MappingHelpers::enum_value(row, "status")?,
            initiating_site_uuid: MappingHelpers::uuid(row, "initiating_site_uuid")?,
            initiating_site_name: row.try_get("initiating_site_name")?,
            initiating_site_party_id: MappingHelpers::party_id(row, "initiating_site_party_id")?,
            request_json: row.try_get("request_json")?,
            conf: row.try_get("conf")?,
            dsl: row.try_get("dsl")?,
            fate_job_id: row.try_get("fate_job_id")?,
            fate_job_status: row.try_get("fate_job_status")?,
            fate_model_id: row.try_get("fate_model_id")?,
            fate_model_version: row.try_get("fate_model_version")?,
            result_json: row.try_get("result_json")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            finished_at: row.try_get("finished_at")?,
        })
    }

    fn ensure_updated(rows_affected: u64, uuid: Uuid) -> PortalResult<()> {
        if rows_affected == 0 {
            return Err(PortalError::job_not_found(uuid));
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    #[instrument(skip(self, job), fields(job_uuid = %job.uuid))]
    async fn create(&self, job: &Job) -> PortalResult<()> {
        sqlx::query(&format!(
            "INSERT INTO jobs ({JOB_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)"
        ))
        .bind(job.uuid.to_string())
        .bind(&job.name)
        .bind(&job.description)
        .bind(job.project_uuid.to_string())
        .bind(job.job_type.as_str())
        .bind(job.algorithm_type.map(|a| a.as_str()))
        .bind(job.status.as_str())
        .bind(job.initiating_site_uuid.to_string())
        .bind(&job.initiating_site_name)
        .bind(MappingHelpers::party_id_param(job.initiating_site_party_id)?)
        .bind(&job.request_json)
        .bind(&job.conf)
        .bind(&job.dsl)
        .bind(&job.fate_job_id)
        .bind(&job.fate_job_status)
        .bind(&job.fate_model_id)
        .bind(&job.fate_model_version)
        .bind(&job.result_json)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.finished_at)
        .execute(&self.pool)
        .await?;

        debug!("创建作业成功: {}", job.uuid);
        Ok(())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<Job> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE uuid = $1"))
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(PortalError::job_not_found(uuid)),
        }
    }

    async fn list_by_status(&self, status: JobStatus) -> PortalResult<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = $1 ORDER BY id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_job).collect()
    }

    #[instrument(skip(self))]
    async fn update_status(&self, uuid: Uuid, status: JobStatus) -> PortalResult<()> {
        let now = Utc::now();
        let finished_at = status.is_terminal().then_some(now);
        let result = sqlx::query(
            "UPDATE jobs SET status = $2, updated_at = $3, finished_at = COALESCE($4, finished_at) WHERE uuid = $1",
        )
        .bind(uuid.to_string())
        .bind(status.as_str())
        .bind(now)
        .bind(finished_at)
        .execute(&self.pool)
        .await?;

        Self::ensure_updated(result.rows_affected(), uuid)
    }

    #[instrument(skip(self))]
    async fn compare_and_update_status(
        &self,
        uuid: Uuid,
        expected: JobStatus,
        status: JobStatus,
    ) -> PortalResult<bool> {
        let now = Utc::now();
        let finished_at = status.is_terminal().then_some(now);
        let result = sqlx::query(
            "UPDATE jobs SET status = $3, updated_at = $4, finished_at = COALESCE($5, finished_at) \
             WHERE uuid = $1 AND status = $2",
        )
        .bind(uuid.to_string())
        .bind(expected.as_str())
        .bind(status.as_str())
        .bind(now)
        .bind(finished_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // 区分“状态不符”与“作业不存在”
        self.get_by_uuid(uuid).await?;
        Ok(false)
    }

    async fn update_engine_info(&self, uuid: Uuid, info: &JobEngineInfo) -> PortalResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET fate_job_id = $2, fate_job_status = $3, fate_model_id = $4, \
             fate_model_version = $5, updated_at = $6 WHERE uuid = $1",
        )
        .bind(uuid.to_string())
        .bind(&info.fate_job_id)
        .bind(&info.fate_job_status)
        .bind(&info.fate_model_id)
        .bind(&info.fate_model_version)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Self::ensure_updated(result.rows_affected(), uuid)
    }

    async fn update_result_info(&self, uuid: Uuid, result_json: &str) -> PortalResult<()> {
        let result =
            sqlx::query("UPDATE jobs SET result_json = $2, updated_at = $3 WHERE uuid = $1")
                .bind(uuid.to_string())
                .bind(result_json)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        Self::ensure_updated(result.rows_affected(), uuid)
    }
}

pub struct SqliteJobParticipantRepository {
    pool: SqlitePool,
}

impl SqliteJobParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_participant(row: &SqliteRow) -> PortalResult<JobParticipant> {
        Ok(JobParticipant {
            uuid: MappingHelpers::uuid(row, "uuid")?,
            job_uuid: MappingHelpers::uuid(row, "job_uuid")?,
            site_uuid: MappingHelpers::uuid(row, "site_uuid")?,
            site_name: row.try_get("site_name")?,
            site_party_id: MappingHelpers::party_id(row, "site_party_id")?,
            site_role: MappingHelpers::enum_value(row, "site_role")?,
            data_uuid: MappingHelpers::uuid(row, "data_uuid")?,
            data_table_name: row.try_get("data_table_name")?,
            data_table_namespace: row.try_get("data_table_namespace")?,
            data_label_name: row.try_get("data_label_name")?,
            status: MappingHelpers::enum_value(row, "status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl JobParticipantRepository for SqliteJobParticipantRepository {
    #[instrument(skip(self, participant), fields(job_uuid = %participant.job_uuid, site_uuid = %participant.site_uuid))]
    async fn create(&self, participant: &JobParticipant) -> PortalResult<()> {
        sqlx::query(&format!(
            "INSERT INTO job_participants ({PARTICIPANT_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(participant.uuid.to_string())
        .bind(participant.job_uuid.to_string())
        .bind(participant.site_uuid.to_string())
        .bind(&participant.site_name)
        .bind(MappingHelpers::party_id_param(participant.site_party_id)?)
        .bind(participant.site_role.as_str())
        .bind(participant.data_uuid.to_string())
        .bind(&participant.data_table_name)
        .bind(&participant.data_table_namespace)
        .bind(&participant.data_label_name)
        .bind(participant.status.as_str())
        .bind(participant.created_at)
        .bind(participant.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_job_and_site(
        &self,
        job_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<JobParticipant> {
        let row = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM job_participants WHERE job_uuid = $1 AND site_uuid = $2"
        ))
        .bind(job_uuid.to_string())
        .bind(site_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_participant(&row),
            None => Err(PortalError::JobParticipantNotFound {
                job_uuid,
                site_uuid,
            }),
        }
    }

    async fn list_by_job(&self, job_uuid: Uuid) -> PortalResult<Vec<JobParticipant>> {
        let rows = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM job_participants WHERE job_uuid = $1 ORDER BY id"
        ))
        .bind(job_uuid.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_participant).collect()
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        job_uuid: Uuid,
        site_uuid: Uuid,
        status: JobParticipantStatus,
    ) -> PortalResult<()> {
        let result = sqlx::query(
            "UPDATE job_participants SET status = $3, updated_at = $4 WHERE job_uuid = $1 AND site_uuid = $2",
        )
        .bind(job_uuid.to_string())
        .bind(site_uuid.to_string())
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::JobParticipantNotFound {
                job_uuid,
                site_uuid,
            });
        }
        Ok(())
    }
}
