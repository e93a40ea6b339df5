use async_trait::async_trait;
use chrono::Utc;
use portal_domain::{
    Project, ProjectData, ProjectDataRepository, ProjectDataStatus, ProjectInvitation,
    ProjectInvitationRepository, ProjectInvitationStatus, ProjectParticipant,
    ProjectParticipantRepository, ProjectParticipantStatus, ProjectRepository, ProjectStatus,
    ProjectType,
};
use portal_errors::{PortalError, PortalResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database::mapping::MappingHelpers;

const PROJECT_COLUMNS: &str = "uuid, name, description, auto_approval_enabled, project_type, status, \
    managing_site_uuid, managing_site_name, managing_site_party_id, created_at, updated_at";

const PARTICIPANT_COLUMNS: &str = "uuid, project_uuid, site_uuid, site_name, site_party_id, \
    site_description, status, created_at, updated_at";

const INVITATION_COLUMNS: &str = "uuid, project_uuid, site_uuid, status, created_at, updated_at";

const DATA_COLUMNS: &str = "uuid, project_uuid, data_uuid, name, description, data_type, status, \
    site_uuid, site_name, site_party_id, table_name, table_namespace, created_at, updated_at";

fn invitation_not_found(uuid: Uuid) -> PortalError {
    PortalError::ProjectInvitationNotFound(uuid.to_string())
}

pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_project(row: &SqliteRow) -> PortalResult<Project> {
        Ok(Project {
            uuid: MappingHelpers::uuid(row, "uuid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            auto_approval_enabled: row.try_get("auto_approval_enabled")?,
            project_type: MappingHelpers::enum_value(row, "project_type")?,
            status: MappingHelpers::enum_value(row, "status")?,
            managing_site_uuid: MappingHelpers::uuid(row, "managing_site_uuid")?,
            managing_site_name: row.try_get("managing_site_name")?,
            managing_site_party_id: MappingHelpers::party_id(row, "managing_site_party_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    #[instrument(skip(self, project), fields(project_uuid = %project.uuid))]
    async fn create(&self, project: &Project) -> PortalResult<()> {
        sqlx::query(&format!(
            "INSERT INTO projects ({PROJECT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(project.uuid.to_string())
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.auto_approval_enabled)
        .bind(project.project_type.as_str())
        .bind(project.status.as_str())
        .bind(project.managing_site_uuid.to_string())
        .bind(&project.managing_site_name)
        .bind(MappingHelpers::party_id_param(project.managing_site_party_id)?)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("创建项目成功: {}", project.uuid);
        Ok(())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<Project> {
        let row = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE uuid = $1"
        ))
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_project(&row),
            None => Err(PortalError::project_not_found(uuid)),
        }
    }

    async fn list_all(&self) -> PortalResult<Vec<Project>> {
        let rows = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_project).collect()
    }

    async fn update_type(&self, uuid: Uuid, project_type: ProjectType) -> PortalResult<()> {
        let result =
            sqlx::query("UPDATE projects SET project_type = $2, updated_at = $3 WHERE uuid = $1")
                .bind(uuid.to_string())
                .bind(project_type.as_str())
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::project_not_found(uuid));
        }
        Ok(())
    }

    async fn update_status(&self, uuid: Uuid, status: ProjectStatus) -> PortalResult<()> {
        let result = sqlx::query("UPDATE projects SET status = $2, updated_at = $3 WHERE uuid = $1")
            .bind(uuid.to_string())
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::project_not_found(uuid));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_status_with_invitation(
        &self,
        uuid: Uuid,
        status: ProjectStatus,
        invitation_uuid: Uuid,
        invitation_status: ProjectInvitationStatus,
    ) -> PortalResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE projects SET status = $2, updated_at = $3 WHERE uuid = $1")
            .bind(uuid.to_string())
            .bind(status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PortalError::project_not_found(uuid));
        }

        let result = sqlx::query(
            "UPDATE project_invitations SET status = $2, updated_at = $3 WHERE uuid = $1",
        )
        .bind(invitation_uuid.to_string())
        .bind(invitation_status.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(invitation_not_found(invitation_uuid));
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn purge(&self, uuid: Uuid) -> PortalResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["project_data", "project_invitations", "project_participants"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE project_uuid = $1"))
                .bind(uuid.to_string())
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM projects WHERE uuid = $1")
            .bind(uuid.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("已清除项目及其关联记录: {}", uuid);
        Ok(())
    }
}

pub struct SqliteProjectParticipantRepository {
    pool: SqlitePool,
}

impl SqliteProjectParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_participant(row: &SqliteRow) -> PortalResult<ProjectParticipant> {
        Ok(ProjectParticipant {
            uuid: MappingHelpers::uuid(row, "uuid")?,
            project_uuid: MappingHelpers::uuid(row, "project_uuid")?,
            site_uuid: MappingHelpers::uuid(row, "site_uuid")?,
            site_name: row.try_get("site_name")?,
            site_party_id: MappingHelpers::party_id(row, "site_party_id")?,
            site_description: row.try_get("site_description")?,
            status: MappingHelpers::enum_value(row, "status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProjectParticipantRepository for SqliteProjectParticipantRepository {
    async fn create(&self, participant: &ProjectParticipant) -> PortalResult<()> {
        sqlx::query(&format!(
            "INSERT INTO project_participants ({PARTICIPANT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(participant.uuid.to_string())
        .bind(participant.project_uuid.to_string())
        .bind(participant.site_uuid.to_string())
        .bind(&participant.site_name)
        .bind(MappingHelpers::party_id_param(participant.site_party_id)?)
        .bind(&participant.site_description)
        .bind(participant.status.as_str())
        .bind(participant.created_at)
        .bind(participant.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_project_and_site(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<ProjectParticipant> {
        let row = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM project_participants WHERE project_uuid = $1 AND site_uuid = $2"
        ))
        .bind(project_uuid.to_string())
        .bind(site_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_participant(&row),
            None => Err(PortalError::ProjectParticipantNotFound {
                project_uuid,
                site_uuid,
            }),
        }
    }

    async fn list_by_project(&self, project_uuid: Uuid) -> PortalResult<Vec<ProjectParticipant>> {
        let rows = sqlx::query(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM project_participants WHERE project_uuid = $1 ORDER BY id"
        ))
        .bind(project_uuid.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_participant).collect()
    }

    async fn update_status(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
        status: ProjectParticipantStatus,
    ) -> PortalResult<()> {
        let result = sqlx::query(
            "UPDATE project_participants SET status = $3, updated_at = $4 WHERE project_uuid = $1 AND site_uuid = $2",
        )
        .bind(project_uuid.to_string())
        .bind(site_uuid.to_string())
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::ProjectParticipantNotFound {
                project_uuid,
                site_uuid,
            });
        }
        Ok(())
    }

    async fn delete_by_project(&self, project_uuid: Uuid) -> PortalResult<()> {
        sqlx::query("DELETE FROM project_participants WHERE project_uuid = $1")
            .bind(project_uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct SqliteProjectInvitationRepository {
    pool: SqlitePool,
}

impl SqliteProjectInvitationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_invitation(row: &SqliteRow) -> PortalResult<ProjectInvitation> {
        Ok(ProjectInvitation {
            uuid: MappingHelpers::uuid(row, "uuid")?,
            project_uuid: MappingHelpers::uuid(row, "project_uuid")?,
            site_uuid: MappingHelpers::uuid(row, "site_uuid")?,
            status: MappingHelpers::enum_value(row, "status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProjectInvitationRepository for SqliteProjectInvitationRepository {
    async fn create(&self, invitation: &ProjectInvitation) -> PortalResult<()> {
        sqlx::query(&format!(
            "INSERT INTO project_invitations ({INVITATION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(invitation.uuid.to_string())
        .bind(invitation.project_uuid.to_string())
        .bind(invitation.site_uuid.to_string())
        .bind(invitation.status.as_str())
        .bind(invitation.created_at)
        .bind(invitation.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<ProjectInvitation> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM project_invitations WHERE uuid = $1"
        ))
        .bind(uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_invitation(&row),
            None => Err(invitation_not_found(uuid)),
        }
    }

    async fn get_latest_by_project_and_site(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<ProjectInvitation> {
        let row = sqlx::query(&format!(
            "SELECT {INVITATION_COLUMNS} FROM project_invitations \
             WHERE project_uuid = $1 AND site_uuid = $2 ORDER BY id DESC LIMIT 1"
        ))
        .bind(project_uuid.to_string())
        .bind(site_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_invitation(&row),
            None => Err(PortalError::ProjectInvitationNotFound(format!(
                "project={project_uuid}, site={site_uuid}"
            ))),
        }
    }

    async fn update_status(
        &self,
        uuid: Uuid,
        status: ProjectInvitationStatus,
    ) -> PortalResult<()> {
        let result = sqlx::query(
            "UPDATE project_invitations SET status = $2, updated_at = $3 WHERE uuid = $1",
        )
        .bind(uuid.to_string())
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(invitation_not_found(uuid));
        }
        Ok(())
    }
}

pub struct SqliteProjectDataRepository {
    pool: SqlitePool,
}

impl SqliteProjectDataRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_data(row: &SqliteRow) -> PortalResult<ProjectData> {
        Ok(ProjectData {
            uuid: MappingHelpers::uuid(row, "uuid")?,
            project_uuid: MappingHelpers::uuid(row, "project_uuid")?,
            data_uuid: MappingHelpers::uuid(row, "data_uuid")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            data_type: MappingHelpers::enum_value(row, "data_type")?,
            status: MappingHelpers::enum_value(row, "status")?,
            site_uuid: MappingHelpers::uuid(row, "site_uuid")?,
            site_name: row.try_get("site_name")?,
            site_party_id: MappingHelpers::party_id(row, "site_party_id")?,
            table_name: row.try_get("table_name")?,
            table_namespace: row.try_get("table_namespace")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProjectDataRepository for SqliteProjectDataRepository {
    async fn create(&self, data: &ProjectData) -> PortalResult<()> {
        sqlx::query(&format!(
            "INSERT INTO project_data ({DATA_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(data.uuid.to_string())
        .bind(data.project_uuid.to_string())
        .bind(data.data_uuid.to_string())
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.data_type.as_str())
        .bind(data.status.as_str())
        .bind(data.site_uuid.to_string())
        .bind(&data.site_name)
        .bind(MappingHelpers::party_id_param(data.site_party_id)?)
        .bind(&data.table_name)
        .bind(&data.table_namespace)
        .bind(data.created_at)
        .bind(data.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_by_project_and_data(
        &self,
        project_uuid: Uuid,
        data_uuid: Uuid,
    ) -> PortalResult<ProjectData> {
        let row = sqlx::query(&format!(
            "SELECT {DATA_COLUMNS} FROM project_data WHERE project_uuid = $1 AND data_uuid = $2"
        ))
        .bind(project_uuid.to_string())
        .bind(data_uuid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_data(&row),
            None => Err(PortalError::ProjectDataNotFound {
                project_uuid,
                data_uuid,
            }),
        }
    }

    async fn list_by_project(&self, project_uuid: Uuid) -> PortalResult<Vec<ProjectData>> {
        let rows = sqlx::query(&format!(
            "SELECT {DATA_COLUMNS} FROM project_data WHERE project_uuid = $1 ORDER BY id"
        ))
        .bind(project_uuid.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_data).collect()
    }

    async fn update_status(
        &self,
        project_uuid: Uuid,
        data_uuid: Uuid,
        status: ProjectDataStatus,
    ) -> PortalResult<()> {
        let result = sqlx::query(
            "UPDATE project_data SET status = $3, updated_at = $4 WHERE project_uuid = $1 AND data_uuid = $2",
        )
        .bind(project_uuid.to_string())
        .bind(data_uuid.to_string())
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PortalError::ProjectDataNotFound {
                project_uuid,
                data_uuid,
            });
        }
        Ok(())
    }

    async fn delete_by_project(&self, project_uuid: Uuid) -> PortalResult<()> {
        sqlx::query("DELETE FROM project_data WHERE project_uuid = $1")
            .bind(project_uuid.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
