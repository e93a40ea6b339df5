use async_trait::async_trait;
use chrono::Utc;
use portal_domain::{
    Project, ProjectData, ProjectDataRepository, ProjectDataStatus, ProjectInvitation,
    ProjectInvitationRepository, ProjectInvitationStatus, ProjectParticipant,
    ProjectParticipantRepository, ProjectParticipantStatus, ProjectRepository, ProjectStatus,
    ProjectType,
};
use portal_errors::{PortalError, PortalResult};
use tracing::debug;
use uuid::Uuid;

use super::MemoryStore;

fn invitation_not_found(uuid: Uuid) -> PortalError {
    PortalError::ProjectInvitationNotFound(uuid.to_string())
}

pub struct MemoryProjectRepository {
    store: MemoryStore,
}

impl MemoryProjectRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn create(&self, project: &Project) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        if tables.projects.contains_key(&project.uuid) {
            return Err(PortalError::database_error(format!(
                "项目已存在: {}",
                project.uuid
            )));
        }
        tables.projects.insert(project.uuid, project.clone());
        Ok(())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<Project> {
        let tables = self.store.tables().read().await;
        tables
            .projects
            .get(&uuid)
            .cloned()
            .ok_or_else(|| PortalError::project_not_found(uuid))
    }

    async fn list_all(&self) -> PortalResult<Vec<Project>> {
        let tables = self.store.tables().read().await;
        Ok(tables.projects.values().cloned().collect())
    }

    async fn update_type(&self, uuid: Uuid, project_type: ProjectType) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let project = tables
            .projects
            .get_mut(&uuid)
            .ok_or_else(|| PortalError::project_not_found(uuid))?;
        project.project_type = project_type;
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, uuid: Uuid, status: ProjectStatus) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let project = tables
            .projects
            .get_mut(&uuid)
            .ok_or_else(|| PortalError::project_not_found(uuid))?;
        project.status = status;
        project.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status_with_invitation(
        &self,
        uuid: Uuid,
        status: ProjectStatus,
        invitation_uuid: Uuid,
        invitation_status: ProjectInvitationStatus,
    ) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        if !tables.projects.contains_key(&uuid) {
            return Err(PortalError::project_not_found(uuid));
        }
        if !tables.project_invitations.contains_key(&invitation_uuid) {
            return Err(invitation_not_found(invitation_uuid));
        }

        let now = Utc::now();
        if let Some(project) = tables.projects.get_mut(&uuid) {
            project.status = status;
            project.updated_at = now;
        }
        if let Some(invitation) = tables.project_invitations.get_mut(&invitation_uuid) {
            invitation.status = invitation_status;
            invitation.updated_at = now;
        }
        Ok(())
    }

    async fn purge(&self, uuid: Uuid) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        tables.projects.shift_remove(&uuid);
        tables
            .project_participants
            .retain(|(project_uuid, _), _| *project_uuid != uuid);
        tables
            .project_invitations
            .retain(|_, invitation| invitation.project_uuid != uuid);
        tables
            .project_data
            .retain(|(project_uuid, _), _| *project_uuid != uuid);
        debug!("已清除项目及其关联记录: {}", uuid);
        Ok(())
    }
}

pub struct MemoryProjectParticipantRepository {
    store: MemoryStore,
}

impl MemoryProjectParticipantRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProjectParticipantRepository for MemoryProjectParticipantRepository {
    async fn create(&self, participant: &ProjectParticipant) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let key = (participant.project_uuid, participant.site_uuid);
        if tables.project_participants.contains_key(&key) {
            return Err(PortalError::database_error(format!(
                "项目参与方已存在: project={}, site={}",
                key.0, key.1
            )));
        }
        tables.project_participants.insert(key, participant.clone());
        Ok(())
    }

    async fn get_by_project_and_site(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<ProjectParticipant> {
        let tables = self.store.tables().read().await;
        tables
            .project_participants
            .get(&(project_uuid, site_uuid))
            .cloned()
            .ok_or(PortalError::ProjectParticipantNotFound {
                project_uuid,
                site_uuid,
            })
    }

    async fn list_by_project(&self, project_uuid: Uuid) -> PortalResult<Vec<ProjectParticipant>> {
        let tables = self.store.tables().read().await;
        Ok(tables
            .project_participants
            .values()
            .filter(|p| p.project_uuid == project_uuid)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
        status: ProjectParticipantStatus,
    ) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let participant = tables
            .project_participants
            .get_mut(&(project_uuid, site_uuid))
            .ok_or(PortalError::ProjectParticipantNotFound {
                project_uuid,
                site_uuid,
            })?;
        participant.status = status;
        participant.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_by_project(&self, project_uuid: Uuid) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        tables
            .project_participants
            .retain(|(uuid, _), _| *uuid != project_uuid);
        Ok(())
    }
}

pub struct MemoryProjectInvitationRepository {
    store: MemoryStore,
}

impl MemoryProjectInvitationRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProjectInvitationRepository for MemoryProjectInvitationRepository {
    async fn create(&self, invitation: &ProjectInvitation) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        if tables.project_invitations.contains_key(&invitation.uuid) {
            return Err(PortalError::database_error(format!(
                "项目邀请已存在: {}",
                invitation.uuid
            )));
        }
        tables
            .project_invitations
            .insert(invitation.uuid, invitation.clone());
        Ok(())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<ProjectInvitation> {
        let tables = self.store.tables().read().await;
        tables
            .project_invitations
            .get(&uuid)
            .cloned()
            .ok_or_else(|| invitation_not_found(uuid))
    }

    async fn get_latest_by_project_and_site(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<ProjectInvitation> {
        let tables = self.store.tables().read().await;
        tables
            .project_invitations
            .values()
            .rev()
            .find(|i| i.project_uuid == project_uuid && i.site_uuid == site_uuid)
            .cloned()
            .ok_or_else(|| {
                PortalError::ProjectInvitationNotFound(format!(
                    "project={project_uuid}, site={site_uuid}"
                ))
            })
    }

    async fn update_status(
        &self,
        uuid: Uuid,
        status: ProjectInvitationStatus,
    ) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let invitation = tables
            .project_invitations
            .get_mut(&uuid)
            .ok_or_else(|| invitation_not_found(uuid))?;
        invitation.status = status;
        invitation.updated_at = Utc::now();
        Ok(())
    }
}

pub struct MemoryProjectDataRepository {
    store: MemoryStore,
}

impl MemoryProjectDataRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProjectDataRepository for MemoryProjectDataRepository {
    async fn create(&self, data: &ProjectData) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let key = (data.project_uuid, data.data_uuid);
        if tables.project_data.contains_key(&key) {
            return Err(PortalError::database_error(format!(
                "项目数据关联已存在: project={}, data={}",
                key.0, key.1
            )));
        }
        tables.project_data.insert(key, data.clone());
        Ok(())
    }

    async fn get_by_project_and_data(
        &self,
        project_uuid: Uuid,
        data_uuid: Uuid,
    ) -> PortalResult<ProjectData> {
        let tables = self.store.tables().read().await;
        tables
            .project_data
            .get(&(project_uuid, data_uuid))
            .cloned()
            .ok_or(PortalError::ProjectDataNotFound {
                project_uuid,
                data_uuid,
            })
    }

    async fn list_by_project(&self, project_uuid: Uuid) -> PortalResult<Vec<ProjectData>> {
        let tables = self.store.tables().read().await;
        Ok(tables
            .project_data
            .values()
            .filter(|d| d.project_uuid == project_uuid)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        project_uuid: Uuid,
        data_uuid: Uuid,
        status: ProjectDataStatus,
    ) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        let data = tables
            .project_data
            .get_mut(&(project_uuid, data_uuid))
            .ok_or(PortalError::ProjectDataNotFound {
                project_uuid,
                data_uuid,
            })?;
        data.status = status;
        data.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_by_project(&self, project_uuid: Uuid) -> PortalResult<()> {
        let mut tables = self.store.tables().write().await;
        tables
            .project_data
            .retain(|(uuid, _), _| *uuid != project_uuid);
        Ok(())
    }
}
