use portal_domain::{
    JobParticipantRepository, JobRepository, ProjectDataRepository, ProjectInvitationRepository,
    ProjectParticipantRepository, ProjectRepository,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::database::{
    SqliteJobParticipantRepository, SqliteJobRepository, SqliteProjectDataRepository,
    SqliteProjectInvitationRepository, SqliteProjectParticipantRepository,
    SqliteProjectRepository,
};
use crate::memory::MemoryStore;

/// 一组共享同一存储后端的仓储
#[derive(Clone)]
pub struct Repositories {
    pub jobs: Arc<dyn JobRepository>,
    pub job_participants: Arc<dyn JobParticipantRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub project_participants: Arc<dyn ProjectParticipantRepository>,
    pub project_invitations: Arc<dyn ProjectInvitationRepository>,
    pub project_data: Arc<dyn ProjectDataRepository>,
}

impl Repositories {
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            jobs: Arc::new(SqliteJobRepository::new(pool.clone())),
            job_participants: Arc::new(SqliteJobParticipantRepository::new(pool.clone())),
            projects: Arc::new(SqliteProjectRepository::new(pool.clone())),
            project_participants: Arc::new(SqliteProjectParticipantRepository::new(pool.clone())),
            project_invitations: Arc::new(SqliteProjectInvitationRepository::new(pool.clone())),
            project_data: Arc::new(SqliteProjectDataRepository::new(pool)),
        }
    }

    pub fn in_memory(store: &MemoryStore) -> Self {
        Self {
            jobs: Arc::new(store.job_repository()),
            job_participants: Arc::new(store.job_participant_repository()),
            projects: Arc::new(store.project_repository()),
            project_participants: Arc::new(store.project_participant_repository()),
            project_invitations: Arc::new(store.project_invitation_repository()),
            project_data: Arc::new(store.project_data_repository()),
        }
    }
}
