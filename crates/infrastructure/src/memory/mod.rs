//! 内存仓储实现
//!
//! 所有表共享一把读写锁，多行写入（项目清理、项目与邀请状态联动）在同一次加锁内完成。
//! 适用于嵌入式运行与测试。

mod job;
mod project;

pub use job::{MemoryJobParticipantRepository, MemoryJobRepository};
pub use project::{
    MemoryProjectDataRepository, MemoryProjectInvitationRepository,
    MemoryProjectParticipantRepository, MemoryProjectRepository,
};

use indexmap::IndexMap;
use portal_domain::{Job, JobParticipant, Project, ProjectData, ProjectInvitation, ProjectParticipant};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub jobs: IndexMap<Uuid, Job>,
    /// (job_uuid, site_uuid)
    pub job_participants: IndexMap<(Uuid, Uuid), JobParticipant>,
    pub projects: IndexMap<Uuid, Project>,
    /// (project_uuid, site_uuid)
    pub project_participants: IndexMap<(Uuid, Uuid), ProjectParticipant>,
    pub project_invitations: IndexMap<Uuid, ProjectInvitation>,
    /// (project_uuid, data_uuid)
    pub project_data: IndexMap<(Uuid, Uuid), ProjectData>,
}

/// 内存存储，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tables(&self) -> &RwLock<Tables> {
        &self.tables
    }

    pub fn job_repository(&self) -> MemoryJobRepository {
        MemoryJobRepository::new(self.clone())
    }

    pub fn job_participant_repository(&self) -> MemoryJobParticipantRepository {
        MemoryJobParticipantRepository::new(self.clone())
    }

    pub fn project_repository(&self) -> MemoryProjectRepository {
        MemoryProjectRepository::new(self.clone())
    }

    pub fn project_participant_repository(&self) -> MemoryProjectParticipantRepository {
        MemoryProjectParticipantRepository::new(self.clone())
    }

    pub fn project_invitation_repository(&self) -> MemoryProjectInvitationRepository {
        MemoryProjectInvitationRepository::new(self.clone())
    }

    pub fn project_data_repository(&self) -> MemoryProjectDataRepository {
        MemoryProjectDataRepository::new(self.clone())
    }
}
