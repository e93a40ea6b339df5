//! 领域仓储抽象
//!
//! 每个实体一个类型化仓储。查询未命中统一返回对应的 `*NotFound` 错误，
//! 调用方通过 `PortalError::is_not_found` 选择创建或更新路径。
//! 更新方法只写单个状态字段，避免覆盖并发写入的其他字段。

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{
    Job, JobEngineInfo, JobParticipant, JobParticipantStatus, JobStatus, Project, ProjectData,
    ProjectDataStatus, ProjectInvitation, ProjectInvitationStatus, ProjectParticipant,
    ProjectParticipantStatus, ProjectStatus, ProjectType,
};
use portal_errors::PortalResult;

/// 作业仓储抽象
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> PortalResult<()>;
    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<Job>;
    async fn list_by_status(&self, status: JobStatus) -> PortalResult<Vec<Job>>;
    async fn update_status(&self, uuid: Uuid, status: JobStatus) -> PortalResult<()>;
    /// 仅当当前状态等于 `expected` 时写入，返回是否写入成功
    async fn compare_and_update_status(
        &self,
        uuid: Uuid,
        expected: JobStatus,
        status: JobStatus,
    ) -> PortalResult<bool>;
    async fn update_engine_info(&self, uuid: Uuid, info: &JobEngineInfo) -> PortalResult<()>;
    async fn update_result_info(&self, uuid: Uuid, result_json: &str) -> PortalResult<()>;
}

/// 作业参与方仓储抽象
#[async_trait]
pub trait JobParticipantRepository: Send + Sync {
    async fn create(&self, participant: &JobParticipant) -> PortalResult<()>;
    async fn get_by_job_and_site(
        &self,
        job_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<JobParticipant>;
    /// 按创建顺序返回
    async fn list_by_job(&self, job_uuid: Uuid) -> PortalResult<Vec<JobParticipant>>;
    async fn update_status(
        &self,
        job_uuid: Uuid,
        site_uuid: Uuid,
        status: JobParticipantStatus,
    ) -> PortalResult<()>;
}

/// 项目仓储抽象
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> PortalResult<()>;
    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<Project>;
    async fn list_all(&self) -> PortalResult<Vec<Project>>;
    async fn update_type(&self, uuid: Uuid, project_type: ProjectType) -> PortalResult<()>;
    async fn update_status(&self, uuid: Uuid, status: ProjectStatus) -> PortalResult<()>;
    /// 项目状态与邀请状态作为一个逻辑单元写入
    async fn update_status_with_invitation(
        &self,
        uuid: Uuid,
        status: ProjectStatus,
        invitation_uuid: Uuid,
        invitation_status: ProjectInvitationStatus,
    ) -> PortalResult<()>;
    /// 删除项目及其全部参与方、邀请与数据关联
    async fn purge(&self, uuid: Uuid) -> PortalResult<()>;
}

/// 项目参与方仓储抽象
#[async_trait]
pub trait ProjectParticipantRepository: Send + Sync {
    async fn create(&self, participant: &ProjectParticipant) -> PortalResult<()>;
    async fn get_by_project_and_site(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<ProjectParticipant>;
    async fn list_by_project(&self, project_uuid: Uuid) -> PortalResult<Vec<ProjectParticipant>>;
    async fn update_status(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
        status: ProjectParticipantStatus,
    ) -> PortalResult<()>;
    async fn delete_by_project(&self, project_uuid: Uuid) -> PortalResult<()>;
}

/// 项目邀请仓储抽象
#[async_trait]
pub trait ProjectInvitationRepository: Send + Sync {
    async fn create(&self, invitation: &ProjectInvitation) -> PortalResult<()>;
    async fn get_by_uuid(&self, uuid: Uuid) -> PortalResult<ProjectInvitation>;
    /// 同一项目、同一站点的最新一条邀请
    async fn get_latest_by_project_and_site(
        &self,
        project_uuid: Uuid,
        site_uuid: Uuid,
    ) -> PortalResult<ProjectInvitation>;
    async fn update_status(&self, uuid: Uuid, status: ProjectInvitationStatus)
        -> PortalResult<()>;
}

/// 项目数据关联仓储抽象
#[async_trait]
pub trait ProjectDataRepository: Send + Sync {
    async fn create(&self, data: &ProjectData) -> PortalResult<()>;
    async fn get_by_project_and_data(
        &self,
        project_uuid: Uuid,
        data_uuid: Uuid,
    ) -> PortalResult<ProjectData>;
    async fn list_by_project(&self, project_uuid: Uuid) -> PortalResult<Vec<ProjectData>>;
    async fn update_status(
        &self,
        project_uuid: Uuid,
        data_uuid: Uuid,
        status: ProjectDataStatus,
    ) -> PortalResult<()>;
    async fn delete_by_project(&self, project_uuid: Uuid) -> PortalResult<()>;
}
