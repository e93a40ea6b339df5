//! FML Manager（中心代理）客户端契约
//!
//! 站点之间不共享数据库，邀请、审批与状态事件都经由代理中转。
//! 这里只定义本系统对代理的调用契约，不涉及代理自身的存储与匹配逻辑。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use portal_errors::PortalResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::{
    AlgorithmType, JobParticipantRole, JobParticipantStatus, JobStatus, JobType,
    ProjectDataStatus, ProjectParticipantStatus, ProjectStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRegistration {
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub party_id: u64,
    pub external_host: String,
    pub external_port: u16,
    pub https: bool,
    pub last_connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSite {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub party_id: u64,
}

/// 项目中某一数据关联在代理侧的视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProjectData {
    pub data_uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub site_uuid: Uuid,
    pub site_name: String,
    pub site_party_id: u64,
    pub table_name: String,
    pub table_namespace: String,
    pub status: ProjectDataStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProjectParticipant {
    pub site_uuid: Uuid,
    pub site_name: String,
    pub site_party_id: u64,
    #[serde(default)]
    pub site_description: String,
    pub status: ProjectParticipantStatus,
}

/// `GET project?participant=` 返回的项目条目，附带查询站点在其中的参与状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub auto_approval_enabled: bool,
    pub managing_site_uuid: Uuid,
    pub managing_site_name: String,
    pub managing_site_party_id: u64,
    pub status: ProjectStatus,
    pub participant_status: ProjectParticipantStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInvitationRequest {
    pub uuid: Uuid,
    pub site_uuid: Uuid,
    pub site_party_id: u64,
    pub project_uuid: Uuid,
    pub project_name: String,
    pub project_description: String,
    pub project_auto_approval_enabled: bool,
    pub project_managing_site_uuid: Uuid,
    pub project_managing_site_name: String,
    pub project_managing_site_party_id: u64,
    /// 发出邀请时项目中已关联的数据快照
    pub associated_data: Vec<RemoteProjectData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDataDismissalRequest {
    pub site_uuid: Uuid,
    pub data_uuid_list: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJobParticipant {
    pub site_uuid: Uuid,
    pub site_name: String,
    pub site_party_id: u64,
    pub site_role: JobParticipantRole,
    pub data_uuid: Uuid,
    pub data_table_name: String,
    pub data_table_namespace: String,
    #[serde(default)]
    pub data_label_name: String,
    pub status: JobParticipantStatus,
}

/// 发起方经代理扇出给各参与方的作业创建请求，conf/dsl 原样复制
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJobCreationRequest {
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub project_uuid: Uuid,
    pub job_type: JobType,
    pub algorithm_type: Option<AlgorithmType>,
    pub initiating_site_uuid: Uuid,
    pub initiating_site_name: String,
    pub initiating_site_party_id: u64,
    pub request_json: String,
    pub conf_json: String,
    pub dsl_json: String,
    /// 全部参与方（含发起方），顺序即规范的 host 顺序
    pub participants: Vec<RemoteJobParticipant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApprovalResponse {
    pub site_uuid: Uuid,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub status: JobStatus,
    #[serde(default)]
    pub fate_job_id: String,
    #[serde(default)]
    pub fate_job_status: String,
    #[serde(default)]
    pub fate_model_id: String,
    #[serde(default)]
    pub fate_model_version: String,
    pub participant_status_map: IndexMap<Uuid, JobParticipantStatus>,
}

/// FML Manager 客户端抽象
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn register_site(&self, site: &SiteRegistration) -> PortalResult<()>;
    async fn unregister_site(&self, site_uuid: Uuid) -> PortalResult<()>;
    async fn list_sites(&self) -> PortalResult<Vec<RemoteSite>>;

    async fn send_invitation(&self, request: &ProjectInvitationRequest) -> PortalResult<()>;
    async fn accept_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()>;
    async fn reject_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()>;
    async fn revoke_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()>;

    async fn close_project(&self, project_uuid: Uuid) -> PortalResult<()>;
    async fn leave_project(&self, project_uuid: Uuid, site_uuid: Uuid) -> PortalResult<()>;
    async fn dismiss_participant(&self, project_uuid: Uuid, site_uuid: Uuid) -> PortalResult<()>;

    async fn associate_data(
        &self,
        project_uuid: Uuid,
        data: &[RemoteProjectData],
    ) -> PortalResult<()>;
    async fn dismiss_data(
        &self,
        project_uuid: Uuid,
        request: &ProjectDataDismissalRequest,
    ) -> PortalResult<()>;

    async fn list_projects(&self, participant: Uuid) -> PortalResult<HashMap<Uuid, RemoteProject>>;
    async fn list_project_data(
        &self,
        project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectData>>;
    async fn list_project_participants(
        &self,
        project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectParticipant>>;

    async fn create_job(&self, request: &RemoteJobCreationRequest) -> PortalResult<()>;
    async fn send_job_response(
        &self,
        job_uuid: Uuid,
        response: &JobApprovalResponse,
    ) -> PortalResult<()>;
    async fn send_job_status(&self, job_uuid: Uuid, update: &JobStatusUpdate) -> PortalResult<()>;
}
