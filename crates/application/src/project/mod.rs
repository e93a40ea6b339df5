//! 项目聚合：项目、参与方、邀请与数据关联
//!
//! 涉及其他站点的操作都先调用 FML Manager，成功后再提交本地写入；
//! 代理调用失败时本地状态落后于代理，由周期性对账修复。

mod aggregate;
mod inbound;
mod sync;

pub use aggregate::ProjectAggregate;
pub use sync::{sync_projects, SyncOutcome};

use portal_domain::{
    BrokerClient, ProjectData, ProjectDataRepository, ProjectInvitationRepository,
    ProjectParticipantRepository, ProjectRepository, RemoteProjectData,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 项目聚合依赖的仓储与代理客户端
#[derive(Clone)]
pub struct ProjectServices {
    pub projects: Arc<dyn ProjectRepository>,
    pub participants: Arc<dyn ProjectParticipantRepository>,
    pub invitations: Arc<dyn ProjectInvitationRepository>,
    pub data: Arc<dyn ProjectDataRepository>,
    pub broker: Arc<dyn BrokerClient>,
}

/// 待关联到项目的本地数据表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDataAssociation {
    pub data_uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub table_name: String,
    pub table_namespace: String,
}

pub(crate) fn to_remote_data(data: &ProjectData) -> RemoteProjectData {
    RemoteProjectData {
        data_uuid: data.data_uuid,
        name: data.name.clone(),
        description: data.description.clone(),
        site_uuid: data.site_uuid,
        site_name: data.site_name.clone(),
        site_party_id: data.site_party_id,
        table_name: data.table_name.clone(),
        table_namespace: data.table_namespace.clone(),
        status: data.status,
    }
}
