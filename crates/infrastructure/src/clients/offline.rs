//! 未配置 FML Manager 时使用的代理客户端，所有调用都返回 `BrokerNotConnected`

use async_trait::async_trait;
use portal_domain::{
    BrokerClient, JobApprovalResponse, JobStatusUpdate, ProjectDataDismissalRequest,
    ProjectInvitationRequest, RemoteJobCreationRequest, RemoteProject, RemoteProjectData,
    RemoteProjectParticipant, RemoteSite, SiteRegistration,
};
use portal_errors::{PortalError, PortalResult};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBrokerClient;

#[async_trait]
impl BrokerClient for OfflineBrokerClient {
    async fn register_site(&self, _site: &SiteRegistration) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn unregister_site(&self, _site_uuid: Uuid) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn list_sites(&self) -> PortalResult<Vec<RemoteSite>> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn send_invitation(&self, _request: &ProjectInvitationRequest) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn accept_invitation(&self, _invitation_uuid: Uuid) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn reject_invitation(&self, _invitation_uuid: Uuid) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn revoke_invitation(&self, _invitation_uuid: Uuid) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn close_project(&self, _project_uuid: Uuid) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn leave_project(&self, _project_uuid: Uuid, _site_uuid: Uuid) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn dismiss_participant(&self, _project_uuid: Uuid, _site_uuid: Uuid) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn associate_data(
        &self,
        _project_uuid: Uuid,
        _data: &[RemoteProjectData],
    ) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn dismiss_data(
        &self,
        _project_uuid: Uuid,
        _request: &ProjectDataDismissalRequest,
    ) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn list_projects(&self, _participant: Uuid) -> PortalResult<HashMap<Uuid, RemoteProject>> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn list_project_data(
        &self,
        _project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectData>> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn list_project_participants(
        &self,
        _project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectParticipant>> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn create_job(&self, _request: &RemoteJobCreationRequest) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn send_job_response(
        &self,
        _job_uuid: Uuid,
        _response: &JobApprovalResponse,
    ) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }

    async fn send_job_status(&self, _job_uuid: Uuid, _update: &JobStatusUpdate) -> PortalResult<()> {
        Err(PortalError::BrokerNotConnected)
    }
}
