//! FML Manager HTTP 客户端
//!
//! 所有接口位于 `/api/v1/` 之下，响应统一包装为 `{code, message, data}`。
//! 非 2xx 状态或非零 `code` 都视为失败，并把响应体附在错误中便于排查。
//! 客户端不做重试。

use async_trait::async_trait;
use portal_config::BrokerConfig;
use portal_domain::{
    BrokerClient, JobApprovalResponse, JobStatusUpdate, ProjectDataDismissalRequest,
    ProjectInvitationRequest, RemoteJobCreationRequest, RemoteProject, RemoteProjectData,
    RemoteProjectParticipant, RemoteSite, SiteRegistration,
};
use portal_errors::{PortalError, PortalResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{build_http_client, join_url};

const SERVICE_NAME: &str = "FML Manager";

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub struct BrokerHttpClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl BrokerHttpClient {
    pub fn new(endpoint: impl Into<String>, timeout_seconds: u64) -> PortalResult<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            http_client: build_http_client(timeout_seconds)?,
        })
    }

    /// 未配置代理地址时返回 `None`
    pub fn from_config(config: &BrokerConfig) -> PortalResult<Option<Self>> {
        match config.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => {
                Ok(Some(Self::new(endpoint, config.request_timeout_seconds)?))
            }
            _ => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.endpoint, &format!("api/v1/{path}"))
    }

    async fn execute(&self, request: reqwest::RequestBuilder, action: &str) -> PortalResult<Envelope> {
        let response = request.send().await.map_err(|e| {
            warn!("连接 FML Manager 失败: {} - {}", action, e);
            PortalError::Network(format!("{action}: {e}"))
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!("FML Manager 返回错误状态: {} - HTTP {}", action, status);
            return Err(PortalError::remote(
                SERVICE_NAME,
                format!("{action}: HTTP {status}"),
                body,
            ));
        }

        let envelope: Envelope = serde_json::from_str(&body).map_err(|e| {
            PortalError::remote(SERVICE_NAME, format!("{action}: 无法解析响应 {e}"), body.clone())
        })?;
        if envelope.code != 0 {
            warn!(
                "FML Manager 返回业务错误: {} - code {} {}",
                action, envelope.code, envelope.message
            );
            return Err(PortalError::remote(
                SERVICE_NAME,
                format!("{action}: code {}, {}", envelope.code, envelope.message),
                body,
            ));
        }

        debug!("FML Manager 调用成功: {}", action);
        Ok(envelope)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B, action: &str) -> PortalResult<()> {
        let request = self.http_client.post(self.url(path)).json(body);
        self.execute(request, action).await.map(|_| ())
    }

    async fn post_empty(&self, path: &str, action: &str) -> PortalResult<()> {
        let request = self.http_client.post(self.url(path));
        self.execute(request, action).await.map(|_| ())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        action: &str,
    ) -> PortalResult<T> {
        let request = self.http_client.get(self.url(path)).query(query);
        let envelope = self.execute(request, action).await?;
        let data = if envelope.data.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            envelope.data
        };
        serde_json::from_value(data).map_err(|e| {
            PortalError::Serialization(format!("{action}: 解析响应数据失败: {e}"))
        })
    }
}

#[async_trait]
impl BrokerClient for BrokerHttpClient {
    #[instrument(skip(self, site), fields(site_uuid = %site.uuid))]
    async fn register_site(&self, site: &SiteRegistration) -> PortalResult<()> {
        self.post("site", site, "注册站点").await
    }

    #[instrument(skip(self))]
    async fn unregister_site(&self, site_uuid: Uuid) -> PortalResult<()> {
        let request = self.http_client.delete(self.url(&format!("site/{site_uuid}")));
        self.execute(request, "注销站点").await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn list_sites(&self) -> PortalResult<Vec<RemoteSite>> {
        let request = self.http_client.get(self.url("site"));
        let envelope = self.execute(request, "查询站点列表").await?;
        if envelope.data.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(envelope.data)
            .map_err(|e| PortalError::Serialization(format!("解析站点列表失败: {e}")))
    }

    #[instrument(skip(self, request), fields(invitation_uuid = %request.uuid, project_uuid = %request.project_uuid))]
    async fn send_invitation(&self, request: &ProjectInvitationRequest) -> PortalResult<()> {
        self.post("project/invitation", request, "发送项目邀请").await
    }

    #[instrument(skip(self))]
    async fn accept_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()> {
        self.post_empty(&format!("project/invitation/{invitation_uuid}/accept"), "接受项目邀请")
            .await
    }

    #[instrument(skip(self))]
    async fn reject_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()> {
        self.post_empty(&format!("project/invitation/{invitation_uuid}/reject"), "拒绝项目邀请")
            .await
    }

    #[instrument(skip(self))]
    async fn revoke_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()> {
        self.post_empty(&format!("project/invitation/{invitation_uuid}/revoke"), "撤销项目邀请")
            .await
    }

    #[instrument(skip(self))]
    async fn close_project(&self, project_uuid: Uuid) -> PortalResult<()> {
        self.post_empty(&format!("project/{project_uuid}/close"), "关闭项目")
            .await
    }

    #[instrument(skip(self))]
    async fn leave_project(&self, project_uuid: Uuid, site_uuid: Uuid) -> PortalResult<()> {
        self.post_empty(
            &format!("project/{project_uuid}/participant/{site_uuid}/leave"),
            "退出项目",
        )
        .await
    }

    #[instrument(skip(self))]
    async fn dismiss_participant(&self, project_uuid: Uuid, site_uuid: Uuid) -> PortalResult<()> {
        self.post_empty(
            &format!("project/{project_uuid}/participant/{site_uuid}/dismiss"),
            "移除项目参与方",
        )
        .await
    }

    #[instrument(skip(self, data), fields(count = data.len()))]
    async fn associate_data(
        &self,
        project_uuid: Uuid,
        data: &[RemoteProjectData],
    ) -> PortalResult<()> {
        self.post(&format!("project/{project_uuid}/data/associate"), data, "关联项目数据")
            .await
    }

    #[instrument(skip(self, request), fields(count = request.data_uuid_list.len()))]
    async fn dismiss_data(
        &self,
        project_uuid: Uuid,
        request: &ProjectDataDismissalRequest,
    ) -> PortalResult<()> {
        self.post(&format!("project/{project_uuid}/data/dismiss"), request, "取消项目数据关联")
            .await
    }

    #[instrument(skip(self))]
    async fn list_projects(&self, participant: Uuid) -> PortalResult<HashMap<Uuid, RemoteProject>> {
        self.get(
            "project",
            &[("participant", participant.to_string())],
            "查询站点参与的项目",
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_project_data(
        &self,
        project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectData>> {
        self.get(&format!("project/{project_uuid}/data"), &[], "查询项目数据")
            .await
    }

    #[instrument(skip(self))]
    async fn list_project_participants(
        &self,
        project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectParticipant>> {
        self.get(&format!("project/{project_uuid}/participant"), &[], "查询项目参与方")
            .await
    }

    #[instrument(skip(self, request), fields(job_uuid = %request.uuid))]
    async fn create_job(&self, request: &RemoteJobCreationRequest) -> PortalResult<()> {
        self.post("job/create", request, "创建作业").await
    }

    #[instrument(skip(self, response), fields(site_uuid = %response.site_uuid, approved = response.approved))]
    async fn send_job_response(
        &self,
        job_uuid: Uuid,
        response: &JobApprovalResponse,
    ) -> PortalResult<()> {
        self.post(&format!("job/{job_uuid}/response"), response, "发送作业审批结果")
            .await
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn send_job_status(&self, job_uuid: Uuid, update: &JobStatusUpdate) -> PortalResult<()> {
        self.post(&format!("job/{job_uuid}/status"), update, "同步作业状态")
            .await
    }
}
