//! FATE-Flow 执行引擎客户端

use async_trait::async_trait;
use portal_config::EngineConfig;
use portal_domain::{
    DownloadRequest, EngineJobInfo, EngineJobStatus, EngineSubmission, JobParticipantRole,
    JobRunner,
};
use portal_errors::{PortalError, PortalResult};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::{build_http_client, join_url};

const SERVICE_NAME: &str = "FATE-Flow";

/// FATE-Flow 的响应包装 `{retcode, retmsg, ...}`
#[derive(Debug, Deserialize)]
struct FlowResponse {
    retcode: i64,
    #[serde(default)]
    retmsg: String,
    #[serde(default, rename = "jobId")]
    job_id: Option<String>,
    #[serde(default)]
    data: Value,
}

pub struct FateFlowClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl FateFlowClient {
    pub fn new(endpoint: impl Into<String>, timeout_seconds: u64) -> PortalResult<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            http_client: build_http_client(timeout_seconds)?,
        })
    }

    pub fn from_config(config: &EngineConfig) -> PortalResult<Self> {
        Self::new(config.endpoint.clone(), config.request_timeout_seconds)
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.endpoint, path)
    }

    async fn call(&self, path: &str, body: &Value, action: &str) -> PortalResult<FlowResponse> {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!("连接 FATE-Flow 失败: {} - {}", action, e);
                PortalError::Network(format!("{action}: {e}"))
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PortalError::remote(
                SERVICE_NAME,
                format!("{action}: HTTP {status}"),
                text,
            ));
        }

        let parsed: FlowResponse = serde_json::from_str(&text).map_err(|e| {
            PortalError::remote(SERVICE_NAME, format!("{action}: 无法解析响应 {e}"), text.clone())
        })?;
        if parsed.retcode != 0 {
            return Err(PortalError::remote(
                SERVICE_NAME,
                format!("{action}: retcode {}, {}", parsed.retcode, parsed.retmsg),
                text,
            ));
        }
        Ok(parsed)
    }

    fn component_body(job_id: &str, role: JobParticipantRole, party_id: u64, component: &str) -> Value {
        json!({
            "job_id": job_id,
            "role": role.as_str(),
            "party_id": party_id,
            "component_name": component,
        })
    }
}

#[async_trait]
impl JobRunner for FateFlowClient {
    #[instrument(skip(self, conf, dsl))]
    async fn submit_job(&self, conf: &str, dsl: &str) -> PortalResult<EngineSubmission> {
        let body = json!({
            "job_runtime_conf": serde_json::from_str::<Value>(conf)?,
            "job_dsl": serde_json::from_str::<Value>(dsl)?,
        });
        let response = self.call("v1/job/submit", &body, "提交作业").await?;

        let job_id = response
            .job_id
            .filter(|id| !id.is_empty())
            .or_else(|| response.data["job_id"].as_str().map(str::to_string))
            .ok_or_else(|| {
                PortalError::remote(SERVICE_NAME, "提交作业: 响应缺少 jobId", response.data.to_string())
            })?;
        let model_info = &response.data["model_info"];
        let submission = EngineSubmission {
            job_id,
            model_id: model_info["model_id"].as_str().unwrap_or_default().to_string(),
            model_version: model_info["model_version"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        };
        info!("作业已提交到 FATE-Flow: {}", submission.job_id);
        Ok(submission)
    }

    #[instrument(skip(self))]
    async fn query_job(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
    ) -> PortalResult<EngineJobInfo> {
        let body = json!({
            "job_id": job_id,
            "role": role.as_str(),
            "party_id": party_id,
        });
        let response = self.call("v1/job/query", &body, "查询作业").await?;

        let raw_status = response.data[0]["f_status"]
            .as_str()
            .ok_or_else(|| {
                PortalError::remote(SERVICE_NAME, "查询作业: 响应缺少 f_status", response.data.to_string())
            })?
            .to_string();
        let status = EngineJobStatus::parse(&raw_status).ok_or_else(|| {
            PortalError::remote(
                SERVICE_NAME,
                format!("查询作业: 未知的作业状态 {raw_status}"),
                response.data.to_string(),
            )
        })?;
        debug!("FATE-Flow 作业 {} 状态: {}", job_id, raw_status);
        Ok(EngineJobInfo { status, raw_status })
    }

    #[instrument(skip(self))]
    async fn component_metrics(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> PortalResult<Value> {
        let body = Self::component_body(job_id, role, party_id, component);
        let response = self
            .call("v1/tracking/component/metric/all", &body, "查询组件指标")
            .await?;
        Ok(response.data)
    }

    #[instrument(skip(self))]
    async fn component_output_summary(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> PortalResult<Value> {
        let body = Self::component_body(job_id, role, party_id, component);
        let response = self
            .call("v1/tracking/component/output/data", &body, "查询组件输出")
            .await?;
        Ok(response.data)
    }

    fn download_request(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> DownloadRequest {
        DownloadRequest {
            url: self.url("v1/tracking/component/output/data/download"),
            method: "POST".to_string(),
            body: Self::component_body(job_id, role, party_id, component),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_request_is_scoped_to_party() {
        let client = FateFlowClient::new("http://127.0.0.1:9380", 5).unwrap();
        let request = client.download_request("202401", JobParticipantRole::Host, 10000, "intersection_0");
        assert_eq!(
            request.url,
            "http://127.0.0.1:9380/v1/tracking/component/output/data/download"
        );
        assert_eq!(request.method, "POST");
        assert_eq!(request.body["role"], "host");
        assert_eq!(request.body["party_id"], 10000);
        assert_eq!(request.body["component_name"], "intersection_0");
    }
}
