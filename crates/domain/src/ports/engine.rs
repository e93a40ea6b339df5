//! 执行引擎（FATE-Flow）协作方契约

use async_trait::async_trait;
use portal_errors::PortalResult;
use serde::{Deserialize, Serialize};

use crate::entities::{JobParticipantRole, JobStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineJobStatus {
    Waiting,
    Running,
    Success,
    Failed,
    Canceled,
    Timeout,
}

impl EngineJobStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "waiting" => Some(EngineJobStatus::Waiting),
            "running" => Some(EngineJobStatus::Running),
            "success" => Some(EngineJobStatus::Success),
            "failed" => Some(EngineJobStatus::Failed),
            "canceled" => Some(EngineJobStatus::Canceled),
            "timeout" => Some(EngineJobStatus::Timeout),
            _ => None,
        }
    }

    pub fn to_job_status(self) -> JobStatus {
        match self {
            EngineJobStatus::Waiting | EngineJobStatus::Running => JobStatus::Running,
            EngineJobStatus::Success => JobStatus::Succeeded,
            EngineJobStatus::Failed | EngineJobStatus::Canceled | EngineJobStatus::Timeout => {
                JobStatus::Failed
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSubmission {
    pub job_id: String,
    pub model_id: String,
    pub model_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineJobInfo {
    pub status: EngineJobStatus,
    /// 引擎返回的原始状态字符串
    pub raw_status: String,
}

/// 组件输出下载请求，由调用方转交给浏览器或下载代理执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    pub method: String,
    pub body: serde_json::Value,
}

#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn submit_job(&self, conf: &str, dsl: &str) -> PortalResult<EngineSubmission>;
    async fn query_job(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
    ) -> PortalResult<EngineJobInfo>;
    async fn component_metrics(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> PortalResult<serde_json::Value>;
    async fn component_output_summary(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> PortalResult<serde_json::Value>;
    fn download_request(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> DownloadRequest;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_status_mapping() {
        assert_eq!(
            EngineJobStatus::parse("WAITING").map(EngineJobStatus::to_job_status),
            Some(JobStatus::Running)
        );
        assert_eq!(
            EngineJobStatus::parse("success").map(EngineJobStatus::to_job_status),
            Some(JobStatus::Succeeded)
        );
        assert_eq!(
            EngineJobStatus::parse("canceled").map(EngineJobStatus::to_job_status),
            Some(JobStatus::Failed)
        );
        assert_eq!(EngineJobStatus::parse("pass"), None);
    }
}
