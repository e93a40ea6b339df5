use portal_domain::{AlgorithmOptions, AlgorithmType, JobType, PartyInfo};
use portal_errors::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// 某一站点参与作业所用的数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDataRef {
    pub site_uuid: Uuid,
    pub site_name: String,
    pub site_party_id: u64,
    pub data_uuid: Uuid,
    pub table_name: String,
    pub table_namespace: String,
    #[serde(default)]
    pub label_name: String,
}

impl JobDataRef {
    pub fn party_info(&self) -> PartyInfo {
        PartyInfo {
            party_id: self.site_party_id,
            table_name: self.table_name.clone(),
            table_namespace: self.table_namespace.clone(),
            label_name: self.label_name.clone(),
        }
    }
}

/// 发起方提交的作业创建请求。
///
/// `other_data` 的顺序即作业的规范 host 顺序，规格生成严格按此顺序排列各方。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSubmissionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project_uuid: Uuid,
    pub job_type: JobType,
    #[serde(default)]
    pub algorithm_type: Option<AlgorithmType>,
    #[serde(default)]
    pub options: AlgorithmOptions,
    pub initiator_data: JobDataRef,
    #[serde(default)]
    pub other_data: Vec<JobDataRef>,
    #[serde(default)]
    pub conf_json: String,
    #[serde(default)]
    pub dsl_json: String,
}

impl JobSubmissionRequest {
    pub fn validate(&self) -> PortalResult<()> {
        if self.name.trim().is_empty() {
            return Err(PortalError::validation_error("作业名称不能为空"));
        }
        if self.conf_json.trim().is_empty() != self.dsl_json.trim().is_empty() {
            return Err(PortalError::validation_error("conf 与 dsl 必须同时提供或同时留空"));
        }

        let mut sites = HashSet::new();
        for data in std::iter::once(&self.initiator_data).chain(&self.other_data) {
            if !sites.insert(data.site_uuid) {
                return Err(PortalError::validation_error(format!(
                    "站点 {} 在作业中出现多次",
                    data.site_uuid
                )));
            }
            if data.table_name.trim().is_empty() || data.table_namespace.trim().is_empty() {
                return Err(PortalError::validation_error(format!(
                    "站点 {} 的数据表引用不完整",
                    data.site_name
                )));
            }
        }
        Ok(())
    }
}
