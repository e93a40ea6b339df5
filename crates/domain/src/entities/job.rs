use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Training,
    Predicting,
    Psi,
}

string_enum!(JobType {
    Training => "training",
    Predicting => "predicting",
    Psi => "psi",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmType {
    HomoLr,
    HomoSbt,
    HeteroLr,
    HeteroSbt,
}

string_enum!(AlgorithmType {
    HomoLr => "homo_lr",
    HomoSbt => "homo_sbt",
    HeteroLr => "hetero_lr",
    HeteroSbt => "hetero_sbt",
});

impl AlgorithmType {
    /// 执行引擎中的组件模块名
    pub fn module_name(&self) -> &'static str {
        match self {
            AlgorithmType::HomoLr => "HomoLR",
            AlgorithmType::HomoSbt => "HomoSecureboost",
            AlgorithmType::HeteroLr => "HeteroLR",
            AlgorithmType::HeteroSbt => "HeteroSecureBoost",
        }
    }

    /// DSL 中算法组件的实例名，如 `HomoLR_0`
    pub fn component_name(&self) -> String {
        format!("{}_0", self.module_name())
    }

    /// 同构（横向）算法：各方特征空间相同
    pub fn is_homo(&self) -> bool {
        matches!(self, AlgorithmType::HomoLr | AlgorithmType::HomoSbt)
    }

    pub fn needs_arbiter(&self) -> bool {
        !matches!(self, AlgorithmType::HeteroSbt)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Rejected,
    Deleted,
}

string_enum!(JobStatus {
    Pending => "pending",
    Running => "running",
    Succeeded => "succeeded",
    Failed => "failed",
    Rejected => "rejected",
    Deleted => "deleted",
});

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Rejected | JobStatus::Deleted
        )
    }

    /// 状态单调前进；唯一例外是提交失败时的补偿性 Deleted
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (current, next) if *current == next => true,
            (_, JobStatus::Deleted) => true,
            (JobStatus::Pending, _) => true,
            (JobStatus::Running, JobStatus::Succeeded | JobStatus::Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobParticipantRole {
    Guest,
    Host,
    Arbiter,
}

string_enum!(JobParticipantRole {
    Guest => "guest",
    Host => "host",
    Arbiter => "arbiter",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobParticipantStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(JobParticipantStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub project_uuid: Uuid,
    pub job_type: JobType,
    pub algorithm_type: Option<AlgorithmType>,
    pub status: JobStatus,
    pub initiating_site_uuid: Uuid,
    pub initiating_site_name: String,
    pub initiating_site_party_id: u64,
    /// 原始提交请求（JSON）
    pub request_json: String,
    pub conf: String,
    pub dsl: String,
    pub fate_job_id: String,
    pub fate_job_status: String,
    pub fate_model_id: String,
    pub fate_model_version: String,
    pub result_json: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// conf 与 dsl 要么都为空（待生成），要么都已填充
    pub fn needs_spec_generation(&self) -> bool {
        self.conf.is_empty() && self.dsl.is_empty()
    }

    pub fn has_consistent_spec(&self) -> bool {
        self.conf.is_empty() == self.dsl.is_empty()
    }

    pub fn entity_description(&self) -> String {
        format!(
            "作业 '{}' (UUID: {}, 类型: {})",
            self.name, self.uuid, self.job_type
        )
    }
}

/// 作业在执行引擎侧的标识与状态
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobEngineInfo {
    pub fate_job_id: String,
    pub fate_job_status: String,
    pub fate_model_id: String,
    pub fate_model_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobParticipant {
    pub uuid: Uuid,
    pub job_uuid: Uuid,
    pub site_uuid: Uuid,
    pub site_name: String,
    pub site_party_id: u64,
    pub site_role: JobParticipantRole,
    pub data_uuid: Uuid,
    pub data_table_name: String,
    pub data_table_namespace: String,
    pub data_label_name: String,
    pub status: JobParticipantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_mapping() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
            JobStatus::Rejected,
            JobStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("unknown".parse::<JobStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&JobParticipantStatus::Approved).unwrap(),
            "\"approved\""
        );
    }

    #[test]
    fn test_job_status_transitions_are_monotonic() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Rejected));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Deleted));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Rejected.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn test_algorithm_component_names() {
        assert_eq!(AlgorithmType::HomoLr.component_name(), "HomoLR_0");
        assert_eq!(AlgorithmType::HomoSbt.component_name(), "HomoSecureboost_0");
        assert_eq!(AlgorithmType::HeteroSbt.component_name(), "HeteroSecureBoost_0");
        assert!(AlgorithmType::HomoSbt.is_homo());
        assert!(!AlgorithmType::HeteroLr.is_homo());
        assert!(!AlgorithmType::HeteroSbt.needs_arbiter());
    }
}
