use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    /// 本站点创建，尚无其他参与方
    Local,
    /// 本站点创建并已邀请其他参与方
    FederatedLocal,
    /// 由其他站点管理
    Remote,
}

string_enum!(ProjectType {
    Local => "local",
    FederatedLocal => "federated_local",
    Remote => "remote",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Managed,
    Pending,
    Joined,
    Rejected,
    Left,
    Dismissed,
    Closed,
}

string_enum!(ProjectStatus {
    Managed => "managed",
    Pending => "pending",
    Joined => "joined",
    Rejected => "rejected",
    Left => "left",
    Dismissed => "dismissed",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectParticipantStatus {
    Owner,
    Pending,
    Joined,
    Rejected,
    Revoked,
    Dismissed,
    Left,
    /// 仅在列举 FML Manager 已知但尚未加入项目的站点时使用，不落库
    Unknown,
}

string_enum!(ProjectParticipantStatus {
    Owner => "owner",
    Pending => "pending",
    Joined => "joined",
    Rejected => "rejected",
    Revoked => "revoked",
    Dismissed => "dismissed",
    Left => "left",
    Unknown => "unknown",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectInvitationStatus {
    Created,
    Sent,
    Accepted,
    Rejected,
    Revoked,
}

string_enum!(ProjectInvitationStatus {
    Created => "created",
    Sent => "sent",
    Accepted => "accepted",
    Rejected => "rejected",
    Revoked => "revoked",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectDataType {
    Local,
    Remote,
}

string_enum!(ProjectDataType {
    Local => "local",
    Remote => "remote",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectDataStatus {
    Associated,
    Dismissed,
}

string_enum!(ProjectDataStatus {
    Associated => "associated",
    Dismissed => "dismissed",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub auto_approval_enabled: bool,
    pub project_type: ProjectType,
    pub status: ProjectStatus,
    pub managing_site_uuid: Uuid,
    pub managing_site_name: String,
    pub managing_site_party_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_managed_by(&self, site_uuid: Uuid) -> bool {
        self.project_type != ProjectType::Remote && self.managing_site_uuid == site_uuid
    }

    pub fn entity_description(&self) -> String {
        format!(
            "项目 '{}' (UUID: {}, 类型: {}, 状态: {})",
            self.name, self.uuid, self.project_type, self.status
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectParticipant {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub site_uuid: Uuid,
    pub site_name: String,
    pub site_party_id: u64,
    pub site_description: String,
    pub status: ProjectParticipantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectInvitation {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub site_uuid: Uuid,
    pub status: ProjectInvitationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 项目与某一站点数据表的关联
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectData {
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub data_uuid: Uuid,
    pub name: String,
    pub description: String,
    pub data_type: ProjectDataType,
    pub status: ProjectDataStatus,
    pub site_uuid: Uuid,
    pub site_name: String,
    pub site_party_id: u64,
    pub table_name: String,
    pub table_namespace: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_status_strings() {
        assert_eq!(ProjectType::FederatedLocal.as_str(), "federated_local");
        assert_eq!(
            "federated_local".parse::<ProjectType>().unwrap(),
            ProjectType::FederatedLocal
        );
        assert_eq!(
            serde_json::to_string(&ProjectType::FederatedLocal).unwrap(),
            "\"federated_local\""
        );
        assert_eq!(
            "revoked".parse::<ProjectParticipantStatus>().unwrap(),
            ProjectParticipantStatus::Revoked
        );
        assert!("gone".parse::<ProjectDataStatus>().is_err());
    }

    #[test]
    fn test_remote_project_is_never_managed_locally() {
        let site = Uuid::new_v4();
        let now = Utc::now();
        let mut project = Project {
            uuid: Uuid::new_v4(),
            name: "p".to_string(),
            description: String::new(),
            auto_approval_enabled: false,
            project_type: ProjectType::Remote,
            status: ProjectStatus::Joined,
            managing_site_uuid: site,
            managing_site_name: "a".to_string(),
            managing_site_party_id: 1,
            created_at: now,
            updated_at: now,
        };
        assert!(!project.is_managed_by(site));
        project.project_type = ProjectType::FederatedLocal;
        assert!(project.is_managed_by(site));
    }
}
