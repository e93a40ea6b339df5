use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("作业未找到: {uuid}")]
    JobNotFound { uuid: Uuid },
    #[error("作业参与方未找到: job={job_uuid}, site={site_uuid}")]
    JobParticipantNotFound { job_uuid: Uuid, site_uuid: Uuid },
    #[error("项目未找到: {uuid}")]
    ProjectNotFound { uuid: Uuid },
    #[error("项目参与方未找到: project={project_uuid}, site={site_uuid}")]
    ProjectParticipantNotFound { project_uuid: Uuid, site_uuid: Uuid },
    #[error("项目邀请未找到: {0}")]
    ProjectInvitationNotFound(String),
    #[error("项目数据未找到: project={project_uuid}, data={data_uuid}")]
    ProjectDataNotFound { project_uuid: Uuid, data_uuid: Uuid },
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("无效的状态: {0}")]
    InvalidState(String),
    #[error("不支持的算法组合: 作业类型 {job_type}, 算法 {algorithm}")]
    UnsupportedAlgorithm { job_type: String, algorithm: String },
    #[error("权限不足: {0}")]
    Permission(String),
    #[error("FML Manager 未连接")]
    BrokerNotConnected,
    #[error("{service} 调用失败: {message}, 响应: {body}")]
    Remote {
        service: String,
        message: String,
        body: String,
    },
    #[error("网络错误: {0}")]
    Network(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type PortalResult<T> = Result<T, PortalError>;

impl PortalError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn job_not_found(uuid: Uuid) -> Self {
        Self::JobNotFound { uuid }
    }
    pub fn project_not_found(uuid: Uuid) -> Self {
        Self::ProjectNotFound { uuid }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }
    pub fn permission<S: Into<String>>(msg: S) -> Self {
        Self::Permission(msg.into())
    }
    pub fn unsupported_algorithm(job_type: impl ToString, algorithm: impl ToString) -> Self {
        Self::UnsupportedAlgorithm {
            job_type: job_type.to_string(),
            algorithm: algorithm.to_string(),
        }
    }
    pub fn remote<S: Into<String>, M: Into<String>, B: Into<String>>(
        service: S,
        message: M,
        body: B,
    ) -> Self {
        Self::Remote {
            service: service.into(),
            message: message.into(),
            body: body.into(),
        }
    }

    /// 仓储查询未命中，调用方据此选择创建或更新路径
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PortalError::JobNotFound { .. }
                | PortalError::JobParticipantNotFound { .. }
                | PortalError::ProjectNotFound { .. }
                | PortalError::ProjectParticipantNotFound { .. }
                | PortalError::ProjectInvitationNotFound(_)
                | PortalError::ProjectDataNotFound { .. }
        )
    }

    /// 请求被拒绝时尚未产生任何副作用
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PortalError::ValidationError(_)
                | PortalError::InvalidState(_)
                | PortalError::UnsupportedAlgorithm { .. }
                | PortalError::Permission(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PortalError::DatabaseOperation(_)
                | PortalError::Network(_)
                | PortalError::BrokerNotConnected
        )
    }

    pub fn user_message(&self) -> &str {
        match self {
            PortalError::JobNotFound { .. } => "请求的作业不存在",
            PortalError::ProjectNotFound { .. } => "请求的项目不存在",
            PortalError::ValidationError(_) => "输入数据验证失败",
            PortalError::InvalidState(_) => "当前状态不允许该操作",
            PortalError::UnsupportedAlgorithm { .. } => "不支持的作业类型与算法组合",
            PortalError::Permission(_) => "您没有执行此操作的权限",
            PortalError::BrokerNotConnected => "尚未连接到 FML Manager",
            PortalError::Remote { .. } | PortalError::Network(_) => "远端服务调用失败，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<sqlx::Error> for PortalError {
    fn from(err: sqlx::Error) -> Self {
        PortalError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::Serialization(err.to_string())
    }
}
