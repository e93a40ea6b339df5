use uuid::Uuid;

use crate::*;

#[test]
fn test_portal_error_display() {
    let db_error = PortalError::DatabaseOperation("Connection failed".to_string());
    assert_eq!(db_error.to_string(), "数据库操作错误: Connection failed");

    let uuid = Uuid::nil();
    let job_error = PortalError::job_not_found(uuid);
    assert_eq!(
        job_error.to_string(),
        "作业未找到: 00000000-0000-0000-0000-000000000000"
    );

    let broker_error = PortalError::BrokerNotConnected;
    assert_eq!(broker_error.to_string(), "FML Manager 未连接");

    let remote_error = PortalError::remote("fml-manager", "HTTP 500", "{\"code\":1}");
    assert_eq!(
        remote_error.to_string(),
        "fml-manager 调用失败: HTTP 500, 响应: {\"code\":1}"
    );

    let unsupported = PortalError::unsupported_algorithm("psi", "HomoLR");
    assert_eq!(
        unsupported.to_string(),
        "不支持的算法组合: 作业类型 psi, 算法 HomoLR"
    );
}

#[test]
fn test_not_found_classification() {
    let uuid = Uuid::new_v4();
    assert!(PortalError::job_not_found(uuid).is_not_found());
    assert!(PortalError::project_not_found(uuid).is_not_found());
    assert!(PortalError::JobParticipantNotFound {
        job_uuid: uuid,
        site_uuid: uuid
    }
    .is_not_found());
    assert!(PortalError::ProjectInvitationNotFound(uuid.to_string()).is_not_found());

    assert!(!PortalError::database_error("boom").is_not_found());
    assert!(!PortalError::BrokerNotConnected.is_not_found());
}

#[test]
fn test_validation_classification() {
    assert!(PortalError::validation_error("bad").is_validation());
    assert!(PortalError::invalid_state("bad").is_validation());
    assert!(PortalError::permission("bad").is_validation());
    assert!(PortalError::unsupported_algorithm("training", "HomoLR").is_validation());
    assert!(!PortalError::BrokerNotConnected.is_validation());
    assert!(!PortalError::remote("fml-manager", "x", "y").is_validation());
}

#[test]
fn test_retryable_classification() {
    assert!(PortalError::Network("refused".to_string()).is_retryable());
    assert!(PortalError::BrokerNotConnected.is_retryable());
    assert!(!PortalError::validation_error("bad").is_retryable());
}

#[test]
fn test_serde_json_error_conversion() {
    let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let portal_error: PortalError = err.into();
    assert!(matches!(portal_error, PortalError::Serialization(_)));
}

#[test]
fn test_user_message() {
    assert_eq!(
        PortalError::BrokerNotConnected.user_message(),
        "尚未连接到 FML Manager"
    );
    assert_eq!(
        PortalError::Internal("x".to_string()).user_message(),
        "系统繁忙，请稍后重试"
    );
}
