use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// FML Manager 连接配置，未配置 endpoint 视为未连接
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub endpoint: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_seconds: 30,
        }
    }
}

impl BrokerConfig {
    pub fn is_connected(&self) -> bool {
        self.endpoint
            .as_deref()
            .is_some_and(|endpoint| !endpoint.trim().is_empty())
    }
}

impl ConfigValidator for BrokerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if let Some(endpoint) = &self.endpoint {
            ValidationUtils::validate_url(endpoint, "broker.endpoint")?;
        }
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "broker.request_timeout_seconds",
        )?;
        Ok(())
    }
}

/// 执行引擎 (FATE-Flow) 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoint: String,
    pub request_timeout_seconds: u64,
    pub monitor_interval_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9380".to_string(),
            request_timeout_seconds: 60,
            monitor_interval_seconds: 10,
        }
    }
}

impl ConfigValidator for EngineConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_url(&self.endpoint, "engine.endpoint")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "engine.request_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.monitor_interval_seconds,
            "engine.monitor_interval_seconds",
        )?;
        Ok(())
    }
}
