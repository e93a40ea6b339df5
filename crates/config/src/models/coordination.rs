use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// 自动审批前等待各方状态落定的时间
    pub auto_approval_delay_seconds: u64,
    /// 周期性对账间隔
    pub sync_interval_seconds: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            auto_approval_delay_seconds: 5,
            sync_interval_seconds: 300,
        }
    }
}

impl CoordinationConfig {
    pub fn auto_approval_delay(&self) -> Duration {
        Duration::from_secs(self.auto_approval_delay_seconds)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds)
    }
}

impl ConfigValidator for CoordinationConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.auto_approval_delay_seconds > 600 {
            return Err(crate::ConfigError::Validation(
                "coordination.auto_approval_delay_seconds must be less than or equal to 600"
                    .to_string(),
            ));
        }
        ValidationUtils::validate_timeout_seconds(
            self.sync_interval_seconds,
            "coordination.sync_interval_seconds",
        )?;
        Ok(())
    }
}
