use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{ConfigValidator, ValidationUtils};

/// 本站点身份信息，向 FML Manager 注册时使用
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub uuid: Uuid,
    pub name: String,
    pub party_id: u64,
    pub description: String,
    pub external_host: String,
    pub external_port: u16,
    pub https: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            uuid: Uuid::nil(),
            name: "site-portal".to_string(),
            party_id: 9999,
            description: String::new(),
            external_host: "127.0.0.1".to_string(),
            external_port: 8443,
            https: false,
        }
    }
}

impl ConfigValidator for SiteConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.uuid.is_nil() {
            return Err(crate::ConfigError::Validation(
                "site.uuid must be set".to_string(),
            ));
        }
        ValidationUtils::validate_not_empty(&self.name, "site.name")?;
        ValidationUtils::validate_not_empty(&self.external_host, "site.external_host")?;
        if self.party_id == 0 {
            return Err(crate::ConfigError::Validation(
                "site.party_id must be greater than 0".to_string(),
            ));
        }
        if self.external_port == 0 {
            return Err(crate::ConfigError::Validation(
                "site.external_port cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
