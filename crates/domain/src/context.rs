use portal_errors::{PortalError, PortalResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 本站点身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSite {
    pub uuid: Uuid,
    pub name: String,
    pub party_id: u64,
    pub description: String,
}

/// 每次聚合操作显式传入的站点上下文。
///
/// 连接状态是调用时的快照，不作为聚合的可变字段保存，
/// 同一聚合实例上的并发操作因此不会在该标志上产生竞争。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    pub site: LocalSite,
    pub broker_connected: bool,
}

impl SiteContext {
    pub fn new(site: LocalSite, broker_connected: bool) -> Self {
        Self {
            site,
            broker_connected,
        }
    }

    pub fn site_uuid(&self) -> Uuid {
        self.site.uuid
    }

    pub fn ensure_broker_connected(&self) -> PortalResult<()> {
        if self.broker_connected {
            Ok(())
        } else {
            Err(PortalError::BrokerNotConnected)
        }
    }
}
