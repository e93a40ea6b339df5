pub mod broker;
pub mod fate_flow;
pub mod offline;

pub use broker::BrokerHttpClient;
pub use fate_flow::FateFlowClient;
pub use offline::OfflineBrokerClient;

use portal_errors::{PortalError, PortalResult};
use std::time::Duration;

pub(crate) fn build_http_client(timeout_seconds: u64) -> PortalResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| PortalError::Configuration(format!("创建HTTP客户端失败: {e}")))
}

pub(crate) fn join_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
