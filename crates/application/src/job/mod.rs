//! 作业聚合：一次训练/预测/求交作业及其各站点参与方记录的生命周期

mod aggregate;
mod engine;
mod request;

pub use aggregate::JobAggregate;
pub use request::{JobDataRef, JobSubmissionRequest};

use portal_config::{CoordinationConfig, EngineConfig};
use portal_domain::{
    BrokerClient, JobParticipantRepository, JobRepository, JobRunner, ProjectRepository,
};
use std::sync::Arc;
use std::time::Duration;

use crate::background::BackgroundTasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    /// 收到远端作业后等待各方状态稳定再自动审批
    pub auto_approval_delay: Duration,
    /// 引擎状态轮询间隔
    pub monitor_interval: Duration,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            auto_approval_delay: Duration::from_secs(5),
            monitor_interval: Duration::from_secs(10),
        }
    }
}

impl JobSettings {
    pub fn from_config(coordination: &CoordinationConfig, engine: &EngineConfig) -> Self {
        Self {
            auto_approval_delay: coordination.auto_approval_delay(),
            monitor_interval: Duration::from_secs(engine.monitor_interval_seconds),
        }
    }
}

/// 作业聚合依赖的仓储与外部协作方
#[derive(Clone)]
pub struct JobServices {
    pub jobs: Arc<dyn JobRepository>,
    pub participants: Arc<dyn JobParticipantRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub broker: Arc<dyn BrokerClient>,
    pub runner: Arc<dyn JobRunner>,
    pub tasks: BackgroundTasks,
    pub settings: JobSettings,
}
