use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use portal_application::{
    BackgroundTasks, JobServices, JobSettings, ProjectServices, ReconciliationReport,
    ReconciliationService, RefreshReport,
};
use portal_config::AppConfig;
use portal_domain::{BrokerClient, LocalSite, SiteContext, SiteRegistration};
use portal_infrastructure::{
    create_pool, BrokerHttpClient, FateFlowClient, OfflineBrokerClient, Repositories,
};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// 停机时等待后台任务结束的上限
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// 站点门户进程：持有仓储、外部客户端与对账服务
pub struct Application {
    config: AppConfig,
    ctx: SiteContext,
    broker: Arc<dyn BrokerClient>,
    reconciliation: ReconciliationService,
    tasks: BackgroundTasks,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let pool = create_pool(&config.database)
            .await
            .context("初始化数据库失败")?;
        let repos = Repositories::sqlite(pool);

        let broker: Arc<dyn BrokerClient> = match BrokerHttpClient::from_config(&config.broker)
            .context("创建 FML Manager 客户端失败")?
        {
            Some(client) => {
                info!("FML Manager 地址: {}", client.endpoint());
                Arc::new(client)
            }
            None => {
                warn!("未配置 FML Manager，站点以离线模式运行");
                Arc::new(OfflineBrokerClient)
            }
        };
        let runner =
            Arc::new(FateFlowClient::from_config(&config.engine).context("创建引擎客户端失败")?);

        let tasks = BackgroundTasks::new();
        let project_services = ProjectServices {
            projects: repos.projects.clone(),
            participants: repos.project_participants.clone(),
            invitations: repos.project_invitations.clone(),
            data: repos.project_data.clone(),
            broker: broker.clone(),
        };
        let job_services = JobServices {
            jobs: repos.jobs.clone(),
            participants: repos.job_participants.clone(),
            projects: repos.projects.clone(),
            broker: broker.clone(),
            runner,
            tasks: tasks.clone(),
            settings: JobSettings::from_config(&config.coordination, &config.engine),
        };

        let ctx = site_context(&config);
        Ok(Self {
            reconciliation: ReconciliationService::new(project_services, job_services),
            config,
            ctx,
            broker,
            tasks,
        })
    }

    pub fn context(&self) -> &SiteContext {
        &self.ctx
    }

    /// 向 FML Manager 注册或更新本站点信息
    pub async fn register_site(&self) -> Result<()> {
        self.ctx.ensure_broker_connected()?;
        let site = &self.config.site;
        let registration = SiteRegistration {
            uuid: site.uuid,
            name: site.name.clone(),
            description: site.description.clone(),
            party_id: site.party_id,
            external_host: site.external_host.clone(),
            external_port: site.external_port,
            https: site.https,
            last_connected_at: chrono::Utc::now(),
        };
        self.broker
            .register_site(&registration)
            .await
            .context("注册站点失败")?;
        info!("站点 {} 已注册到 FML Manager", site.name);
        Ok(())
    }

    pub async fn unregister_site(&self) -> Result<()> {
        self.ctx.ensure_broker_connected()?;
        self.broker
            .unregister_site(self.ctx.site_uuid())
            .await
            .context("注销站点失败")?;
        info!("站点 {} 已从 FML Manager 注销", self.ctx.site.name);
        Ok(())
    }

    pub async fn sync_once(&self) -> Result<ReconciliationReport> {
        Ok(self.reconciliation.sync_all(&self.ctx).await?)
    }

    pub async fn refresh_jobs_once(&self) -> Result<RefreshReport> {
        Ok(self.reconciliation.refresh_running_jobs(&self.ctx).await?)
    }

    /// 周期性对账与作业刷新，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let mut sync_interval = tokio::time::interval(self.config.coordination.sync_interval());
        let mut refresh_interval = tokio::time::interval(Duration::from_secs(
            self.config.engine.monitor_interval_seconds,
        ));

        info!(
            "站点门户开始运行: 对账间隔 {}s, 作业刷新间隔 {}s",
            self.config.coordination.sync_interval_seconds,
            self.config.engine.monitor_interval_seconds
        );

        loop {
            tokio::select! {
                _ = sync_interval.tick() => {
                    if !self.ctx.broker_connected {
                        continue;
                    }
                    if let Err(e) = self.reconciliation.sync_all(&self.ctx).await {
                        error!("对账失败: {}", e);
                    }
                }
                _ = refresh_interval.tick() => {
                    if let Err(e) = self.reconciliation.refresh_running_jobs(&self.ctx).await {
                        error!("刷新作业状态失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("运行循环收到关闭信号");
                    break;
                }
            }
        }

        Ok(())
    }

    /// 等待后台任务结束，超时后中止剩余任务
    pub async fn drain_tasks(&self) {
        let pending = self.tasks.pending_count();
        if pending > 0 {
            info!("等待 {} 个后台任务结束", pending);
        }
        if tokio::time::timeout(TASK_DRAIN_TIMEOUT, self.tasks.wait_idle())
            .await
            .is_err()
        {
            warn!("后台任务未在限定时间内结束");
            self.tasks.shutdown();
        }
    }
}

pub fn site_context(config: &AppConfig) -> SiteContext {
    let site = LocalSite {
        uuid: config.site.uuid,
        name: config.site.name.clone(),
        party_id: config.site.party_id,
        description: config.site.description.clone(),
    };
    SiteContext::new(site, config.broker.is_connected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_site_context_follows_broker_config() {
        let mut config = AppConfig::default();
        config.site.uuid = Uuid::new_v4();
        config.site.name = "site-a".to_string();

        let ctx = site_context(&config);
        assert_eq!(ctx.site_uuid(), config.site.uuid);
        assert!(!ctx.broker_connected);

        config.broker.endpoint = Some("http://fml-manager:8080".to_string());
        assert!(site_context(&config).broker_connected);
    }

    #[tokio::test]
    async fn test_offline_application_skips_broker_calls() {
        let mut config = AppConfig::default();
        config.site.uuid = Uuid::new_v4();
        config.database.url = "sqlite::memory:".to_string();

        let app = Application::new(config).await.unwrap();
        assert!(app.register_site().await.is_err());
        assert!(app.sync_once().await.is_err());

        let report = app.refresh_jobs_once().await.unwrap();
        assert_eq!(report.refreshed, 0);
        app.drain_tasks().await;
    }
}
