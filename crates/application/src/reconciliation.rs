use portal_domain::{JobStatus, ProjectType, SiteContext};
use portal_errors::PortalResult;
use tracing::{debug, info, instrument, warn};

use crate::job::{JobAggregate, JobServices};
use crate::project::{sync_projects, ProjectAggregate, ProjectServices};

/// 对账服务 - 修复漏掉或乱序到达的事件造成的本地与 FML Manager 之间的分歧
pub struct ReconciliationService {
    projects: ProjectServices,
    jobs: JobServices,
}

/// 一轮对账的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub projects_synced: usize,
    pub rows_changed: usize,
    pub failures: usize,
}

/// 一轮作业刷新的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub finished: usize,
    pub failures: usize,
}

impl ReconciliationService {
    pub fn new(projects: ProjectServices, jobs: JobServices) -> Self {
        Self { projects, jobs }
    }

    /// 先同步项目列表，再逐个同步非本地项目的参与方与数据关联。
    /// 单个项目失败只记录日志，不中断整轮对账。
    #[instrument(skip(self, ctx), fields(site = %ctx.site.name))]
    pub async fn sync_all(&self, ctx: &SiteContext) -> PortalResult<ReconciliationReport> {
        ctx.ensure_broker_connected()?;
        let mut report = ReconciliationReport::default();

        match sync_projects(&self.projects, ctx).await {
            Ok(outcome) => report.rows_changed += outcome.changed(),
            Err(e) => {
                warn!("同步项目列表失败: {}", e);
                report.failures += 1;
            }
        }

        let projects = self.projects.projects.list_all().await?;
        for project in projects
            .into_iter()
            .filter(|p| p.project_type != ProjectType::Local)
        {
            let project_uuid = project.uuid;
            let mut aggregate = ProjectAggregate::load(self.projects.clone(), project_uuid).await?;

            match aggregate.sync_participant(ctx).await {
                Ok(outcome) => report.rows_changed += outcome.changed(),
                Err(e) => {
                    warn!("同步项目 {} 参与方失败: {}", project_uuid, e);
                    report.failures += 1;
                }
            }
            match aggregate.sync_data_association(ctx).await {
                Ok(outcome) => report.rows_changed += outcome.changed(),
                Err(e) => {
                    warn!("同步项目 {} 数据关联失败: {}", project_uuid, e);
                    report.failures += 1;
                }
            }
            report.projects_synced += 1;
        }

        info!(
            "对账完成: 项目 {} 个，修正 {} 条记录，失败 {} 次",
            report.projects_synced, report.rows_changed, report.failures
        );
        Ok(report)
    }

    /// 向执行引擎刷新所有运行中作业的状态
    #[instrument(skip(self, ctx), fields(site = %ctx.site.name))]
    pub async fn refresh_running_jobs(&self, ctx: &SiteContext) -> PortalResult<RefreshReport> {
        let running = self.jobs.jobs.list_by_status(JobStatus::Running).await?;
        debug!("发现 {} 个运行中的作业", running.len());

        let mut report = RefreshReport::default();
        for job in running {
            let mut aggregate = match JobAggregate::load(self.jobs.clone(), job.uuid).await {
                Ok(aggregate) => aggregate,
                Err(e) => {
                    warn!("加载作业 {} 失败: {}", job.uuid, e);
                    report.failures += 1;
                    continue;
                }
            };
            if aggregate.own_participant(ctx).is_none() {
                debug!("当前站点不是作业 {} 的参与方，跳过", job.uuid);
                continue;
            }
            match aggregate.refresh_job(ctx).await {
                Ok(status) => {
                    report.refreshed += 1;
                    if status.is_terminal() {
                        report.finished += 1;
                    }
                }
                Err(e) => {
                    warn!("刷新作业 {} 状态失败: {}", job.uuid, e);
                    report.failures += 1;
                }
            }
        }

        info!(
            "作业刷新完成: 刷新 {} 个，结束 {} 个，失败 {} 个",
            report.refreshed, report.finished, report.failures
        );
        Ok(report)
    }
}
