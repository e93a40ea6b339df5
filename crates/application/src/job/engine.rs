//! 作业与执行引擎之间的交互：提交、状态轮询、结果提取与结果下载

use portal_domain::{
    DownloadRequest, JobEngineInfo, JobParticipantRole, JobStatus, JobType, SiteContext,
};
use portal_errors::{PortalError, PortalResult};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{JobAggregate, JobServices};

const EVALUATION_COMPONENT: &str = "evaluation_0";
const INTERSECTION_COMPONENT: &str = "intersection_0";

impl JobAggregate {
    /// 当前站点在引擎中的身份（角色与 party id）
    fn engine_identity(&self, ctx: &SiteContext) -> PortalResult<(JobParticipantRole, u64)> {
        self.own_participant(ctx)
            .map(|p| (p.site_role, p.site_party_id))
            .ok_or(PortalError::JobParticipantNotFound {
                job_uuid: self.job.uuid,
                site_uuid: ctx.site_uuid(),
            })
    }

    /// 提交 conf/dsl 到执行引擎，记录引擎作业信息并启动状态监控
    #[instrument(skip(self, ctx), fields(job_uuid = %self.job.uuid))]
    pub(super) async fn submit_to_engine(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        let submission = self
            .services
            .runner
            .submit_job(&self.job.conf, &self.job.dsl)
            .await?;

        let info = JobEngineInfo {
            fate_job_id: submission.job_id,
            fate_job_status: "waiting".to_string(),
            fate_model_id: submission.model_id,
            fate_model_version: submission.model_version,
        };
        self.services
            .jobs
            .update_engine_info(self.job.uuid, &info)
            .await?;
        self.job.fate_job_id = info.fate_job_id;
        self.job.fate_job_status = info.fate_job_status;
        self.job.fate_model_id = info.fate_model_id;
        self.job.fate_model_version = info.fate_model_version;

        if self.job.status != JobStatus::Running {
            self.services
                .jobs
                .update_status(self.job.uuid, JobStatus::Running)
                .await?;
            self.job.status = JobStatus::Running;
        }
        info!(
            "作业 {} 已提交到执行引擎, fate_job_id={}",
            self.job.uuid, self.job.fate_job_id
        );

        self.spawn_monitor(ctx);
        Ok(())
    }

    fn spawn_monitor(&self, ctx: &SiteContext) {
        let services = self.services.clone();
        let task_ctx = ctx.clone();
        let job_uuid = self.job.uuid;
        self.services
            .tasks
            .spawn(format!("monitor-job-{job_uuid}"), async move {
                monitor_job(services, task_ctx, job_uuid).await
            });
    }

    /// 直接向执行引擎查询作业状态并应用状态变化，返回刷新后的作业状态
    #[instrument(skip(self, ctx), fields(job_uuid = %self.job.uuid))]
    pub async fn refresh_job(&mut self, ctx: &SiteContext) -> PortalResult<JobStatus> {
        if self.job.fate_job_id.is_empty() {
            debug!("作业 {} 尚未提交到执行引擎", self.job.uuid);
            return Ok(self.job.status);
        }
        let (role, party_id) = self.engine_identity(ctx)?;
        let engine = self
            .services
            .runner
            .query_job(&self.job.fate_job_id, role, party_id)
            .await?;

        if engine.raw_status != self.job.fate_job_status {
            let info = JobEngineInfo {
                fate_job_id: self.job.fate_job_id.clone(),
                fate_job_status: engine.raw_status.clone(),
                fate_model_id: self.job.fate_model_id.clone(),
                fate_model_version: self.job.fate_model_version.clone(),
            };
            self.services
                .jobs
                .update_engine_info(self.job.uuid, &info)
                .await?;
            self.job.fate_job_status = info.fate_job_status;
        }

        let next = engine.status.to_job_status();
        if next == self.job.status {
            return Ok(next);
        }
        if !self.job.status.can_transition_to(next) {
            warn!(
                "忽略作业 {} 的状态回退: {} -> {}",
                self.job.uuid, self.job.status, next
            );
            return Ok(self.job.status);
        }

        self.services.jobs.update_status(self.job.uuid, next).await?;
        info!("作业 {} 状态更新: {} -> {}", self.job.uuid, self.job.status, next);
        self.job.status = next;

        self.broadcast_status(ctx).await;
        if next == JobStatus::Succeeded {
            self.schedule_result_processing(ctx);
        }
        Ok(next)
    }

    pub(super) fn schedule_result_processing(&self, ctx: &SiteContext) {
        let services = self.services.clone();
        let task_ctx = ctx.clone();
        let job_uuid = self.job.uuid;
        self.services
            .tasks
            .spawn(format!("process-job-result-{job_uuid}"), async move {
                let mut aggregate = JobAggregate::load(services, job_uuid).await?;
                aggregate.process_job_result(&task_ctx).await
            });
    }

    /// 提取作业结果摘要并保存到作业记录
    ///
    /// 查询时始终使用当前站点自己的角色与 party id。
    #[instrument(skip(self, ctx), fields(job_uuid = %self.job.uuid, job_type = %self.job.job_type))]
    pub async fn process_job_result(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        if self.job.status != JobStatus::Succeeded {
            return Err(PortalError::invalid_state(format!(
                "作业 {} 尚未成功完成，当前状态 {}",
                self.job.uuid, self.job.status
            )));
        }
        let (role, party_id) = self.engine_identity(ctx)?;
        let runner = &self.services.runner;
        let fate_job_id = self.job.fate_job_id.as_str();

        let result = match self.job.job_type {
            JobType::Training => {
                let evaluation = runner
                    .component_metrics(fate_job_id, role, party_id, EVALUATION_COMPONENT)
                    .await?;
                json!({
                    "model_id": self.job.fate_model_id,
                    "model_version": self.job.fate_model_version,
                    "evaluation": evaluation,
                })
            }
            JobType::Predicting => {
                let component = self.result_component()?;
                let summary = runner
                    .component_output_summary(fate_job_id, role, party_id, &component)
                    .await?;
                json!({ "component": component, "summary": summary })
            }
            JobType::Psi => {
                let summary = runner
                    .component_output_summary(fate_job_id, role, party_id, INTERSECTION_COMPONENT)
                    .await?;
                json!({ "component": INTERSECTION_COMPONENT, "summary": summary })
            }
        };

        let result_json = serde_json::to_string(&result)?;
        self.services
            .jobs
            .update_result_info(self.job.uuid, &result_json)
            .await?;
        self.job.result_json = result_json;
        info!("作业 {} 结果已保存", self.job.uuid);
        Ok(())
    }

    /// 结果数据所在组件：预测作业为算法组件，PSI 为求交组件
    fn result_component(&self) -> PortalResult<String> {
        match self.job.job_type {
            JobType::Predicting => self
                .job
                .algorithm_type
                .map(|algorithm| algorithm.component_name())
                .ok_or_else(|| PortalError::validation_error("预测作业缺少算法类型")),
            JobType::Psi => Ok(INTERSECTION_COMPONENT.to_string()),
            JobType::Training => Err(PortalError::validation_error("训练作业不产出结果数据")),
        }
    }

    /// 构造结果数据下载请求，仅适用于已成功的预测与 PSI 作业
    pub fn get_data_result_download_request(
        &self,
        ctx: &SiteContext,
    ) -> PortalResult<DownloadRequest> {
        if self.job.status != JobStatus::Succeeded {
            return Err(PortalError::invalid_state(format!(
                "作业 {} 尚未成功完成，当前状态 {}",
                self.job.uuid, self.job.status
            )));
        }
        let component = self.result_component()?;
        let (role, party_id) = self.engine_identity(ctx)?;
        Ok(self
            .services
            .runner
            .download_request(&self.job.fate_job_id, role, party_id, &component))
    }
}

/// 轮询执行引擎直到作业进入终态
async fn monitor_job(services: JobServices, ctx: SiteContext, job_uuid: Uuid) -> PortalResult<()> {
    let interval = services.settings.monitor_interval;
    loop {
        tokio::time::sleep(interval).await;

        let mut aggregate = JobAggregate::load(services.clone(), job_uuid).await?;
        if aggregate.job.status.is_terminal() {
            debug!("作业 {} 已进入终态 {}，停止监控", job_uuid, aggregate.job.status);
            return Ok(());
        }
        match aggregate.refresh_job(&ctx).await {
            Ok(status) if status.is_terminal() => return Ok(()),
            Ok(_) => {}
            Err(e) if e.is_retryable() => {
                warn!("刷新作业 {} 状态失败，稍后重试: {}", job_uuid, e);
            }
            Err(e) => return Err(e),
        }
    }
}
