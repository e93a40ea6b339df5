use chrono::Utc;
use indexmap::IndexMap;
use portal_domain::{
    generate_job_spec, Job, JobApprovalResponse, JobParticipant, JobParticipantRole,
    JobParticipantStatus, JobStatus, JobStatusUpdate, JobType, PartyInfo,
    RemoteJobCreationRequest, RemoteJobParticipant, SiteContext,
};
use portal_errors::{PortalError, PortalResult};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{JobServices, JobSubmissionRequest};

/// 作业聚合
///
/// `participants` 保存除发起方外的参与方，按站点索引；
/// 需要有序列表的地方一律使用 `host_order`，不依赖映射的遍历顺序。
pub struct JobAggregate {
    pub job: Job,
    pub initiator: JobParticipant,
    pub participants: IndexMap<Uuid, JobParticipant>,
    pub host_order: Vec<Uuid>,
    pub(super) options: portal_domain::AlgorithmOptions,
    pub(super) services: JobServices,
}

impl JobAggregate {
    /// 由发起方的提交请求构造尚未持久化的作业聚合
    pub fn from_submission_request(
        services: JobServices,
        request: JobSubmissionRequest,
    ) -> PortalResult<Self> {
        request.validate()?;

        let now = Utc::now();
        let initiator_data = &request.initiator_data;
        let job = Job {
            uuid: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            project_uuid: request.project_uuid,
            job_type: request.job_type,
            algorithm_type: request.algorithm_type,
            status: JobStatus::Pending,
            initiating_site_uuid: initiator_data.site_uuid,
            initiating_site_name: initiator_data.site_name.clone(),
            initiating_site_party_id: initiator_data.site_party_id,
            request_json: serde_json::to_string(&request)?,
            conf: request.conf_json.clone(),
            dsl: request.dsl_json.clone(),
            fate_job_id: String::new(),
            fate_job_status: String::new(),
            fate_model_id: String::new(),
            fate_model_version: String::new(),
            result_json: String::new(),
            created_at: now,
            updated_at: now,
            finished_at: None,
        };

        let new_participant = |data: &super::JobDataRef, role, status| JobParticipant {
            uuid: Uuid::new_v4(),
            job_uuid: job.uuid,
            site_uuid: data.site_uuid,
            site_name: data.site_name.clone(),
            site_party_id: data.site_party_id,
            site_role: role,
            data_uuid: data.data_uuid,
            data_table_name: data.table_name.clone(),
            data_table_namespace: data.table_namespace.clone(),
            data_label_name: data.label_name.clone(),
            status,
            created_at: now,
            updated_at: now,
        };

        // 发起方提交即视为同意
        let initiator = new_participant(
            initiator_data,
            JobParticipantRole::Guest,
            JobParticipantStatus::Approved,
        );
        let mut participants = IndexMap::new();
        let mut host_order = Vec::with_capacity(request.other_data.len());
        for data in &request.other_data {
            host_order.push(data.site_uuid);
            participants.insert(
                data.site_uuid,
                new_participant(data, JobParticipantRole::Host, JobParticipantStatus::Pending),
            );
        }

        Ok(Self {
            job,
            initiator,
            participants,
            host_order,
            options: request.options,
            services,
        })
    }

    /// 从存储加载作业及全部参与方
    pub async fn load(services: JobServices, job_uuid: Uuid) -> PortalResult<Self> {
        let job = services.jobs.get_by_uuid(job_uuid).await?;
        let rows = services.participants.list_by_job(job_uuid).await?;

        let mut initiator = None;
        let mut participants = IndexMap::new();
        let mut host_order = Vec::new();
        for row in rows {
            if row.site_uuid == job.initiating_site_uuid {
                initiator = Some(row);
            } else {
                host_order.push(row.site_uuid);
                participants.insert(row.site_uuid, row);
            }
        }
        let initiator = initiator.ok_or(PortalError::JobParticipantNotFound {
            job_uuid,
            site_uuid: job.initiating_site_uuid,
        })?;

        let options = match serde_json::from_str::<JobSubmissionRequest>(&job.request_json) {
            Ok(request) => request.options,
            Err(e) => {
                warn!("解析作业 {} 的提交请求失败，算法选项使用默认值: {}", job_uuid, e);
                portal_domain::AlgorithmOptions::default()
            }
        };

        Ok(Self {
            job,
            initiator,
            participants,
            host_order,
            options,
            services,
        })
    }

    pub fn is_initiated_by(&self, ctx: &SiteContext) -> bool {
        self.job.initiating_site_uuid == ctx.site_uuid()
    }

    /// 当前站点在作业中的参与记录
    pub fn own_participant(&self, ctx: &SiteContext) -> Option<&JobParticipant> {
        if self.is_initiated_by(ctx) {
            Some(&self.initiator)
        } else {
            self.participants.get(&ctx.site_uuid())
        }
    }

    /// 按规范顺序排列的全部参与方（发起方在前）
    pub fn ordered_participants(&self) -> Vec<&JobParticipant> {
        std::iter::once(&self.initiator)
            .chain(self.host_order.iter().filter_map(|site| self.participants.get(site)))
            .collect()
    }

    fn party_info(participant: &JobParticipant) -> PartyInfo {
        PartyInfo {
            party_id: participant.site_party_id,
            table_name: participant.data_table_name.clone(),
            table_namespace: participant.data_table_namespace.clone(),
            label_name: participant.data_label_name.clone(),
        }
    }

    /// 提交作业。
    ///
    /// 无其他参与方时直接提交到执行引擎；否则持久化各方记录后经代理扇出。
    /// 这一阶段任何失败都把作业标记为 Deleted 后返回错误，已写入的参与方记录保留。
    #[instrument(skip(self, ctx), fields(job_uuid = %self.job.uuid, job_type = %self.job.job_type))]
    pub async fn submit_job(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        match self.services.jobs.get_by_uuid(self.job.uuid).await {
            Ok(_) => {
                return Err(PortalError::invalid_state(format!(
                    "作业已存在: {}",
                    self.job.uuid
                )))
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let has_peers = !self.participants.is_empty();
        if has_peers {
            ctx.ensure_broker_connected()?;
        } else {
            if self.job.job_type == JobType::Psi {
                return Err(PortalError::validation_error("PSI 作业至少需要两个参与方"));
            }
            if self.job.job_type == JobType::Training
                && self.job.algorithm_type.is_some_and(|a| a.is_homo())
            {
                return Err(PortalError::validation_error("横向训练作业至少需要两个参与方"));
            }
        }
        if !self.is_initiated_by(ctx) {
            return Err(PortalError::permission(format!(
                "只有发起站点 {} 可以提交该作业",
                self.job.initiating_site_name
            )));
        }

        if self.job.needs_spec_generation() {
            let others: Vec<PartyInfo> = self
                .host_order
                .iter()
                .filter_map(|site| self.participants.get(site))
                .map(Self::party_info)
                .collect();
            let spec = generate_job_spec(
                self.job.job_type,
                self.job.algorithm_type,
                &Self::party_info(&self.initiator),
                &others,
                &self.options,
            )?;
            self.job.conf = spec.conf;
            self.job.dsl = spec.dsl;
        } else if !self.job.has_consistent_spec() {
            return Err(PortalError::validation_error("conf 与 dsl 必须同时提供"));
        }

        self.services.jobs.create(&self.job).await?;
        self.services.participants.create(&self.initiator).await?;
        info!("作业已创建: {}", self.job.entity_description());

        let result = if has_peers {
            self.fan_out_to_peers().await
        } else {
            self.submit_to_engine(ctx).await
        };

        if let Err(e) = result {
            error!("提交作业 {} 失败，标记为已删除: {}", self.job.uuid, e);
            if let Err(mark_err) = self
                .services
                .jobs
                .update_status(self.job.uuid, JobStatus::Deleted)
                .await
            {
                error!("标记作业 {} 为已删除失败: {}", self.job.uuid, mark_err);
            }
            self.job.status = JobStatus::Deleted;
            return Err(e);
        }
        Ok(())
    }

    async fn fan_out_to_peers(&self) -> PortalResult<()> {
        for site in &self.host_order {
            if let Some(participant) = self.participants.get(site) {
                self.services.participants.create(participant).await?;
            }
        }

        let request = self.remote_creation_request();
        self.services.broker.create_job(&request).await?;
        info!(
            "作业 {} 已通过 FML Manager 发送给 {} 个参与方",
            self.job.uuid,
            self.host_order.len()
        );
        Ok(())
    }

    fn remote_creation_request(&self) -> RemoteJobCreationRequest {
        RemoteJobCreationRequest {
            uuid: self.job.uuid,
            name: self.job.name.clone(),
            description: self.job.description.clone(),
            project_uuid: self.job.project_uuid,
            job_type: self.job.job_type,
            algorithm_type: self.job.algorithm_type,
            initiating_site_uuid: self.job.initiating_site_uuid,
            initiating_site_name: self.job.initiating_site_name.clone(),
            initiating_site_party_id: self.job.initiating_site_party_id,
            request_json: self.job.request_json.clone(),
            conf_json: self.job.conf.clone(),
            dsl_json: self.job.dsl.clone(),
            participants: self
                .ordered_participants()
                .into_iter()
                .map(|p| RemoteJobParticipant {
                    site_uuid: p.site_uuid,
                    site_name: p.site_name.clone(),
                    site_party_id: p.site_party_id,
                    site_role: p.site_role,
                    data_uuid: p.data_uuid,
                    data_table_name: p.data_table_name.clone(),
                    data_table_namespace: p.data_table_namespace.clone(),
                    data_label_name: p.data_label_name.clone(),
                    status: p.status,
                })
                .collect(),
        }
    }

    /// 处理代理转发来的远端作业创建事件。
    ///
    /// 重复投递时只把状态重置为 Pending 并重新写入参与方，结果与单次投递一致。
    #[instrument(skip(services, ctx, request), fields(job_uuid = %request.uuid))]
    pub async fn handle_remote_job_creation(
        services: JobServices,
        ctx: &SiteContext,
        request: RemoteJobCreationRequest,
    ) -> PortalResult<Self> {
        match services.jobs.get_by_uuid(request.uuid).await {
            Ok(existing) => {
                warn!(
                    "作业 {} 已存在（当前状态 {}），重置为 pending",
                    existing.uuid, existing.status
                );
                services
                    .jobs
                    .update_status(request.uuid, JobStatus::Pending)
                    .await?;
            }
            Err(e) if e.is_not_found() => {
                let now = Utc::now();
                let job = Job {
                    uuid: request.uuid,
                    name: request.name.clone(),
                    description: request.description.clone(),
                    project_uuid: request.project_uuid,
                    job_type: request.job_type,
                    algorithm_type: request.algorithm_type,
                    status: JobStatus::Pending,
                    initiating_site_uuid: request.initiating_site_uuid,
                    initiating_site_name: request.initiating_site_name.clone(),
                    initiating_site_party_id: request.initiating_site_party_id,
                    request_json: request.request_json.clone(),
                    conf: request.conf_json.clone(),
                    dsl: request.dsl_json.clone(),
                    fate_job_id: String::new(),
                    fate_job_status: String::new(),
                    fate_model_id: String::new(),
                    fate_model_version: String::new(),
                    result_json: String::new(),
                    created_at: now,
                    updated_at: now,
                    finished_at: None,
                };
                services.jobs.create(&job).await?;
                info!("已创建远端作业: {}", job.entity_description());
            }
            Err(e) => return Err(e),
        }

        for remote in &request.participants {
            match services
                .participants
                .get_by_job_and_site(request.uuid, remote.site_uuid)
                .await
            {
                Ok(existing) => {
                    if existing.status != remote.status {
                        services
                            .participants
                            .update_status(request.uuid, remote.site_uuid, remote.status)
                            .await?;
                    }
                }
                Err(e) if e.is_not_found() => {
                    let now = Utc::now();
                    let participant = JobParticipant {
                        uuid: Uuid::new_v4(),
                        job_uuid: request.uuid,
                        site_uuid: remote.site_uuid,
                        site_name: remote.site_name.clone(),
                        site_party_id: remote.site_party_id,
                        site_role: remote.site_role,
                        data_uuid: remote.data_uuid,
                        data_table_name: remote.data_table_name.clone(),
                        data_table_namespace: remote.data_table_namespace.clone(),
                        data_label_name: remote.data_label_name.clone(),
                        status: remote.status,
                        created_at: now,
                        updated_at: now,
                    };
                    services.participants.create(&participant).await?;
                }
                Err(e) => return Err(e),
            }
        }

        let aggregate = Self::load(services.clone(), request.uuid).await?;

        let auto_approval = match services.projects.get_by_uuid(request.project_uuid).await {
            Ok(project) => project.auto_approval_enabled,
            Err(e) if e.is_not_found() => {
                warn!("作业 {} 所属项目 {} 在本地不存在", request.uuid, request.project_uuid);
                false
            }
            Err(e) => return Err(e),
        };
        let pending_here = aggregate
            .own_participant(ctx)
            .is_some_and(|p| p.status == JobParticipantStatus::Pending);
        if auto_approval && pending_here {
            let task_services = services.clone();
            let task_ctx = ctx.clone();
            let job_uuid = request.uuid;
            let delay = services.settings.auto_approval_delay;
            debug!("作业 {} 将在 {:?} 后自动审批", job_uuid, delay);
            services.tasks.spawn(format!("auto-approve-job-{job_uuid}"), async move {
                tokio::time::sleep(delay).await;
                let mut aggregate = JobAggregate::load(task_services, job_uuid).await?;
                aggregate.approve_job(&task_ctx).await
            });
        }

        Ok(aggregate)
    }

    fn ensure_can_respond(&self, ctx: &SiteContext) -> PortalResult<()> {
        ctx.ensure_broker_connected()?;
        if self.own_participant(ctx).is_none() {
            return Err(PortalError::JobParticipantNotFound {
                job_uuid: self.job.uuid,
                site_uuid: ctx.site_uuid(),
            });
        }
        if self.job.status != JobStatus::Pending {
            return Err(PortalError::invalid_state(format!(
                "作业 {} 当前状态为 {}，无法审批",
                self.job.uuid, self.job.status
            )));
        }
        Ok(())
    }

    /// 当前站点同意参与作业
    #[instrument(skip(self, ctx), fields(job_uuid = %self.job.uuid))]
    pub async fn approve_job(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        self.ensure_can_respond(ctx)?;
        let site_uuid = ctx.site_uuid();

        self.services
            .broker
            .send_job_response(
                self.job.uuid,
                &JobApprovalResponse {
                    site_uuid,
                    approved: true,
                },
            )
            .await?;
        self.services
            .participants
            .update_status(self.job.uuid, site_uuid, JobParticipantStatus::Approved)
            .await?;
        self.set_participant_status(site_uuid, JobParticipantStatus::Approved);

        info!("站点 {} 已同意作业 {}", ctx.site.name, self.job.uuid);
        Ok(())
    }

    /// 当前站点拒绝参与作业，作业随之进入 Rejected
    #[instrument(skip(self, ctx), fields(job_uuid = %self.job.uuid))]
    pub async fn reject_job(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        self.ensure_can_respond(ctx)?;
        let site_uuid = ctx.site_uuid();

        self.services
            .broker
            .send_job_response(
                self.job.uuid,
                &JobApprovalResponse {
                    site_uuid,
                    approved: false,
                },
            )
            .await?;
        self.services
            .participants
            .update_status(self.job.uuid, site_uuid, JobParticipantStatus::Rejected)
            .await?;
        self.set_participant_status(site_uuid, JobParticipantStatus::Rejected);
        self.services
            .jobs
            .update_status(self.job.uuid, JobStatus::Rejected)
            .await?;
        self.job.status = JobStatus::Rejected;

        info!("站点 {} 已拒绝作业 {}", ctx.site.name, self.job.uuid);
        Ok(())
    }

    fn set_participant_status(&mut self, site_uuid: Uuid, status: JobParticipantStatus) {
        if self.initiator.site_uuid == site_uuid {
            self.initiator.status = status;
        } else if let Some(participant) = self.participants.get_mut(&site_uuid) {
            participant.status = status;
        }
    }

    /// 处理某一远端参与方的审批结果
    #[instrument(skip(self, ctx), fields(job_uuid = %self.job.uuid))]
    pub async fn handle_job_approval_response(
        &mut self,
        ctx: &SiteContext,
        site_uuid: Uuid,
        approved: bool,
    ) -> PortalResult<()> {
        if approved {
            self.services
                .participants
                .update_status(self.job.uuid, site_uuid, JobParticipantStatus::Approved)
                .await?;
            self.set_participant_status(site_uuid, JobParticipantStatus::Approved);
            info!("参与方 {} 已同意作业 {}", site_uuid, self.job.uuid);

            let services = self.services.clone();
            let task_ctx = ctx.clone();
            let job_uuid = self.job.uuid;
            self.services
                .tasks
                .spawn(format!("check-job-approval-{job_uuid}"), async move {
                    JobAggregate::check_pending_participant_status(services, &task_ctx, job_uuid)
                        .await
                });
            return Ok(());
        }

        // 审批完成检查可能已在其他实例上提交了作业
        self.job.status = self.services.jobs.get_by_uuid(self.job.uuid).await?.status;
        if !self.job.status.can_transition_to(JobStatus::Rejected) {
            return Err(PortalError::invalid_state(format!(
                "作业 {} 当前状态为 {}，不能再被拒绝",
                self.job.uuid, self.job.status
            )));
        }

        // 参与方可能尚未加载到内存，直接从存储查找
        let participant = self
            .services
            .participants
            .get_by_job_and_site(self.job.uuid, site_uuid)
            .await?;
        self.services
            .participants
            .update_status(self.job.uuid, participant.site_uuid, JobParticipantStatus::Rejected)
            .await?;
        self.set_participant_status(site_uuid, JobParticipantStatus::Rejected);
        self.services
            .jobs
            .update_status(self.job.uuid, JobStatus::Rejected)
            .await?;
        self.job.status = JobStatus::Rejected;
        info!(
            "参与方 {} 拒绝了作业 {}，作业已终止",
            participant.site_name, self.job.uuid
        );

        self.broadcast_status(ctx).await;
        Ok(())
    }

    /// 审批完成检查：仅在发起站点、仅在 Pending 时执行。
    ///
    /// 每次都从存储重新读取参与方状态，全部同意后才提交到执行引擎。
    /// Pending 到 Running 的切换是条件写入，并发的检查只会有一个真正提交。
    pub async fn check_pending_participant_status(
        services: JobServices,
        ctx: &SiteContext,
        job_uuid: Uuid,
    ) -> PortalResult<()> {
        let mut aggregate = Self::load(services, job_uuid).await?;
        if !aggregate.is_initiated_by(ctx) {
            debug!("当前站点不是作业 {} 的发起方，跳过审批检查", job_uuid);
            return Ok(());
        }
        if aggregate.job.status != JobStatus::Pending {
            debug!("作业 {} 状态为 {}，跳过审批检查", job_uuid, aggregate.job.status);
            return Ok(());
        }

        let all_approved = aggregate
            .ordered_participants()
            .iter()
            .all(|p| p.status == JobParticipantStatus::Approved);
        if !all_approved {
            debug!("作业 {} 仍有参与方未同意", job_uuid);
            return Ok(());
        }

        let claimed = aggregate
            .services
            .jobs
            .compare_and_update_status(job_uuid, JobStatus::Pending, JobStatus::Running)
            .await?;
        if !claimed {
            debug!("作业 {} 已被其他检查提交", job_uuid);
            return Ok(());
        }
        aggregate.job.status = JobStatus::Running;
        info!("作业 {} 的所有参与方均已同意，提交到执行引擎", job_uuid);

        if let Err(e) = aggregate.submit_to_engine(ctx).await {
            error!("作业 {} 提交到执行引擎失败: {}", job_uuid, e);
            aggregate
                .services
                .jobs
                .update_status(job_uuid, JobStatus::Failed)
                .await?;
            aggregate.job.status = JobStatus::Failed;
            aggregate.broadcast_status(ctx).await;
            return Err(e);
        }

        aggregate.broadcast_status(ctx).await;
        Ok(())
    }

    /// 对端收到状态广播：同步参与方状态与作业状态
    #[instrument(skip(self, ctx, update), fields(job_uuid = %self.job.uuid, status = %update.status))]
    pub async fn handle_job_status_update(
        &mut self,
        ctx: &SiteContext,
        update: JobStatusUpdate,
    ) -> PortalResult<()> {
        for (site_uuid, status) in &update.participant_status_map {
            let current = if self.initiator.site_uuid == *site_uuid {
                Some(self.initiator.status)
            } else {
                self.participants.get(site_uuid).map(|p| p.status)
            };
            match current {
                Some(current) if current != *status => {
                    self.services
                        .participants
                        .update_status(self.job.uuid, *site_uuid, *status)
                        .await?;
                    self.set_participant_status(*site_uuid, *status);
                }
                Some(_) => {}
                None => warn!("状态广播中的站点 {} 不是作业 {} 的参与方", site_uuid, self.job.uuid),
            }
        }

        // 广播不保证顺序，迟到的旧状态只同步参与方
        if !self.job.status.can_transition_to(update.status) {
            warn!(
                "忽略作业 {} 的过期状态广播: {} -> {}",
                self.job.uuid, self.job.status, update.status
            );
            return Ok(());
        }

        if !update.fate_job_id.is_empty() {
            let info = portal_domain::JobEngineInfo {
                fate_job_id: update.fate_job_id.clone(),
                fate_job_status: update.fate_job_status.clone(),
                fate_model_id: update.fate_model_id.clone(),
                fate_model_version: update.fate_model_version.clone(),
            };
            self.services
                .jobs
                .update_engine_info(self.job.uuid, &info)
                .await?;
            self.job.fate_job_id = info.fate_job_id;
            self.job.fate_job_status = info.fate_job_status;
            self.job.fate_model_id = info.fate_model_id;
            self.job.fate_model_version = info.fate_model_version;
        }

        if self.job.status != update.status {
            self.services
                .jobs
                .update_status(self.job.uuid, update.status)
                .await?;
            info!(
                "作业 {} 状态更新: {} -> {}",
                self.job.uuid, self.job.status, update.status
            );
            self.job.status = update.status;

            if update.status == JobStatus::Succeeded {
                self.schedule_result_processing(ctx);
            }
        }
        Ok(())
    }

    /// 发起站点把当前作业状态广播给各参与方
    pub(super) async fn broadcast_status(&self, ctx: &SiteContext) {
        if !self.is_initiated_by(ctx) || self.participants.is_empty() || !ctx.broker_connected {
            return;
        }

        let participant_status_map = match self.services.participants.list_by_job(self.job.uuid).await
        {
            Ok(rows) => rows.into_iter().map(|p| (p.site_uuid, p.status)).collect(),
            Err(e) => {
                warn!("读取作业 {} 参与方失败，跳过状态广播: {}", self.job.uuid, e);
                return;
            }
        };
        let update = JobStatusUpdate {
            status: self.job.status,
            fate_job_id: self.job.fate_job_id.clone(),
            fate_job_status: self.job.fate_job_status.clone(),
            fate_model_id: self.job.fate_model_id.clone(),
            fate_model_version: self.job.fate_model_version.clone(),
            participant_status_map,
        };
        match self.services.broker.send_job_status(self.job.uuid, &update).await {
            Ok(()) => debug!("已广播作业 {} 状态 {}", self.job.uuid, self.job.status),
            Err(e) => warn!("广播作业 {} 状态失败: {}", self.job.uuid, e),
        }
    }
}
