//! 与 FML Manager 的对账
//!
//! 代理的视图是权威值。每次修正都记一条 warn 日志，因为出现分歧说明曾经漏掉了事件。
//! 对账只会把本地记录推向代理的取值，可以与正常流量并发执行。

use chrono::Utc;
use portal_domain::{
    Project, ProjectDataStatus, ProjectDataType, ProjectParticipant, ProjectParticipantStatus,
    ProjectStatus, ProjectType, RemoteProject, SiteContext,
};
use portal_errors::PortalResult;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::inbound::remote_data_row;
use super::{ProjectAggregate, ProjectServices};

/// 同步结果中本地被修正或新建的记录数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub created: usize,
    pub corrected: usize,
}

impl SyncOutcome {
    pub fn changed(&self) -> usize {
        self.created + self.corrected
    }
}

impl ProjectAggregate {
    /// 同步项目的数据关联
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn sync_data_association(&mut self, ctx: &SiteContext) -> PortalResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        if self.project.project_type == ProjectType::Local {
            return Ok(outcome);
        }
        ctx.ensure_broker_connected()?;

        let remote = self.services.broker.list_project_data(self.project.uuid).await?;
        let local = self.services.data.list_by_project(self.project.uuid).await?;

        for data in &local {
            let expected = remote
                .get(&data.data_uuid)
                .map(|r| r.status)
                .unwrap_or(ProjectDataStatus::Dismissed);
            if data.status != expected {
                warn!(
                    "数据 {} 在本地为 {}，FML Manager 为 {}，已修正",
                    data.data_uuid, data.status, expected
                );
                self.services
                    .data
                    .update_status(self.project.uuid, data.data_uuid, expected)
                    .await?;
                outcome.corrected += 1;
            }
        }

        for (data_uuid, remote_data) in &remote {
            if local.iter().any(|d| d.data_uuid == *data_uuid) {
                continue;
            }
            let data_type = if remote_data.site_uuid == ctx.site_uuid() {
                ProjectDataType::Local
            } else {
                ProjectDataType::Remote
            };
            warn!("本地缺少数据关联 {}，按 FML Manager 补建", data_uuid);
            self.services
                .data
                .create(&remote_data_row(self.project.uuid, remote_data, data_type))
                .await?;
            outcome.created += 1;
        }

        debug!("项目 {} 数据关联同步完成: {:?}", self.project.uuid, outcome);
        Ok(outcome)
    }

    /// 同步项目参与方
    ///
    /// 非管理站点无法判断不是自己发出的邀请，代理报告的 Pending 在这里一律视为 Dismissed。
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn sync_participant(&mut self, ctx: &SiteContext) -> PortalResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        if self.project.project_type == ProjectType::Local {
            return Ok(outcome);
        }
        ctx.ensure_broker_connected()?;
        let managing = self.project.is_managed_by(ctx.site_uuid());

        let remote = self
            .services
            .broker
            .list_project_participants(self.project.uuid)
            .await?;
        let local = self
            .services
            .participants
            .list_by_project(self.project.uuid)
            .await?;

        let coerce = |status: ProjectParticipantStatus| {
            if !managing && status == ProjectParticipantStatus::Pending {
                ProjectParticipantStatus::Dismissed
            } else {
                status
            }
        };

        for participant in &local {
            let expected = match remote.get(&participant.site_uuid) {
                Some(r) => coerce(r.status),
                None if participant.status == ProjectParticipantStatus::Owner => continue,
                None => ProjectParticipantStatus::Dismissed,
            };
            if participant.status != expected {
                warn!(
                    "参与方 {} 在本地为 {}，FML Manager 为 {}，已修正",
                    participant.site_name, participant.status, expected
                );
                self.services
                    .participants
                    .update_status(self.project.uuid, participant.site_uuid, expected)
                    .await?;
                outcome.corrected += 1;
            }
        }

        let now = Utc::now();
        for (site_uuid, remote_participant) in &remote {
            if *site_uuid == ctx.site_uuid() || local.iter().any(|p| p.site_uuid == *site_uuid) {
                continue;
            }
            warn!(
                "本地缺少参与方 {}，按 FML Manager 补建",
                remote_participant.site_name
            );
            self.services
                .participants
                .create(&ProjectParticipant {
                    uuid: Uuid::new_v4(),
                    project_uuid: self.project.uuid,
                    site_uuid: *site_uuid,
                    site_name: remote_participant.site_name.clone(),
                    site_party_id: remote_participant.site_party_id,
                    site_description: remote_participant.site_description.clone(),
                    status: coerce(remote_participant.status),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
            outcome.created += 1;
        }

        debug!("项目 {} 参与方同步完成: {:?}", self.project.uuid, outcome);
        Ok(outcome)
    }
}

/// 代理报告的终止状态对应的本地项目状态
fn terminal_status(remote: &RemoteProject) -> Option<ProjectStatus> {
    if remote.status == ProjectStatus::Closed {
        return Some(ProjectStatus::Closed);
    }
    match remote.participant_status {
        ProjectParticipantStatus::Dismissed | ProjectParticipantStatus::Revoked => {
            Some(ProjectStatus::Dismissed)
        }
        ProjectParticipantStatus::Left => Some(ProjectStatus::Left),
        _ => None,
    }
}

/// 同步本站点参与的远端项目列表
#[instrument(skip(services, ctx), fields(site = %ctx.site.name))]
pub async fn sync_projects(services: &ProjectServices, ctx: &SiteContext) -> PortalResult<SyncOutcome> {
    ctx.ensure_broker_connected()?;
    let mut outcome = SyncOutcome::default();

    let remote = services.broker.list_projects(ctx.site_uuid()).await?;
    let local: HashMap<Uuid, Project> = services
        .projects
        .list_all()
        .await?
        .into_iter()
        .map(|p| (p.uuid, p))
        .collect();

    for (project_uuid, remote_project) in &remote {
        if remote_project.managing_site_uuid == ctx.site_uuid() {
            continue;
        }
        match local.get(project_uuid) {
            Some(project) if project.project_type == ProjectType::Remote => {
                let Some(expected) = terminal_status(remote_project) else {
                    continue;
                };
                if project.status != expected {
                    warn!(
                        "项目 {} 在本地为 {}，FML Manager 为 {}，已修正",
                        project.name, project.status, expected
                    );
                    services.projects.update_status(project.uuid, expected).await?;
                    outcome.corrected += 1;
                }
            }
            Some(_) => {}
            None if remote_project.participant_status == ProjectParticipantStatus::Joined
                && remote_project.status != ProjectStatus::Closed =>
            {
                warn!("本地缺少已加入的项目 {}，按 FML Manager 补建", remote_project.name);
                create_joined_project(services, remote_project).await?;
                outcome.created += 1;
            }
            None => {}
        }
    }

    for project in local.values() {
        if project.project_type == ProjectType::Remote
            && project.status == ProjectStatus::Joined
            && !remote.contains_key(&project.uuid)
        {
            warn!("FML Manager 中已没有项目 {}，标记为已解除", project.name);
            services
                .projects
                .update_status(project.uuid, ProjectStatus::Dismissed)
                .await?;
            outcome.corrected += 1;
        }
    }

    info!("项目列表同步完成: 新建 {}, 修正 {}", outcome.created, outcome.corrected);
    Ok(outcome)
}

async fn create_joined_project(
    services: &ProjectServices,
    remote: &RemoteProject,
) -> PortalResult<()> {
    let now = Utc::now();
    let project = Project {
        uuid: remote.uuid,
        name: remote.name.clone(),
        description: remote.description.clone(),
        auto_approval_enabled: remote.auto_approval_enabled,
        project_type: ProjectType::Remote,
        status: ProjectStatus::Joined,
        managing_site_uuid: remote.managing_site_uuid,
        managing_site_name: remote.managing_site_name.clone(),
        managing_site_party_id: remote.managing_site_party_id,
        created_at: now,
        updated_at: now,
    };
    services.projects.create(&project).await?;
    services
        .participants
        .create(&ProjectParticipant {
            uuid: Uuid::new_v4(),
            project_uuid: project.uuid,
            site_uuid: project.managing_site_uuid,
            site_name: project.managing_site_name.clone(),
            site_party_id: project.managing_site_party_id,
            site_description: String::new(),
            status: ProjectParticipantStatus::Owner,
            created_at: now,
            updated_at: now,
        })
        .await?;
    Ok(())
}
