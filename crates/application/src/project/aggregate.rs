use chrono::Utc;
use portal_domain::{
    Project, ProjectData, ProjectDataDismissalRequest, ProjectDataStatus, ProjectDataType,
    ProjectInvitation, ProjectInvitationRequest, ProjectInvitationStatus, ProjectParticipant,
    ProjectParticipantStatus, ProjectStatus, ProjectType, RemoteSite, SiteContext,
};
use portal_errors::{PortalError, PortalResult};
use std::collections::HashSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{to_remote_data, LocalDataAssociation, ProjectServices};

pub struct ProjectAggregate {
    pub project: Project,
    pub(super) services: ProjectServices,
}

impl ProjectAggregate {
    /// 创建由当前站点管理的本地项目
    #[instrument(skip(services, ctx, description), fields(site = %ctx.site.name))]
    pub async fn create(
        services: ProjectServices,
        ctx: &SiteContext,
        name: &str,
        description: &str,
        auto_approval_enabled: bool,
    ) -> PortalResult<Self> {
        if name.trim().is_empty() {
            return Err(PortalError::validation_error("项目名称不能为空"));
        }
        let now = Utc::now();
        let project = Project {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            auto_approval_enabled,
            project_type: ProjectType::Local,
            status: ProjectStatus::Managed,
            managing_site_uuid: ctx.site.uuid,
            managing_site_name: ctx.site.name.clone(),
            managing_site_party_id: ctx.site.party_id,
            created_at: now,
            updated_at: now,
        };
        services.projects.create(&project).await?;
        services
            .participants
            .create(&ProjectParticipant {
                uuid: Uuid::new_v4(),
                project_uuid: project.uuid,
                site_uuid: ctx.site.uuid,
                site_name: ctx.site.name.clone(),
                site_party_id: ctx.site.party_id,
                site_description: ctx.site.description.clone(),
                status: ProjectParticipantStatus::Owner,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!("已创建{}", project.entity_description());
        Ok(Self { project, services })
    }

    pub async fn load(services: ProjectServices, project_uuid: Uuid) -> PortalResult<Self> {
        let project = services.projects.get_by_uuid(project_uuid).await?;
        Ok(Self { project, services })
    }

    pub fn services(&self) -> &ProjectServices {
        &self.services
    }

    fn ensure_managing(&self, ctx: &SiteContext) -> PortalResult<()> {
        if !self.project.is_managed_by(ctx.site_uuid()) {
            return Err(PortalError::permission(format!(
                "只有管理站点可以执行该操作: {}",
                self.project.entity_description()
            )));
        }
        if self.project.status != ProjectStatus::Managed {
            return Err(PortalError::invalid_state(format!(
                "项目状态为 {}，无法执行该操作",
                self.project.status
            )));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: ProjectStatus, action: &str) -> PortalResult<()> {
        if self.project.status != expected {
            return Err(PortalError::invalid_state(format!(
                "项目 {} 当前状态为 {}，无法{}",
                self.project.uuid, self.project.status, action
            )));
        }
        Ok(())
    }

    /// 邀请站点加入项目
    ///
    /// 顺序：创建邀请记录 → 发送到代理 → 参与方置为 Pending → 邀请置为 Sent → 写入项目类型变化。
    /// 任一步失败即返回错误，已发出的代理调用不回滚。
    #[instrument(skip(self, ctx, site), fields(project_uuid = %self.project.uuid, site_uuid = %site.uuid))]
    pub async fn invite_participant(
        &mut self,
        ctx: &SiteContext,
        site: &RemoteSite,
    ) -> PortalResult<ProjectInvitation> {
        ctx.ensure_broker_connected()?;
        if self.project.project_type == ProjectType::Remote {
            return Err(PortalError::permission("不能在其他站点管理的项目中邀请参与方"));
        }
        self.ensure_managing(ctx)?;
        if site.uuid == self.project.managing_site_uuid {
            return Err(PortalError::validation_error("不能邀请管理站点自身"));
        }

        let existing = match self
            .services
            .participants
            .get_by_project_and_site(self.project.uuid, site.uuid)
            .await
        {
            Ok(participant) => Some(participant),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        if let Some(participant) = &existing {
            if matches!(
                participant.status,
                ProjectParticipantStatus::Pending | ProjectParticipantStatus::Joined
            ) {
                return Err(PortalError::invalid_state(format!(
                    "站点 {} 在项目中的状态为 {}，不能重复邀请",
                    site.name, participant.status
                )));
            }
        }

        let promote = self.project.project_type == ProjectType::Local;
        let associated_data = if promote {
            self.services
                .data
                .list_by_project(self.project.uuid)
                .await?
                .iter()
                .filter(|d| {
                    d.data_type == ProjectDataType::Local
                        && d.status == ProjectDataStatus::Associated
                })
                .map(to_remote_data)
                .collect()
        } else {
            Vec::new()
        };

        let now = Utc::now();
        let mut invitation = ProjectInvitation {
            uuid: Uuid::new_v4(),
            project_uuid: self.project.uuid,
            site_uuid: site.uuid,
            status: ProjectInvitationStatus::Created,
            created_at: now,
            updated_at: now,
        };
        self.services.invitations.create(&invitation).await?;

        let request = ProjectInvitationRequest {
            uuid: invitation.uuid,
            site_uuid: site.uuid,
            site_party_id: site.party_id,
            project_uuid: self.project.uuid,
            project_name: self.project.name.clone(),
            project_description: self.project.description.clone(),
            project_auto_approval_enabled: self.project.auto_approval_enabled,
            project_managing_site_uuid: self.project.managing_site_uuid,
            project_managing_site_name: self.project.managing_site_name.clone(),
            project_managing_site_party_id: self.project.managing_site_party_id,
            associated_data,
        };
        self.services.broker.send_invitation(&request).await?;

        match existing {
            Some(_) => {
                self.services
                    .participants
                    .update_status(self.project.uuid, site.uuid, ProjectParticipantStatus::Pending)
                    .await?
            }
            None => {
                self.services
                    .participants
                    .create(&ProjectParticipant {
                        uuid: Uuid::new_v4(),
                        project_uuid: self.project.uuid,
                        site_uuid: site.uuid,
                        site_name: site.name.clone(),
                        site_party_id: site.party_id,
                        site_description: site.description.clone(),
                        status: ProjectParticipantStatus::Pending,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?
            }
        }

        self.services
            .invitations
            .update_status(invitation.uuid, ProjectInvitationStatus::Sent)
            .await?;
        invitation.status = ProjectInvitationStatus::Sent;

        if promote {
            self.services
                .projects
                .update_type(self.project.uuid, ProjectType::FederatedLocal)
                .await?;
            self.project.project_type = ProjectType::FederatedLocal;
        }

        info!("已邀请站点 {} 加入项目 {}", site.name, self.project.name);
        Ok(invitation)
    }

    async fn latest_invitation(&self, site_uuid: Uuid) -> PortalResult<ProjectInvitation> {
        self.services
            .invitations
            .get_latest_by_project_and_site(self.project.uuid, site_uuid)
            .await
    }

    fn ensure_pending_remote(&self, ctx: &SiteContext, action: &str) -> PortalResult<()> {
        ctx.ensure_broker_connected()?;
        if self.project.project_type != ProjectType::Remote {
            return Err(PortalError::invalid_state(format!(
                "只有其他站点管理的项目可以{action}"
            )));
        }
        self.ensure_status(ProjectStatus::Pending, action)
    }

    /// 接受邀请
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn join_project(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        self.ensure_pending_remote(ctx, "加入")?;
        let invitation = self.latest_invitation(ctx.site_uuid()).await?;

        self.services.broker.accept_invitation(invitation.uuid).await?;
        self.services
            .projects
            .update_status_with_invitation(
                self.project.uuid,
                ProjectStatus::Joined,
                invitation.uuid,
                ProjectInvitationStatus::Accepted,
            )
            .await?;
        self.project.status = ProjectStatus::Joined;

        info!("已加入项目 {}", self.project.name);
        Ok(())
    }

    /// 拒绝邀请
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn reject_project(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        self.ensure_pending_remote(ctx, "拒绝")?;
        let invitation = self.latest_invitation(ctx.site_uuid()).await?;

        self.services.broker.reject_invitation(invitation.uuid).await?;
        self.services
            .projects
            .update_status_with_invitation(
                self.project.uuid,
                ProjectStatus::Rejected,
                invitation.uuid,
                ProjectInvitationStatus::Rejected,
            )
            .await?;
        self.project.status = ProjectStatus::Rejected;

        info!("已拒绝项目 {} 的邀请", self.project.name);
        Ok(())
    }

    /// 退出项目；本站点仍有关联中的数据时拒绝
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn leave_project(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        ctx.ensure_broker_connected()?;
        if self.project.project_type != ProjectType::Remote {
            return Err(PortalError::invalid_state("管理站点不能退出自己的项目"));
        }
        self.ensure_status(ProjectStatus::Joined, "退出")?;

        let still_associated = self
            .services
            .data
            .list_by_project(self.project.uuid)
            .await?
            .into_iter()
            .filter(|d| d.site_uuid == ctx.site_uuid() && d.status == ProjectDataStatus::Associated)
            .count();
        if still_associated > 0 {
            return Err(PortalError::invalid_state(format!(
                "本站点仍有 {still_associated} 个数据关联在项目中，请先取消关联"
            )));
        }

        self.services
            .broker
            .leave_project(self.project.uuid, ctx.site_uuid())
            .await?;
        self.services
            .projects
            .update_status(self.project.uuid, ProjectStatus::Left)
            .await?;
        self.project.status = ProjectStatus::Left;

        info!("已退出项目 {}", self.project.name);
        Ok(())
    }

    /// 关闭项目
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn close_project(&mut self, ctx: &SiteContext) -> PortalResult<()> {
        self.ensure_managing(ctx)?;
        if self.project.project_type == ProjectType::FederatedLocal {
            ctx.ensure_broker_connected()?;
            self.services.broker.close_project(self.project.uuid).await?;
        }
        self.services
            .projects
            .update_status(self.project.uuid, ProjectStatus::Closed)
            .await?;
        self.project.status = ProjectStatus::Closed;

        info!("已关闭{}", self.project.entity_description());
        Ok(())
    }

    /// 移除参与方：待定的邀请被撤回，已加入的站点被解除并级联解除其数据关联
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn remove_participant(
        &mut self,
        ctx: &SiteContext,
        site_uuid: Uuid,
    ) -> PortalResult<()> {
        ctx.ensure_broker_connected()?;
        self.ensure_managing(ctx)?;
        let participant = self
            .services
            .participants
            .get_by_project_and_site(self.project.uuid, site_uuid)
            .await?;

        match participant.status {
            ProjectParticipantStatus::Pending => {
                let invitation = self.latest_invitation(site_uuid).await?;
                self.services.broker.revoke_invitation(invitation.uuid).await?;
                self.services
                    .invitations
                    .update_status(invitation.uuid, ProjectInvitationStatus::Revoked)
                    .await?;
                self.services
                    .participants
                    .update_status(self.project.uuid, site_uuid, ProjectParticipantStatus::Revoked)
                    .await?;
                info!("已撤回对站点 {} 的邀请", participant.site_name);
            }
            ProjectParticipantStatus::Joined => {
                self.services
                    .broker
                    .dismiss_participant(self.project.uuid, site_uuid)
                    .await?;
                self.dismiss_site_data(site_uuid).await?;
                self.services
                    .participants
                    .update_status(
                        self.project.uuid,
                        site_uuid,
                        ProjectParticipantStatus::Dismissed,
                    )
                    .await?;
                info!("已将站点 {} 移出项目", participant.site_name);
            }
            status => {
                return Err(PortalError::invalid_state(format!(
                    "参与方 {} 状态为 {}，无法移除",
                    participant.site_name, status
                )))
            }
        }
        Ok(())
    }

    /// 将某站点所有关联中的数据置为 Dismissed
    pub(super) async fn dismiss_site_data(&self, site_uuid: Uuid) -> PortalResult<()> {
        let rows = self.services.data.list_by_project(self.project.uuid).await?;
        for data in rows
            .iter()
            .filter(|d| d.site_uuid == site_uuid && d.status == ProjectDataStatus::Associated)
        {
            self.services
                .data
                .update_status(self.project.uuid, data.data_uuid, ProjectDataStatus::Dismissed)
                .await?;
        }
        Ok(())
    }

    fn ensure_active(&self) -> PortalResult<()> {
        match self.project.status {
            ProjectStatus::Managed | ProjectStatus::Joined => Ok(()),
            status => Err(PortalError::invalid_state(format!(
                "项目 {} 状态为 {}，不能变更数据关联",
                self.project.uuid, status
            ))),
        }
    }

    /// 把本站点数据关联到项目
    #[instrument(skip(self, ctx, association), fields(project_uuid = %self.project.uuid, data_uuid = %association.data_uuid))]
    pub async fn associate_local_data(
        &mut self,
        ctx: &SiteContext,
        association: &LocalDataAssociation,
    ) -> PortalResult<ProjectData> {
        self.ensure_active()?;

        let existing = match self
            .services
            .data
            .get_by_project_and_data(self.project.uuid, association.data_uuid)
            .await
        {
            Ok(data) => Some(data),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        if existing
            .as_ref()
            .is_some_and(|d| d.status == ProjectDataStatus::Associated)
        {
            return Err(PortalError::invalid_state(format!(
                "数据 {} 已关联到项目",
                association.name
            )));
        }

        let now = Utc::now();
        let mut data = ProjectData {
            uuid: Uuid::new_v4(),
            project_uuid: self.project.uuid,
            data_uuid: association.data_uuid,
            name: association.name.clone(),
            description: association.description.clone(),
            data_type: ProjectDataType::Local,
            status: ProjectDataStatus::Associated,
            site_uuid: ctx.site.uuid,
            site_name: ctx.site.name.clone(),
            site_party_id: ctx.site.party_id,
            table_name: association.table_name.clone(),
            table_namespace: association.table_namespace.clone(),
            created_at: now,
            updated_at: now,
        };

        if self.project.project_type != ProjectType::Local {
            ctx.ensure_broker_connected()?;
            self.services
                .broker
                .associate_data(self.project.uuid, &[to_remote_data(&data)])
                .await?;
        }

        match existing {
            Some(previous) => {
                self.services
                    .data
                    .update_status(
                        self.project.uuid,
                        association.data_uuid,
                        ProjectDataStatus::Associated,
                    )
                    .await?;
                data.uuid = previous.uuid;
                data.created_at = previous.created_at;
            }
            None => self.services.data.create(&data).await?,
        }

        info!("数据 {} 已关联到项目 {}", data.name, self.project.name);
        Ok(data)
    }

    /// 取消本站点数据与项目的关联
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn dismiss_associated_local_data(
        &mut self,
        ctx: &SiteContext,
        data_uuid: Uuid,
    ) -> PortalResult<()> {
        let data = self
            .services
            .data
            .get_by_project_and_data(self.project.uuid, data_uuid)
            .await?;
        if data.data_type != ProjectDataType::Local || data.site_uuid != ctx.site_uuid() {
            return Err(PortalError::permission("只能取消本站点数据的关联"));
        }
        if data.status != ProjectDataStatus::Associated {
            return Err(PortalError::invalid_state(format!(
                "数据 {} 未处于关联状态",
                data.name
            )));
        }

        if self.project.project_type != ProjectType::Local {
            ctx.ensure_broker_connected()?;
            self.services
                .broker
                .dismiss_data(
                    self.project.uuid,
                    &ProjectDataDismissalRequest {
                        site_uuid: ctx.site_uuid(),
                        data_uuid_list: vec![data_uuid],
                    },
                )
                .await?;
        }
        self.services
            .data
            .update_status(self.project.uuid, data_uuid, ProjectDataStatus::Dismissed)
            .await?;

        info!("已取消数据 {} 与项目 {} 的关联", data.name, self.project.name);
        Ok(())
    }

    pub async fn list_data(&self) -> PortalResult<Vec<ProjectData>> {
        self.services.data.list_by_project(self.project.uuid).await
    }

    /// 列出项目参与方
    ///
    /// `all` 为真时追加 FML Manager 已知但未加入项目的站点，状态为 Unknown（不落库，不含当前站点）。
    pub async fn list_participants(
        &self,
        ctx: &SiteContext,
        all: bool,
    ) -> PortalResult<Vec<ProjectParticipant>> {
        let mut participants = self
            .services
            .participants
            .list_by_project(self.project.uuid)
            .await?;
        if !all {
            return Ok(participants);
        }
        if !ctx.broker_connected {
            warn!("未连接 FML Manager，仅返回本地参与方");
            return Ok(participants);
        }

        let known: HashSet<Uuid> = participants.iter().map(|p| p.site_uuid).collect();
        let now = Utc::now();
        for site in self.services.broker.list_sites().await? {
            if site.uuid == ctx.site_uuid() || known.contains(&site.uuid) {
                continue;
            }
            participants.push(ProjectParticipant {
                uuid: Uuid::nil(),
                project_uuid: self.project.uuid,
                site_uuid: site.uuid,
                site_name: site.name,
                site_party_id: site.party_id,
                site_description: site.description,
                status: ProjectParticipantStatus::Unknown,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(participants)
    }
}
