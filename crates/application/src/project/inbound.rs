//! 由其他站点经 FML Manager 转发而来的项目事件
//!
//! 事件可能重复投递，所有处理都是幂等的。

use chrono::Utc;
use portal_domain::{
    Project, ProjectData, ProjectDataStatus, ProjectDataType, ProjectInvitation,
    ProjectInvitationRequest, ProjectInvitationStatus, ProjectParticipant,
    ProjectParticipantStatus, ProjectStatus, ProjectType, RemoteProjectData, SiteContext,
};
use portal_errors::{PortalError, PortalResult};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{ProjectAggregate, ProjectServices};

impl ProjectAggregate {
    /// 收到其他站点发来的项目邀请
    ///
    /// 项目被置为 Remote/Pending，清除该项目残留的参与方与数据记录，邀请记为 Sent。
    #[instrument(skip(services, ctx, request), fields(project_uuid = %request.project_uuid, invitation_uuid = %request.uuid))]
    pub async fn process_invitation(
        services: ProjectServices,
        ctx: &SiteContext,
        request: &ProjectInvitationRequest,
    ) -> PortalResult<Self> {
        if request.site_uuid != ctx.site_uuid() {
            return Err(PortalError::validation_error(format!(
                "邀请的目标站点 {} 不是当前站点",
                request.site_uuid
            )));
        }
        if request.project_managing_site_uuid == ctx.site_uuid() {
            return Err(PortalError::validation_error("不能接收自己管理的项目的邀请"));
        }

        let now = Utc::now();
        let project = match services.projects.get_by_uuid(request.project_uuid).await {
            Ok(mut project) => {
                if project.project_type != ProjectType::Remote {
                    return Err(PortalError::invalid_state(format!(
                        "{} 由本站点管理，不能作为邀请接收",
                        project.entity_description()
                    )));
                }
                services
                    .projects
                    .update_status(project.uuid, ProjectStatus::Pending)
                    .await?;
                project.status = ProjectStatus::Pending;
                project
            }
            Err(e) if e.is_not_found() => {
                let project = Project {
                    uuid: request.project_uuid,
                    name: request.project_name.clone(),
                    description: request.project_description.clone(),
                    auto_approval_enabled: request.project_auto_approval_enabled,
                    project_type: ProjectType::Remote,
                    status: ProjectStatus::Pending,
                    managing_site_uuid: request.project_managing_site_uuid,
                    managing_site_name: request.project_managing_site_name.clone(),
                    managing_site_party_id: request.project_managing_site_party_id,
                    created_at: now,
                    updated_at: now,
                };
                services.projects.create(&project).await?;
                project
            }
            Err(e) => return Err(e),
        };

        services.participants.delete_by_project(project.uuid).await?;
        services.data.delete_by_project(project.uuid).await?;

        match services.invitations.get_by_uuid(request.uuid).await {
            Ok(_) => {
                services
                    .invitations
                    .update_status(request.uuid, ProjectInvitationStatus::Sent)
                    .await?
            }
            Err(e) if e.is_not_found() => {
                services
                    .invitations
                    .create(&ProjectInvitation {
                        uuid: request.uuid,
                        project_uuid: project.uuid,
                        site_uuid: request.site_uuid,
                        status: ProjectInvitationStatus::Sent,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?
            }
            Err(e) => return Err(e),
        }

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
        for data in &request.associated_data {
            services
                .data
                .create(&remote_data_row(project.uuid, data, ProjectDataType::Remote))
                .await?;
        }

        info!(
            "收到站点 {} 的项目邀请: {}",
            request.project_managing_site_name,
            project.entity_description()
        );
        Ok(Self { project, services })
    }

    /// 管理站点收到被邀请方的答复
    #[instrument(skip(self), fields(project_uuid = %self.project.uuid))]
    pub async fn process_invitation_response(
        &mut self,
        site_uuid: Uuid,
        accepted: bool,
    ) -> PortalResult<()> {
        let (participant_status, invitation_status) = if accepted {
            (ProjectParticipantStatus::Joined, ProjectInvitationStatus::Accepted)
        } else {
            (ProjectParticipantStatus::Rejected, ProjectInvitationStatus::Rejected)
        };
        let invitation = self
            .services
            .invitations
            .get_latest_by_project_and_site(self.project.uuid, site_uuid)
            .await?;
        self.services
            .invitations
            .update_status(invitation.uuid, invitation_status)
            .await?;
        self.services
            .participants
            .update_status(self.project.uuid, site_uuid, participant_status)
            .await?;

        info!("站点 {} 对项目邀请的答复: {}", site_uuid, participant_status);
        Ok(())
    }

    /// 管理站点撤回了邀请：删除本地整个项目
    #[instrument(skip(services))]
    pub async fn process_invitation_revocation(
        services: ProjectServices,
        invitation_uuid: Uuid,
    ) -> PortalResult<()> {
        let invitation = match services.invitations.get_by_uuid(invitation_uuid).await {
            Ok(invitation) => invitation,
            Err(e) if e.is_not_found() => {
                debug!("邀请 {} 不存在，忽略撤回事件", invitation_uuid);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        services.projects.purge(invitation.project_uuid).await?;
        info!("邀请 {} 已被撤回，项目 {} 已删除", invitation_uuid, invitation.project_uuid);
        Ok(())
    }

    /// 其他站点退出项目
    #[instrument(skip(self), fields(project_uuid = %self.project.uuid))]
    pub async fn process_participant_leaving(&mut self, site_uuid: Uuid) -> PortalResult<()> {
        self.services
            .participants
            .update_status(self.project.uuid, site_uuid, ProjectParticipantStatus::Left)
            .await?;
        self.dismiss_site_data(site_uuid).await?;
        info!("站点 {} 已退出项目 {}", site_uuid, self.project.name);
        Ok(())
    }

    /// 管理站点解除了某个参与方；被解除的可能是当前站点
    #[instrument(skip(self, ctx), fields(project_uuid = %self.project.uuid))]
    pub async fn process_participant_dismissal(
        &mut self,
        ctx: &SiteContext,
        site_uuid: Uuid,
    ) -> PortalResult<()> {
        if site_uuid == ctx.site_uuid() {
            self.services
                .projects
                .update_status(self.project.uuid, ProjectStatus::Dismissed)
                .await?;
            self.project.status = ProjectStatus::Dismissed;
            for data in self.list_data().await? {
                if data.status == ProjectDataStatus::Associated {
                    self.services
                        .data
                        .update_status(self.project.uuid, data.data_uuid, ProjectDataStatus::Dismissed)
                        .await?;
                }
            }
            warn!("当前站点已被移出项目 {}", self.project.name);
            return Ok(());
        }

        self.services
            .participants
            .update_status(self.project.uuid, site_uuid, ProjectParticipantStatus::Dismissed)
            .await?;
        self.dismiss_site_data(site_uuid).await?;
        info!("站点 {} 已被移出项目 {}", site_uuid, self.project.name);
        Ok(())
    }

    /// 管理站点关闭了项目
    pub async fn process_project_closing(&mut self) -> PortalResult<()> {
        self.services
            .projects
            .update_status(self.project.uuid, ProjectStatus::Closed)
            .await?;
        self.project.status = ProjectStatus::Closed;
        info!("项目 {} 已被管理站点关闭", self.project.name);
        Ok(())
    }

    /// 其他站点关联了数据
    #[instrument(skip(self, ctx, data), fields(project_uuid = %self.project.uuid, count = data.len()))]
    pub async fn process_remote_data_association(
        &mut self,
        ctx: &SiteContext,
        data: &[RemoteProjectData],
    ) -> PortalResult<()> {
        for remote in data {
            match self
                .services
                .data
                .get_by_project_and_data(self.project.uuid, remote.data_uuid)
                .await
            {
                Ok(existing) => {
                    if existing.status != ProjectDataStatus::Associated {
                        self.services
                            .data
                            .update_status(
                                self.project.uuid,
                                remote.data_uuid,
                                ProjectDataStatus::Associated,
                            )
                            .await?;
                    }
                }
                Err(e) if e.is_not_found() => {
                    let data_type = if remote.site_uuid == ctx.site_uuid() {
                        ProjectDataType::Local
                    } else {
                        ProjectDataType::Remote
                    };
                    let mut row = remote_data_row(self.project.uuid, remote, data_type);
                    row.status = ProjectDataStatus::Associated;
                    self.services.data.create(&row).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// 其他站点取消了数据关联
    #[instrument(skip(self, data_uuids), fields(project_uuid = %self.project.uuid))]
    pub async fn process_remote_data_dismissal(&mut self, data_uuids: &[Uuid]) -> PortalResult<()> {
        for data_uuid in data_uuids {
            match self
                .services
                .data
                .update_status(self.project.uuid, *data_uuid, ProjectDataStatus::Dismissed)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!("数据 {} 不在项目 {} 中，忽略", data_uuid, self.project.uuid)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

pub(super) fn remote_data_row(
    project_uuid: Uuid,
    remote: &RemoteProjectData,
    data_type: ProjectDataType,
) -> ProjectData {
    let now = Utc::now();
    ProjectData {
        uuid: Uuid::new_v4(),
        project_uuid,
        data_uuid: remote.data_uuid,
        name: remote.name.clone(),
        description: remote.description.clone(),
        data_type,
        status: remote.status,
        site_uuid: remote.site_uuid,
        site_name: remote.site_name.clone(),
        site_party_id: remote.site_party_id,
        table_name: remote.table_name.clone(),
        table_namespace: remote.table_namespace.clone(),
        created_at: now,
        updated_at: now,
    }
}
