//! Mock implementations of the broker and execution engine
//!
//! Every call is recorded in order. Individual operations can be made to fail
//! by name, which is how the tests exercise the compensation paths.

use async_trait::async_trait;
use portal_domain::{
    BrokerClient, DownloadRequest, EngineJobInfo, EngineJobStatus, EngineSubmission,
    JobApprovalResponse, JobParticipantRole, JobRunner, JobStatusUpdate,
    ProjectDataDismissalRequest, ProjectInvitationRequest, RemoteJobCreationRequest,
    RemoteProject, RemoteProjectData, RemoteProjectParticipant, RemoteSite, SiteRegistration,
};
use portal_errors::{PortalError, PortalResult};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A recorded broker call
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    RegisterSite(Uuid),
    UnregisterSite(Uuid),
    ListSites,
    SendInvitation(ProjectInvitationRequest),
    AcceptInvitation(Uuid),
    RejectInvitation(Uuid),
    RevokeInvitation(Uuid),
    CloseProject(Uuid),
    LeaveProject { project_uuid: Uuid, site_uuid: Uuid },
    DismissParticipant { project_uuid: Uuid, site_uuid: Uuid },
    AssociateData { project_uuid: Uuid, data: Vec<RemoteProjectData> },
    DismissData { project_uuid: Uuid, request: ProjectDataDismissalRequest },
    ListProjects(Uuid),
    ListProjectData(Uuid),
    ListProjectParticipants(Uuid),
    CreateJob(RemoteJobCreationRequest),
    SendJobResponse { job_uuid: Uuid, response: JobApprovalResponse },
    SendJobStatus { job_uuid: Uuid, update: JobStatusUpdate },
}

#[derive(Debug, Default)]
struct BrokerState {
    calls: Vec<BrokerCall>,
    failing: HashSet<&'static str>,
    sites: Vec<RemoteSite>,
    projects: HashMap<Uuid, RemoteProject>,
    project_data: HashMap<Uuid, HashMap<Uuid, RemoteProjectData>>,
    project_participants: HashMap<Uuid, HashMap<Uuid, RemoteProjectParticipant>>,
}

/// Mock implementation of BrokerClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockBrokerClient {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBrokerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named operation (e.g. `"create_job"`) return a remote error
    pub fn fail_on(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.state.lock().unwrap().failing.remove(operation);
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn set_sites(&self, sites: Vec<RemoteSite>) {
        self.state.lock().unwrap().sites = sites;
    }

    pub fn set_projects(&self, projects: Vec<RemoteProject>) {
        self.state.lock().unwrap().projects =
            projects.into_iter().map(|p| (p.uuid, p)).collect();
    }

    pub fn set_project_data(&self, project_uuid: Uuid, data: Vec<RemoteProjectData>) {
        self.state
            .lock()
            .unwrap()
            .project_data
            .insert(project_uuid, data.into_iter().map(|d| (d.data_uuid, d)).collect());
    }

    pub fn set_project_participants(
        &self,
        project_uuid: Uuid,
        participants: Vec<RemoteProjectParticipant>,
    ) {
        self.state.lock().unwrap().project_participants.insert(
            project_uuid,
            participants.into_iter().map(|p| (p.site_uuid, p)).collect(),
        );
    }

    pub fn job_status_updates(&self, job_uuid: Uuid) -> Vec<JobStatusUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BrokerCall::SendJobStatus { job_uuid: uuid, update } if uuid == job_uuid => {
                    Some(update)
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, operation: &'static str, call: BrokerCall) -> PortalResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(operation) {
            return Err(PortalError::remote(
                "FML Manager",
                format!("{operation}: HTTP 500 Internal Server Error"),
                r#"{"code":500,"message":"mock failure"}"#,
            ));
        }
        state.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl BrokerClient for MockBrokerClient {
    async fn register_site(&self, site: &SiteRegistration) -> PortalResult<()> {
        self.record("register_site", BrokerCall::RegisterSite(site.uuid))
    }

    async fn unregister_site(&self, site_uuid: Uuid) -> PortalResult<()> {
        self.record("unregister_site", BrokerCall::UnregisterSite(site_uuid))
    }

    async fn list_sites(&self) -> PortalResult<Vec<RemoteSite>> {
        self.record("list_sites", BrokerCall::ListSites)?;
        Ok(self.state.lock().unwrap().sites.clone())
    }

    async fn send_invitation(&self, request: &ProjectInvitationRequest) -> PortalResult<()> {
        self.record("send_invitation", BrokerCall::SendInvitation(request.clone()))
    }

    async fn accept_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()> {
        self.record("accept_invitation", BrokerCall::AcceptInvitation(invitation_uuid))
    }

    async fn reject_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()> {
        self.record("reject_invitation", BrokerCall::RejectInvitation(invitation_uuid))
    }

    async fn revoke_invitation(&self, invitation_uuid: Uuid) -> PortalResult<()> {
        self.record("revoke_invitation", BrokerCall::RevokeInvitation(invitation_uuid))
    }

    async fn close_project(&self, project_uuid: Uuid) -> PortalResult<()> {
        self.record("close_project", BrokerCall::CloseProject(project_uuid))
    }

    async fn leave_project(&self, project_uuid: Uuid, site_uuid: Uuid) -> PortalResult<()> {
        self.record(
            "leave_project",
            BrokerCall::LeaveProject {
                project_uuid,
                site_uuid,
            },
        )
    }

    async fn dismiss_participant(&self, project_uuid: Uuid, site_uuid: Uuid) -> PortalResult<()> {
        self.record(
            "dismiss_participant",
            BrokerCall::DismissParticipant {
                project_uuid,
                site_uuid,
            },
        )
    }

    async fn associate_data(
        &self,
        project_uuid: Uuid,
        data: &[RemoteProjectData],
    ) -> PortalResult<()> {
        self.record(
            "associate_data",
            BrokerCall::AssociateData {
                project_uuid,
                data: data.to_vec(),
            },
        )
    }

    async fn dismiss_data(
        &self,
        project_uuid: Uuid,
        request: &ProjectDataDismissalRequest,
    ) -> PortalResult<()> {
        self.record(
            "dismiss_data",
            BrokerCall::DismissData {
                project_uuid,
                request: request.clone(),
            },
        )
    }

    async fn list_projects(&self, participant: Uuid) -> PortalResult<HashMap<Uuid, RemoteProject>> {
        self.record("list_projects", BrokerCall::ListProjects(participant))?;
        Ok(self.state.lock().unwrap().projects.clone())
    }

    async fn list_project_data(
        &self,
        project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectData>> {
        self.record("list_project_data", BrokerCall::ListProjectData(project_uuid))?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .project_data
            .get(&project_uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_project_participants(
        &self,
        project_uuid: Uuid,
    ) -> PortalResult<HashMap<Uuid, RemoteProjectParticipant>> {
        self.record(
            "list_project_participants",
            BrokerCall::ListProjectParticipants(project_uuid),
        )?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .project_participants
            .get(&project_uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_job(&self, request: &RemoteJobCreationRequest) -> PortalResult<()> {
        self.record("create_job", BrokerCall::CreateJob(request.clone()))
    }

    async fn send_job_response(
        &self,
        job_uuid: Uuid,
        response: &JobApprovalResponse,
    ) -> PortalResult<()> {
        self.record(
            "send_job_response",
            BrokerCall::SendJobResponse {
                job_uuid,
                response: response.clone(),
            },
        )
    }

    async fn send_job_status(&self, job_uuid: Uuid, update: &JobStatusUpdate) -> PortalResult<()> {
        self.record(
            "send_job_status",
            BrokerCall::SendJobStatus {
                job_uuid,
                update: update.clone(),
            },
        )
    }
}

#[derive(Debug)]
struct RunnerState {
    submissions: Vec<(String, String)>,
    queries: Vec<(String, JobParticipantRole, u64)>,
    result_queries: Vec<(String, JobParticipantRole, u64, String)>,
    status: EngineJobStatus,
    fail_submit: bool,
    next_id: u64,
}

/// Mock implementation of JobRunner for testing
///
/// Submitted jobs report `status` on every query (defaults to `Success`).
#[derive(Debug, Clone)]
pub struct MockJobRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl Default for MockJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobRunner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RunnerState {
                submissions: Vec::new(),
                queries: Vec::new(),
                result_queries: Vec::new(),
                status: EngineJobStatus::Success,
                fail_submit: false,
                next_id: 1,
            })),
        }
    }

    pub fn set_status(&self, status: EngineJobStatus) {
        self.state.lock().unwrap().status = status;
    }

    pub fn fail_submit(&self, fail: bool) {
        self.state.lock().unwrap().fail_submit = fail;
    }

    pub fn submissions(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().unwrap().submissions.len()
    }

    pub fn queries(&self) -> Vec<(String, JobParticipantRole, u64)> {
        self.state.lock().unwrap().queries.clone()
    }

    /// (job_id, role, party_id, component) of every metric/summary lookup
    pub fn result_queries(&self) -> Vec<(String, JobParticipantRole, u64, String)> {
        self.state.lock().unwrap().result_queries.clone()
    }
}

#[async_trait]
impl JobRunner for MockJobRunner {
    async fn submit_job(&self, conf: &str, dsl: &str) -> PortalResult<EngineSubmission> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submit {
            return Err(PortalError::remote(
                "FATE-Flow",
                "提交作业: retcode 100, mock failure",
                "{}",
            ));
        }
        state.submissions.push((conf.to_string(), dsl.to_string()));
        let id = state.next_id;
        state.next_id += 1;
        Ok(EngineSubmission {
            job_id: format!("20240101000000{id:06}"),
            model_id: format!("model-{id}"),
            model_version: format!("version-{id}"),
        })
    }

    async fn query_job(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
    ) -> PortalResult<EngineJobInfo> {
        let mut state = self.state.lock().unwrap();
        state.queries.push((job_id.to_string(), role, party_id));
        Ok(EngineJobInfo {
            status: state.status,
            raw_status: format!("{:?}", state.status).to_lowercase(),
        })
    }

    async fn component_metrics(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> PortalResult<serde_json::Value> {
        self.state.lock().unwrap().result_queries.push((
            job_id.to_string(),
            role,
            party_id,
            component.to_string(),
        ));
        Ok(serde_json::json!({ "train": { "auc": 0.87 } }))
    }

    async fn component_output_summary(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> PortalResult<serde_json::Value> {
        self.state.lock().unwrap().result_queries.push((
            job_id.to_string(),
            role,
            party_id,
            component.to_string(),
        ));
        Ok(serde_json::json!({ "count": 100 }))
    }

    fn download_request(
        &self,
        job_id: &str,
        role: JobParticipantRole,
        party_id: u64,
        component: &str,
    ) -> DownloadRequest {
        DownloadRequest {
            url: "http://fate-flow.test/v1/tracking/component/output/data/download".to_string(),
            method: "POST".to_string(),
            body: serde_json::json!({
                "job_id": job_id,
                "role": role.as_str(),
                "party_id": party_id,
                "component_name": component,
            }),
        }
    }
}
