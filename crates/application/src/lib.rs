//! # Site Portal Application
//!
//! 站点门户的应用层：作业聚合、项目聚合、对账服务与后台任务执行器。
//! 聚合的每个操作都显式接收 [`SiteContext`](portal_domain::SiteContext)，
//! 仓储与外部协作方通过 `*Services` 注入。

pub mod background;
pub mod job;
pub mod project;
pub mod reconciliation;

pub use background::BackgroundTasks;
pub use job::{JobAggregate, JobDataRef, JobServices, JobSettings, JobSubmissionRequest};
pub use project::{LocalDataAssociation, ProjectAggregate, ProjectServices, SyncOutcome};
pub use reconciliation::{ReconciliationReport, ReconciliationService, RefreshReport};
