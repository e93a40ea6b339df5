pub mod sqlite_job_repository;
pub mod sqlite_project_repository;

pub use sqlite_job_repository::{SqliteJobParticipantRepository, SqliteJobRepository};
pub use sqlite_project_repository::{
    SqliteProjectDataRepository, SqliteProjectInvitationRepository,
    SqliteProjectParticipantRepository, SqliteProjectRepository,
};
