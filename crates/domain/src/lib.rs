pub mod context;
pub mod entities;
pub mod job_spec;
pub mod ports;
pub mod repositories;

pub use context::*;
pub use entities::*;
pub use job_spec::{generate_job_spec, AlgorithmOptions, JobSpec, ModelRef, PartyInfo};
pub use ports::*;
pub use repositories::*;
pub use portal_errors::{PortalError, PortalResult};
