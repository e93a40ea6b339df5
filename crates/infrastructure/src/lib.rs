pub mod clients;
pub mod database;
pub mod memory;
pub mod repositories;

pub use clients::{BrokerHttpClient, FateFlowClient, OfflineBrokerClient};
pub use database::create_pool;
pub use memory::MemoryStore;
pub use repositories::Repositories;
