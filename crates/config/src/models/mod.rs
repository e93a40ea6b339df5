pub mod app_config;
pub mod coordination;
pub mod database;
pub mod logging;
pub mod services;
pub mod site;

pub use app_config::*;
pub use coordination::*;
pub use database::*;
pub use logging::*;
pub use services::*;
pub use site::*;
