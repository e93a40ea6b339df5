//! # Site Portal Testing Utils
//!
//! 各 crate 共用的测试替身与测试数据构造器：
//!
//! - **Mock 客户端**：记录调用的 FML Manager 客户端与执行引擎，可按方法注入失败
//! - **构造器**：带合理默认值的站点、作业、项目实体
//!
//! ```toml
//! [dev-dependencies]
//! portal-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
