pub mod mapping;
pub mod schema;
pub mod sqlite;

pub use sqlite::{
    SqliteJobParticipantRepository, SqliteJobRepository, SqliteProjectDataRepository,
    SqliteProjectInvitationRepository, SqliteProjectParticipantRepository,
    SqliteProjectRepository,
};

use portal_config::DatabaseConfig;
use portal_errors::{PortalError, PortalResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// 创建 SQLite 连接池并初始化表结构
pub async fn create_pool(config: &DatabaseConfig) -> PortalResult<SqlitePool> {
    info!("创建SQLite数据库连接池: {}", config.url);

    let in_memory = config.url.contains(":memory:");
    let mut connect_options = SqliteConnectOptions::from_str(&config.url)
        .map_err(|e| PortalError::Configuration(format!("解析数据库URL失败: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);
    if !in_memory {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    // 内存库每个连接各自独立，只能使用单连接
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    let pool = pool_options
        .connect_with(connect_options)
        .await
        .map_err(|e| PortalError::database_error(format!("创建数据库连接池失败: {e}")))?;

    schema::bootstrap(&pool).await?;
    info!("✅ 数据库连接池创建完成");
    Ok(pool)
}
