use portal_errors::{PortalError, PortalResult};
use sqlx::SqlitePool;
use tracing::info;

const STATEMENTS: &[(&str, &str)] = &[
    (
        "作业表",
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            project_uuid TEXT NOT NULL,
            job_type TEXT NOT NULL,
            algorithm_type TEXT,
            status TEXT NOT NULL,
            initiating_site_uuid TEXT NOT NULL,
            initiating_site_name TEXT NOT NULL,
            initiating_site_party_id INTEGER NOT NULL,
            request_json TEXT NOT NULL DEFAULT '',
            conf TEXT NOT NULL DEFAULT '',
            dsl TEXT NOT NULL DEFAULT '',
            fate_job_id TEXT NOT NULL DEFAULT '',
            fate_job_status TEXT NOT NULL DEFAULT '',
            fate_model_id TEXT NOT NULL DEFAULT '',
            fate_model_version TEXT NOT NULL DEFAULT '',
            result_json TEXT NOT NULL DEFAULT '',
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            finished_at DATETIME
        )
        "#,
    ),
    (
        "作业参与方表",
        r#"
        CREATE TABLE IF NOT EXISTS job_participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            job_uuid TEXT NOT NULL,
            site_uuid TEXT NOT NULL,
            site_name TEXT NOT NULL,
            site_party_id INTEGER NOT NULL,
            site_role TEXT NOT NULL,
            data_uuid TEXT NOT NULL,
            data_table_name TEXT NOT NULL,
            data_table_namespace TEXT NOT NULL,
            data_label_name TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            UNIQUE (job_uuid, site_uuid)
        )
        "#,
    ),
    (
        "项目表",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            auto_approval_enabled INTEGER NOT NULL DEFAULT 0,
            project_type TEXT NOT NULL,
            status TEXT NOT NULL,
            managing_site_uuid TEXT NOT NULL,
            managing_site_name TEXT NOT NULL,
            managing_site_party_id INTEGER NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "项目参与方表",
        r#"
        CREATE TABLE IF NOT EXISTS project_participants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            project_uuid TEXT NOT NULL,
            site_uuid TEXT NOT NULL,
            site_name TEXT NOT NULL,
            site_party_id INTEGER NOT NULL,
            site_description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            UNIQUE (project_uuid, site_uuid)
        )
        "#,
    ),
    (
        "项目邀请表",
        r#"
        CREATE TABLE IF NOT EXISTS project_invitations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            project_uuid TEXT NOT NULL,
            site_uuid TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL
        )
        "#,
    ),
    (
        "项目数据表",
        r#"
        CREATE TABLE IF NOT EXISTS project_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            project_uuid TEXT NOT NULL,
            data_uuid TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            data_type TEXT NOT NULL,
            status TEXT NOT NULL,
            site_uuid TEXT NOT NULL,
            site_name TEXT NOT NULL,
            site_party_id INTEGER NOT NULL,
            table_name TEXT NOT NULL,
            table_namespace TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            UNIQUE (project_uuid, data_uuid)
        )
        "#,
    ),
    (
        "作业状态索引",
        "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)",
    ),
    (
        "项目邀请索引",
        "CREATE INDEX IF NOT EXISTS idx_project_invitations_project_site ON project_invitations(project_uuid, site_uuid)",
    ),
];

/// 创建表结构，可重复执行
pub async fn bootstrap(pool: &SqlitePool) -> PortalResult<()> {
    info!("初始化SQLite表结构");
    for (name, statement) in STATEMENTS {
        sqlx::query(*statement)
            .execute(pool)
            .await
            .map_err(|e| PortalError::database_error(format!("创建{name}失败: {e}")))?;
    }
    Ok(())
}
