use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portal_config::{AppConfig, LogFormat};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::Application;
use shutdown::ShutdownManager;

#[derive(Parser)]
#[command(name = "site-portal")]
#[command(about = "联邦站点门户：多方作业与项目协调")]
#[command(version = "0.1.0")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 向 FML Manager 注册本站点
    RegisterSite,
    /// 从 FML Manager 注销本站点
    UnregisterSite,
    /// 执行一轮项目、参与方与数据关联对账
    Sync,
    /// 向执行引擎刷新一次所有运行中作业的状态
    RefreshJobs,
    /// 周期性对账并刷新作业，直到收到关闭信号
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).with_context(|| {
        format!(
            "加载配置失败: {}",
            cli.config.as_deref().unwrap_or("<default>")
        )
    })?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_format = cli.log_format.unwrap_or(config.logging.format);
    init_logging(log_level, log_format)?;

    info!("启动站点门户: {} ({})", config.site.name, config.site.uuid);

    let app = Application::new(config).await?;

    match cli.command {
        Commands::RegisterSite => app.register_site().await?,
        Commands::UnregisterSite => app.unregister_site().await?,
        Commands::Sync => {
            let report = app.sync_once().await?;
            info!(
                "对账完成: 项目 {} 个，修正 {} 行，失败 {} 个",
                report.projects_synced, report.rows_changed, report.failures
            );
        }
        Commands::RefreshJobs => {
            let report = app.refresh_jobs_once().await?;
            info!(
                "作业刷新完成: 刷新 {} 个，结束 {} 个",
                report.refreshed, report.finished
            );
        }
        Commands::Run => run_until_shutdown(app).await?,
    }

    info!("站点门户已退出");
    Ok(())
}

async fn run_until_shutdown(app: Application) -> Result<()> {
    let app = Arc::new(app);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let shutdown_rx = shutdown_manager.subscribe();
        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown_rx).await {
                error!("应用运行失败: {e}");
            }
        })
    };

    wait_for_shutdown_signal().await?;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    if let Err(e) = app_handle.await {
        warn!("运行循环异常退出: {e}");
    }
    app.drain_tasks().await;
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
    }

    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("安装Ctrl+C信号处理器失败")?;
                info!("收到Ctrl+C信号");
            }
            _ = terminate.recv() => {
                info!("收到SIGTERM信号");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("安装Ctrl+C信号处理器失败")?;
        info!("收到Ctrl+C信号");
    }

    Ok(())
}
