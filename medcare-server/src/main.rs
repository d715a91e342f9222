//! MedCare诊所管理服务器主程序

mod config;

use std::net::SocketAddr;

use clap::Parser;
use medcare_database::{DatabasePool, DatabaseQueries};
use medcare_web::{AppState, AuthService, WebServer};
use tracing::{error, info};

use crate::config::ClinicConfig;

/// 诊所管理服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "medcare-server")]
#[command(about = "MedCare 诊所管理系统服务器")]
struct Args {
    /// 监听主机（优先于配置文件）
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口（优先于配置文件）
    #[arg(short, long)]
    port: Option<u16>,

    /// 数据库连接串（优先于配置文件）
    #[arg(short, long)]
    database_url: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ClinicConfig::load(args.config.as_deref())?;

    // 命令行参数覆盖配置文件
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database.connection_string = database_url;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    config.validate()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    info!("启动MedCare服务器...");
    info!("服务器配置:");
    info!("  服务名称: {}", config.server.name);
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  数据库最大连接数: {}", config.database.max_connections);

    // 建立数据库连接并确保表结构存在
    let pool = DatabasePool::connect(
        &config.database.connection_string,
        config.database.max_connections,
    )
    .await?;
    DatabaseQueries::new(&pool).create_tables().await?;

    let state = AppState {
        db: pool,
        auth: AuthService::new(),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address: {e}"))?;

    // 创建并启动Web服务器
    let server = WebServer::new(addr, state);
    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}
