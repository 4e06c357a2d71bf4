//! PACS打印服务主程序

use anyhow::{Context, Result};
use clap::Parser;
use pacs_admin::{init_tracing, ConfigManager, ConfigValidator, PrintConfig};
use pacs_archive::ArchiveIndex;
use pacs_dicom::DryRunTransport;
use pacs_web::WebServer;
use pacs_workflow::{DispatchConfig, PrintWorkflow};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// PACS打印服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "pacs-server")]
#[command(about = "PACS 胶片打印工作流服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// HTTP端口，覆盖配置文件
    #[arg(short = 'p', long)]
    http_port: Option<u16>,
}

fn dispatch_config(config: &PrintConfig) -> DispatchConfig {
    DispatchConfig {
        workers: config.dispatch.workers,
        queue_capacity: config.dispatch.queue_capacity,
        transport_timeout: config.dispatch.transport_timeout(),
        calling_ae_title: config.dicom.ae_title.clone(),
    }
}

/// 加载配置并应用命令行覆盖，覆盖后的结果重新校验
async fn resolve_config(args: &Args) -> Result<PrintConfig> {
    let manager = ConfigManager::new(args.config.as_deref())?;
    let mut config = manager.get_config().await;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(port) = args.http_port {
        config.server.http_port = port;
    }

    ConfigValidator::new()
        .validate(&config)
        .context("Invalid command line override")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 日志订阅器依赖配置，此前的日志不会输出，错误通过返回值报告
    let config = resolve_config(&args).await?;
    init_tracing(&config.logging)?;

    info!("启动PACS打印服务...");
    match &args.config {
        Some(path) => info!("  配置文件: {}", path.display()),
        None => info!("  配置文件: 未指定，使用默认值与环境变量"),
    }
    info!("  本端AE标题: {}", config.dicom.ae_title);
    info!(
        "  派发: {} workers, queue {}, timeout {:?}",
        config.dispatch.workers,
        config.dispatch.queue_capacity,
        config.dispatch.transport_timeout()
    );

    // 打印传输目前只记录交换计划，不建立网络连接
    let workflow = PrintWorkflow::new(
        Arc::new(ArchiveIndex::new()),
        Arc::new(DryRunTransport::new()),
        dispatch_config(&config),
    )
    .with_default_page_size(config.query.default_page_size);

    let loaded = workflow
        .load_printers(config.printers())
        .await
        .context("Failed to register configured printers")?;
    info!("Registered {} printer(s)", loaded);

    let workflow = Arc::new(workflow);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.http_port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.http_port))?;
    let server = WebServer::new(addr, workflow.clone());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!("Web服务器异常退出: {}", e);
            }
            result.context("Web server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到停止信号，等待进行中的打印派发完成");
        }
    }

    workflow.shutdown().await;
    info!("PACS打印服务已停止");
    Ok(())
}
