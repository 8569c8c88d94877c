//! ClinicQ服务器主程序

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clinicq_admin::ConfigLoader;
use clinicq_announce::{
    AnnouncementDispatcher, DisplayChannel, DisplayEndpoint, DisplayNotifier, VoiceConfig,
    VoiceSynthesizer,
};
use clinicq_queue::{InactivityReaper, OccupancyRegistry, PatientStore, ReaperConfig};
use clinicq_station::QueueEngine;
use tokio::sync::watch;
use tracing::{error, info};

mod api;

use api::{create_app, ApiState};

/// ClinicQ服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinicq-server")]
#[command(about = "ClinicQ 诊所排队叫号与播报服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 服务器端口（覆盖配置文件）
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .init();

    info!("启动ClinicQ服务器...");

    // 加载配置
    let mut config = ConfigLoader::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("ClinicQ服务器配置:");
    info!("  诊所单元: {}", config.unit_name);
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  站点数量: {}", config.stations.len());
    info!("  语音播报: {}", if config.voice.enabled { "启用" } else { "关闭" });

    // 组装播报链路
    let channel = Arc::new(DisplayChannel::new());
    let notifier = Arc::new(DisplayNotifier::new());
    for entry in &config.display.endpoints {
        notifier
            .register(DisplayEndpoint::new(entry.url.clone(), entry.secret.clone()))
            .await;
    }

    let voice = if config.voice.enabled {
        Some(VoiceSynthesizer::new(VoiceConfig {
            enabled: true,
            endpoint: config.voice.endpoint.clone(),
            voice_id: config.voice.voice_id.clone(),
            model_id: config.voice.model_id.clone(),
            api_keys: config.voice.api_keys.clone(),
        }))
    } else {
        None
    };

    let dispatcher = Arc::new(AnnouncementDispatcher::new(
        voice,
        channel.clone(),
        notifier.clone(),
    ));

    // 组装队列引擎
    let store = Arc::new(PatientStore::new(config.unit_name.clone()));
    let registry = Arc::new(OccupancyRegistry::new());
    let engine = Arc::new(QueueEngine::new(
        store.clone(),
        registry.clone(),
        dispatcher,
        config.to_stations(),
    ));

    // 启动闲置清理任务
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = InactivityReaper::new(
        store.clone(),
        registry.clone(),
        ReaperConfig {
            interval: Duration::from_secs(config.reaper.interval_secs),
            inactive_after_minutes: config.reaper.inactive_after_minutes,
            utc_offset_hours: config.utc_offset_hours,
        },
    )?;
    let reaper_handle = tokio::spawn(reaper.run(shutdown_rx));

    // 启动HTTP API
    let state = Arc::new(ApiState {
        engine,
        utc_offset_hours: config.utc_offset_hours,
    });
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("HTTP API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = serve_result {
        error!("服务器运行失败: {}", e);
    }

    // 通知后台任务退出
    let _ = shutdown_tx.send(true);
    let _ = reaper_handle.await;

    info!("ClinicQ服务器已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("收到停止信号，正在退出...");
}
