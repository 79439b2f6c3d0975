//! fleet-bridge 主入口
//!
//! 在本机用模拟的定位与电池数据运行一个完整的调度客户端：
//! 周期发布状态快照，并把回环传输上收到的命令交给处理函数。

mod bridge;
mod config;
mod sim;

use anyhow::Context;
use bridge::Bridge;
use clap::Parser;
use config::BridgeConfig;
use crossbeam_channel::{TryRecvError, bounded};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// 机器人侧调度桥接进程
#[derive(Parser, Debug)]
#[command(name = "fleet-bridge")]
#[command(about = "Fleet bridge - publish robot state and dispatch fleet commands", long_about = None)]
struct Args {
    /// 配置文件路径（TOML）
    #[arg(short, long, default_value = "config/bridge.toml")]
    config: PathBuf,

    /// 覆盖配置中的机器人名称
    #[arg(long)]
    robot_name: Option<String>,

    /// 只同步运行 N 个周期后退出（不启动后台循环）
    #[arg(long)]
    dry_run_cycles: Option<usize>,

    /// 日志过滤指令（RUST_LOG 优先）
    #[arg(long, default_value = "fleet_bridge=info,fleet_client=info")]
    log: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    fleet_sdk::init_logging(&args.log).context("Failed to initialize logging")?;

    let mut config = BridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(name) = args.robot_name {
        config.client.robot_name = name;
    }

    eprintln!("Fleet bridge starting...");
    eprintln!("  Robot: {}", config.client.robot_name);
    eprintln!("  State topic: {}", config.client.resolved_state_topic());
    eprintln!("  Command topic: {}", config.client.resolved_command_topic());
    eprintln!("  Publish interval: {} ms", config.client.publish_interval_ms);
    eprintln!(
        "  Frames: {} -> {}",
        config.pose.robot_frame, config.pose.map_frame
    );

    let bridge = Bridge::new(&config).context("Failed to create bridge")?;

    if let Some(cycles) = args.dry_run_cycles {
        let published = bridge.run_cycles(cycles, config.client.publish_interval())?;
        info!(cycles, published, "Dry run finished");
        print_summary(&bridge);
        bridge.stop();
        return Ok(());
    }

    // Ctrl+C 只负责发出停止通知，真正的停止在主线程完成
    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        let _ = stop_tx.try_send(());
    })
    .context("Failed to set signal handler")?;

    let handle = bridge.start().context("Failed to start client")?;
    eprintln!("Fleet bridge started. Press Ctrl+C to stop.");

    loop {
        if handle.wait_timeout(Duration::from_millis(200)) {
            break;
        }
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                handle.stop();
                break;
            },
            Err(TryRecvError::Empty) => {},
        }
    }

    let result = handle.wait();
    print_summary(&bridge);
    if let Err(e) = &result {
        error!("Client terminated: {}", e);
    }
    result.context("Client terminated abnormally")
}

fn print_summary(bridge: &Bridge) {
    eprintln!("Summary:");
    for line in bridge.summary_lines() {
        eprintln!("  {}", line);
    }
}
