//! 日志初始化
//!
//! 基于 `tracing-subscriber`（`fmt` + `EnvFilter`），优先使用 `RUST_LOG`，
//! 并通过 `tracing-log` 把 `log` 宏的记录转发到 tracing。

use parking_lot::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

static INSTALLED: Mutex<bool> = parking_lot::const_mutex(false);

/// 日志初始化错误
#[derive(Error, Debug)]
pub enum LoggingError {
    /// 默认过滤指令无法解析
    #[error("Invalid log directive {directive:?}: {reason}")]
    InvalidDirective { directive: String, reason: String },

    /// 全局 subscriber 已被其他代码设置
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// `log` 的全局 logger 已被其他代码设置
    #[error("Failed to bridge log records: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

/// 初始化日志（幂等）
///
/// # 参数
/// - `default_directive`: `RUST_LOG` 之外追加的默认指令，如 `"fleet_bridge=info"`
///
/// # 返回
/// - `Ok(true)`: 本次调用完成了安装
/// - `Ok(false)`: 之前已经安装过
///
/// # 示例
///
/// ```rust
/// fleet_sdk::init_logging("fleet_client=debug").unwrap();
/// assert!(!fleet_sdk::init_logging("fleet_client=debug").unwrap());
/// ```
pub fn init_logging(default_directive: &str) -> Result<bool, LoggingError> {
    let mut installed = INSTALLED.lock();
    if *installed {
        return Ok(false);
    }

    let directive = default_directive
        .parse()
        .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::InvalidDirective {
            directive: default_directive.to_string(),
            reason: e.to_string(),
        })?;
    let filter = EnvFilter::from_default_env().add_directive(directive);
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    *installed = true;
    Ok(true)
}
