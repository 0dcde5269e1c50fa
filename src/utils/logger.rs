//! 服务端日志
//!
//! `oap-server` 启动时根据命令行选项初始化 tracing：
//!
//! - `--log-level` 接受 EnvFilter 指令，例如 `info,oap_core::module=debug`，
//!   设置了 `RUST_LOG` 时以其为准
//! - `--log-format` 选择文本或 JSON 输出
//! - `--log-dir` 额外写入 `oap-server.log`，按 `--log-rotation` 轮转
//!
//! # 示例
//!
//! ```rust,no_run
//! use oap_core::utils::logger::{LogFormat, Logger, LoggerConfig};
//!
//! let config = LoggerConfig::new("info,oap_core::module=debug")
//!     .with_format(LogFormat::Json)
//!     .with_log_dir(Some("./logs".into()));
//! let _guard = Logger::init(config).unwrap();
//!
//! tracing::info!(module = "core", provider = "default", "start the provider");
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Layer};

use crate::utils::{CoreError, Result};

/// 日志文件名
pub const LOG_FILE_NAME: &str = "oap-server.log";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 人类可读的文本
    #[default]
    Text,
    /// 每行一个 JSON 对象
    Json,
}

impl FromStr for LogFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(CoreError::InvalidConfigValue {
                key: "log-format".to_string(),
                reason: format!("unknown log format '{}'", other),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// 日志文件轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转
    Never,
    /// 每小时轮转
    Hourly,
    /// 每天轮转
    #[default]
    Daily,
}

impl RotationStrategy {
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }
}

impl FromStr for RotationStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(RotationStrategy::Never),
            "hourly" => Ok(RotationStrategy::Hourly),
            "daily" => Ok(RotationStrategy::Daily),
            other => Err(CoreError::InvalidConfigValue {
                key: "log-rotation".to_string(),
                reason: format!("unknown rotation '{}'", other),
            }),
        }
    }
}

impl fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationStrategy::Never => f.write_str("never"),
            RotationStrategy::Hourly => f.write_str("hourly"),
            RotationStrategy::Daily => f.write_str("daily"),
        }
    }
}

/// 日志配置，对应 `oap-server` 的日志选项
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// EnvFilter 指令
    pub level: String,
    /// 输出格式
    pub format: LogFormat,
    /// 日志文件目录，`None` 时只输出到控制台
    pub log_dir: Option<PathBuf>,
    /// 日志文件轮转策略
    pub rotation: RotationStrategy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LoggerConfig {
    /// 使用指定的过滤指令创建配置
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Text,
            log_dir: None,
            rotation: RotationStrategy::Daily,
        }
    }

    /// 设置输出格式
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 设置日志文件目录
    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    /// 设置轮转策略
    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }
}

/// 日志守卫
///
/// 持有非阻塞写入器的 WorkerGuard，丢弃时刷出挂起的日志，须保持到进程退出。
pub struct LogGuard {
    guards: Vec<WorkerGuard>,
}

impl LogGuard {
    fn empty() -> Self {
        Self { guards: Vec::new() }
    }

    /// 是否持有任何写入器
    pub fn is_active(&self) -> bool {
        !self.guards.is_empty()
    }
}

impl fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogGuard")
            .field("writers", &self.guards.len())
            .finish()
    }
}

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// 日志系统
pub struct Logger;

impl Logger {
    /// 初始化全局日志
    ///
    /// # Errors
    ///
    /// 已初始化或订阅者注册失败时返回 `InitFailed`
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        if LOGGER_INITIALIZED.get().is_some() {
            return Err(CoreError::InitFailed(
                "日志系统已初始化，不能重复初始化".to_string(),
            ));
        }

        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let env_filter = Self::create_env_filter(&config.level, rust_log.as_deref());
        let mut guard = LogGuard::empty();

        let (console, console_guard) = tracing_appender::non_blocking(io::stdout());
        guard.guards.push(console_guard);
        let console_layer = format_layer(config.format, console, true);

        let file_layer = match config.log_dir {
            Some(ref dir) => {
                let appender =
                    RollingFileAppender::new(config.rotation.to_rotation(), dir, LOG_FILE_NAME);
                let (file, file_guard) = tracing_appender::non_blocking(appender);
                guard.guards.push(file_guard);
                Some(format_layer(config.format, file, false))
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| CoreError::InitFailed(format!("日志系统初始化失败: {}", e)))?;

        let _ = LOGGER_INITIALIZED.set(());
        Ok(guard)
    }

    /// 尝试初始化，已初始化时返回空守卫
    pub fn try_init(config: LoggerConfig) -> LogGuard {
        Self::init(config).unwrap_or_else(|_| LogGuard::empty())
    }

    /// 非空的 `RUST_LOG` 覆盖配置的指令；无法解析的指令被忽略
    fn create_env_filter(level: &str, rust_log: Option<&str>) -> EnvFilter {
        let directives = rust_log.filter(|v| !v.trim().is_empty()).unwrap_or(level);
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(directives)
    }
}

fn format_layer<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => tracing_fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Json => tracing_fmt::layer().json().with_writer(writer).boxed(),
    }
}
