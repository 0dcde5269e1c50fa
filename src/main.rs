//! OAP Server 命令行入口
//!
//! # 命令概览
//!
//! - `start` - 引导服务端（默认）
//! - `version` - 显示版本信息
//! - `check-config` - 验证配置文件
//! - `list-modules` - 列出目录中注册的模块和 provider
//!
//! # 使用示例
//!
//! ```bash
//! # 启动
//! oap-server start
//!
//! # 使用自定义配置文件，以 init 模式启动
//! oap-server -c my-application.yml --mode init
//!
//! # JSON 日志，同时写入 ./logs/oap-server.log
//! oap-server start --log-format json --log-dir ./logs
//!
//! # 检查配置文件
//! oap-server -c application.yml check-config
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use oap_core::core::mode::RunningMode;
use oap_core::module::ModuleCatalog;
use oap_core::starter::{self, OapServerBootstrap};
use oap_core::{LogFormat, Logger, LoggerConfig, RotationStrategy};

/// OAP Server
///
/// 可观测性分析平台服务端，按 application.yml 引导所有选中的模块。
#[derive(Parser)]
#[command(name = "oap-server")]
#[command(version, about = "可观测性分析平台服务端", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = starter::DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    /// 运行模式 (normal, init, no-init)，未指定时读取 OAP_MODE
    #[arg(short, long, global = true)]
    mode: Option<RunningMode>,

    /// 日志过滤指令，例如 info 或 info,oap_core::module=debug
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// 日志格式 (text, json)
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// 日志文件目录，未指定时只输出到控制台
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// 日志文件轮转 (never, hourly, daily)
    #[arg(long, default_value = "daily", global = true)]
    log_rotation: RotationStrategy,

    /// 子命令
    #[command(subcommand)]
    command: Option<Commands>,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 引导服务端
    ///
    /// 加载配置、引导所有选中的模块。normal 模式下按 Ctrl+C 退出。
    Start,

    /// 查看版本信息
    Version,

    /// 验证配置文件
    ///
    /// 加载配置并检查每个选中的模块都已在目录中注册，不启动任何模块。
    CheckConfig,

    /// 列出已注册的模块
    ListModules,
}

/// 服务端自带的模块目录
fn catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    starter::status::register(&mut catalog);
    catalog
}

fn resolve_mode(cli_mode: Option<RunningMode>) -> Result<RunningMode, oap_core::CoreError> {
    match cli_mode {
        Some(mode) => Ok(mode),
        None => RunningMode::from_env(),
    }
}

/// 引导服务端
async fn run_start(config: PathBuf, mode: RunningMode) -> ExitCode {
    info!(config = %config.display(), mode = %mode, "启动 OAP Server...");

    let report = OapServerBootstrap::new(config)
        .with_mode(mode)
        .start(catalog())
        .await;

    if report.should_exit() {
        return ExitCode::from(report.exit_code() as u8);
    }

    info!(modules = ?report.manager.module_names(), "OAP Server 已启动，按 Ctrl+C 退出");
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "等待关闭信号失败");
        return ExitCode::FAILURE;
    }
    info!("收到关闭信号，退出");
    ExitCode::SUCCESS
}

/// 检查配置文件
async fn check_config(path: PathBuf) -> ExitCode {
    println!("检查配置文件: {}", path.display());
    println!();

    match OapServerBootstrap::new(path).check_config(&catalog()).await {
        Ok(configuration) => {
            println!("✅ 配置文件有效！");
            println!();
            println!("选中的模块:");
            println!("────────────────────────────────────────");
            for name in configuration.module_list() {
                let selector = configuration
                    .module_configuration(name)
                    .and_then(|m| m.selector())
                    .unwrap_or("<auto>");
                println!("  {:<24} provider: {}", name, selector);
            }
            println!("────────────────────────────────────────");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("❌ 配置文件无效: [{}] {}", e.error_code(), e);
            ExitCode::FAILURE
        }
    }
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("OAP Server");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", oap_core::VERSION);
    println!();
    println!("构建信息:");
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}

/// 列出已注册的模块
fn list_modules() {
    let catalog = catalog();
    println!();
    println!("已注册模块");
    println!("═══════════════════════════════════════");
    for module in catalog.module_names() {
        let providers: Vec<String> = catalog
            .provider_identities()
            .into_iter()
            .filter(|(m, _)| *m == module)
            .map(|(_, p)| p)
            .collect();
        println!("  {:<24} providers: {}", module, providers.join(", "));
    }
    println!("═══════════════════════════════════════");
    println!();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Version / CheckConfig / ListModules 不需要日志
    let _guard = match cli.command {
        Some(Commands::Start) | None => {
            let config = LoggerConfig::new(cli.log_level.clone())
                .with_format(cli.log_format)
                .with_log_dir(cli.log_dir.clone())
                .with_rotation(cli.log_rotation);
            match Logger::init(config) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        _ => None,
    };

    match cli.command {
        Some(Commands::Start) | None => {
            let mode = match resolve_mode(cli.mode) {
                Ok(mode) => mode,
                Err(e) => {
                    tracing::error!(error = %e, "无效的运行模式");
                    return ExitCode::FAILURE;
                }
            };
            run_start(cli.config, mode).await
        }
        Some(Commands::Version) => {
            print_version();
            ExitCode::SUCCESS
        }
        Some(Commands::CheckConfig) => check_config(cli.config).await,
        Some(Commands::ListModules) => {
            list_modules();
            ExitCode::SUCCESS
        }
    }
}
