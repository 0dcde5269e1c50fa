//! # OAP Core - 模块化引导引擎
//!
//! 可观测性分析平台服务端的模块化引导内核，提供以下功能：
//!
//! - **模块目录**: 显式注册模块定义和 provider
//! - **provider 选择**: 按配置中的 selector 为每个模块绑定唯一的 provider
//! - **服务注册表**: provider 在 prepare 阶段注册类型化的服务能力
//! - **启动流程**: 按模块依赖计算启动顺序，检查服务并启动 provider
//! - **配置加载**: `application.yml` 加载与环境变量占位符
//! - **日志系统**: 结构化日志记录
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use oap_core::module::ModuleCatalog;
//! use oap_core::starter::OapServerBootstrap;
//!
//! #[tokio::main]
//! async fn main() {
//!     let catalog = ModuleCatalog::new();
//!     let report = OapServerBootstrap::new("config/application.yml")
//!         .start(catalog)
//!         .await;
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `module` - 引导引擎：能力、注册表、provider、启动流程、模块管理器
//! - `core` - 应用配置与运行模式
//! - `starter` - 服务端启动器与内置状态模块
//! - `utils` - 错误类型和日志系统

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod core;
pub mod module;
pub mod starter;
pub mod utils;

// 重导出常用类型，方便使用
pub use module::{
    BootingParameters, BootstrapFlow, BoundProvider, Capability, CapabilityId, ModuleCatalog,
    ModuleDefine, ModuleDefinition, ModuleManager, ModuleProvider, PrepareContext,
    ProviderState, ServiceRegistry, SimpleModule, Stage,
};

pub use utils::{error_code, CoreError, Result};
pub use utils::logger::{LogFormat, LogGuard, Logger, LoggerConfig, RotationStrategy};

pub use core::config::{
    ApplicationConfigLoader, ApplicationConfiguration, ModuleConfiguration, ProviderSettings,
};
pub use core::mode::RunningMode;
pub use starter::{BootReport, OapServerBootstrap};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
