//! 核心模块
//!
//! 包含应用配置与运行模式。

pub mod config;
pub mod mode;

pub use config::{
    ApplicationConfigLoader, ApplicationConfiguration, ModuleConfiguration, ProviderSettings,
    DISABLE_SELECTOR,
};
pub use mode::RunningMode;
