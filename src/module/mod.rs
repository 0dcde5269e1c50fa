//! 模块引导引擎
//!
//! 包含模块化引导的核心组件：
//! - 服务能力与服务注册表
//! - 模块定义与 provider 契约
//! - provider 生命周期
//! - 启动流程与模块管理器

pub mod booting;
pub mod bootstrap;
pub mod capability;
pub mod catalog;
pub mod define;
pub mod lifecycle;
pub mod manager;
pub mod provider;
pub mod registry;

// 重导出常用类型
pub use booting::{BootingParameters, BootingRow};
pub use bootstrap::BootstrapFlow;
pub use capability::{Capability, CapabilityId};
pub use catalog::{ModuleCatalog, ProviderFactory};
pub use define::{ModuleDefine, ModuleDefinition, SimpleModule};
pub use lifecycle::{Lifecycle, ProviderState};
pub use manager::{ModuleManager, Stage};
pub use provider::{BoundProvider, ModuleProvider, PrepareContext};
pub use registry::ServiceRegistry;
