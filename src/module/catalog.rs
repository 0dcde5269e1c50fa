//! 模块目录
//!
//! 应用在启动前显式注册所有可用的模块定义和 provider 构造函数，
//! 引导时由 [`ModuleManager`](super::manager::ModuleManager) 从目录中取出。
//!
//! # 示例
//!
//! ```rust
//! use oap_core::module::catalog::ModuleCatalog;
//! use oap_core::module::define::SimpleModule;
//!
//! let mut catalog = ModuleCatalog::new();
//! catalog.register_module(SimpleModule::new("core", vec![]));
//! assert_eq!(catalog.module_names(), vec!["core".to_string()]);
//! ```

use tracing::debug;

use crate::module::define::ModuleDefinition;
use crate::module::provider::ModuleProvider;

/// Provider 构造函数
pub type ProviderFactory = Box<dyn Fn() -> Box<dyn ModuleProvider> + Send + Sync>;

/// 模块目录
///
/// 模块定义和 provider 构造函数均按注册顺序保存。
#[derive(Default)]
pub struct ModuleCatalog {
    modules: Vec<Box<dyn ModuleDefinition>>,
    providers: Vec<ProviderFactory>,
}

impl ModuleCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块定义
    pub fn register_module<M: ModuleDefinition + 'static>(&mut self, module: M) -> &mut Self {
        debug!(module = %module.name(), "注册模块定义");
        self.modules.push(Box::new(module));
        self
    }

    /// 注册可默认构造的 provider
    pub fn register_provider<P: ModuleProvider + Default + 'static>(&mut self) -> &mut Self {
        self.providers
            .push(Box::new(|| Box::new(P::default()) as Box<dyn ModuleProvider>));
        self
    }

    /// 使用闭包注册 provider 构造函数
    pub fn register_provider_with<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ModuleProvider> + Send + Sync + 'static,
    {
        self.providers.push(Box::new(factory));
        self
    }

    /// 取出模块定义（按注册顺序）
    pub(crate) fn take_modules(&mut self) -> Vec<Box<dyn ModuleDefinition>> {
        std::mem::take(&mut self.modules)
    }

    /// 为指定模块实例化候选 provider
    pub(crate) fn instantiate_for(&self, module_name: &str) -> Vec<Box<dyn ModuleProvider>> {
        self.providers
            .iter()
            .map(|factory| factory())
            .filter(|provider| provider.module_name() == module_name)
            .collect()
    }

    /// 所有模块名
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|m| m.name().to_string()).collect()
    }

    /// 是否已注册指定模块
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name() == name)
    }

    /// 所有 provider 标识 `(module, provider)`
    pub fn provider_identities(&self) -> Vec<(String, String)> {
        self.providers
            .iter()
            .map(|factory| {
                let provider = factory();
                (provider.module_name().to_string(), provider.name().to_string())
            })
            .collect()
    }

    /// 模块定义数量
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Provider 构造函数数量
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

impl std::fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("modules", &self.module_names())
            .field("providers", &self.provider_count())
            .finish()
    }
}
