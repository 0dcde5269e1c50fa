//! 模块 Provider 契约
//!
//! Provider 是模块的一个具体实现。每个 provider 声明所实现的模块名、
//! 自身名称和所依赖的模块，并实现三个生命周期钩子：
//!
//! - `prepare` - 解析配置，创建并注册服务
//! - `start` - 使用其他模块的服务，进入可用状态
//! - `notify_after_completed` - 所有 provider 启动完成后调用一次

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::core::config::ProviderSettings;
use crate::module::booting::BootingParameters;
use crate::module::capability::{Capability, CapabilityId};
use crate::module::lifecycle::{Lifecycle, ProviderState};
use crate::module::manager::ModuleManager;
use crate::module::registry::ServiceRegistry;
use crate::utils::{CoreError, Result};

/// 模块 Provider 接口
///
/// 具体模块实现此接口，并通过 [`ModuleCatalog`](super::catalog::ModuleCatalog)
/// 注册构造函数。
#[async_trait]
pub trait ModuleProvider: Send + Sync {
    /// 所实现的模块名
    fn module_name(&self) -> &str;

    /// Provider 名称
    fn name(&self) -> &str;

    /// 启动前必须先启动的模块
    ///
    /// 只用于排序，不限制 provider 对其他模块的访问。
    fn required_modules(&self) -> Vec<String> {
        Vec::new()
    }

    /// 解析配置并注册服务
    async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()>;

    /// 启动 provider
    ///
    /// `required_modules` 中的模块保证已经启动，可通过 `manager.find()` 获取其服务。
    async fn start(&self, manager: &ModuleManager) -> Result<()>;

    /// 所有 provider 启动完成后的回调
    async fn notify_after_completed(&self, _manager: &ModuleManager) -> Result<()> {
        Ok(())
    }
}

/// prepare 阶段的上下文
///
/// 提供当前 provider 的配置、服务注册表和引导参数表。
pub struct PrepareContext<'a> {
    module_name: &'a str,
    provider_name: &'a str,
    settings: &'a ProviderSettings,
    registry: &'a mut ServiceRegistry,
    booting_parameters: &'a mut BootingParameters,
}

impl<'a> PrepareContext<'a> {
    pub(crate) fn new(
        module_name: &'a str,
        provider_name: &'a str,
        settings: &'a ProviderSettings,
        registry: &'a mut ServiceRegistry,
        booting_parameters: &'a mut BootingParameters,
    ) -> Self {
        Self {
            module_name,
            provider_name,
            settings,
            registry,
            booting_parameters,
        }
    }

    /// 模块名
    pub fn module_name(&self) -> &str {
        self.module_name
    }

    /// Provider 名称
    pub fn provider_name(&self) -> &str {
        self.provider_name
    }

    /// 原始配置
    pub fn settings(&self) -> &ProviderSettings {
        self.settings
    }

    /// 将配置绑定为类型化的配置对象
    ///
    /// 配置类型应使用 `#[serde(deny_unknown_fields)]`，未知配置项会被拒绝。
    ///
    /// # Errors
    ///
    /// 配置不符合类型定义时返回 `ModuleConfig`
    pub fn config<T: DeserializeOwned>(&self) -> Result<T> {
        self.settings
            .bind::<T>()
            .map_err(|e| CoreError::ModuleConfig {
                module: self.module_name.to_string(),
                provider: self.provider_name.to_string(),
                reason: e.to_string(),
            })
    }

    /// 注册服务
    pub fn register<C: Capability>(&mut self, service: Arc<C::Service>) -> Result<()> {
        self.registry.register::<C>(service)
    }

    /// 追加引导参数
    pub fn add_booting_parameter(&mut self, label: impl Into<String>, value: impl std::fmt::Display) {
        self.booting_parameters.add_row(label, value);
    }
}

/// 已绑定到模块的 provider
///
/// 持有 provider 实例、其私有的服务注册表和生命周期状态。
pub struct BoundProvider {
    provider: Box<dyn ModuleProvider>,
    module_name: String,
    name: String,
    required_modules: Vec<String>,
    registry: ServiceRegistry,
    lifecycle: Lifecycle,
}

impl BoundProvider {
    pub(crate) fn new(provider: Box<dyn ModuleProvider>) -> Self {
        let module_name = provider.module_name().to_string();
        let name = provider.name().to_string();
        let required_modules = provider.required_modules();
        let owner = format!("{}.{}", module_name, name);

        Self {
            provider,
            registry: ServiceRegistry::new(owner.clone()),
            lifecycle: Lifecycle::new(owner),
            module_name,
            name,
            required_modules,
        }
    }

    /// Provider 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 所实现的模块名
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// 依赖的模块
    pub fn required_modules(&self) -> &[String] {
        &self.required_modules
    }

    /// 获取本 provider 注册的服务
    pub fn get<C: Capability>(&self) -> Result<Arc<C::Service>> {
        self.registry.get::<C>()
    }

    /// 服务注册表
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// 当前生命周期状态
    pub async fn state(&self) -> ProviderState {
        self.lifecycle.current().await
    }

    /// 检查模块声明的服务是否都已注册
    ///
    /// # Errors
    ///
    /// 存在未注册的服务时返回 `ServiceNotProvided`，列出所有缺失的标识
    pub fn required_check(&self, expected: &[CapabilityId]) -> Result<()> {
        let missing: Vec<&str> = expected
            .iter()
            .filter(|id| !self.registry.contains(**id))
            .map(|id| id.as_str())
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        Err(CoreError::ServiceNotProvided(format!(
            "Service {} is required by {}.{}, but not provided.",
            missing.join(", "),
            self.module_name,
            self.name
        )))
    }

    /// 执行 prepare，结束后封存注册表
    pub(crate) async fn prepare(
        &mut self,
        settings: &ProviderSettings,
        booting_parameters: &mut BootingParameters,
    ) -> Result<()> {
        self.lifecycle
            .expect(ProviderState::Created, ProviderState::Prepared)
            .await?;
        debug!(module = %self.module_name, provider = %self.name, "prepare provider");

        let result = {
            let mut ctx = PrepareContext::new(
                &self.module_name,
                &self.name,
                settings,
                &mut self.registry,
                booting_parameters,
            );
            self.provider.prepare(&mut ctx).await
        };

        self.registry.seal();
        match result {
            Ok(()) => self.lifecycle.advance(ProviderState::Prepared).await,
            Err(e) => {
                error!(module = %self.module_name, provider = %self.name, error = %e, "prepare 失败");
                self.lifecycle.fail().await;
                Err(e)
            }
        }
    }

    /// 执行 start
    pub(crate) async fn start(&self, manager: &ModuleManager) -> Result<()> {
        self.lifecycle
            .expect(ProviderState::Prepared, ProviderState::Started)
            .await?;

        if let Err(e) = self.provider.start(manager).await {
            error!(module = %self.module_name, provider = %self.name, error = %e, "启动失败");
            self.lifecycle.fail().await;
            return Err(e);
        }
        self.lifecycle.advance(ProviderState::Started).await
    }

    /// 执行完成回调
    pub(crate) async fn notify_after_completed(&self, manager: &ModuleManager) -> Result<()> {
        self.lifecycle
            .expect(ProviderState::Started, ProviderState::Completed)
            .await?;

        if let Err(e) = self.provider.notify_after_completed(manager).await {
            error!(module = %self.module_name, provider = %self.name, error = %e, "完成回调失败");
            self.lifecycle.fail().await;
            return Err(e);
        }
        self.lifecycle.advance(ProviderState::Completed).await
    }

    /// 标记为失败
    pub(crate) async fn fail(&self) {
        self.lifecycle.fail().await;
    }
}

impl std::fmt::Debug for BoundProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundProvider")
            .field("module_name", &self.module_name)
            .field("name", &self.name)
            .field("required_modules", &self.required_modules)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    trait Clock: Send + Sync {
        fn now(&self) -> i64;
    }

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    struct ClockService;

    impl Capability for ClockService {
        const ID: CapabilityId = CapabilityId::new("test.clock");
        type Service = dyn Clock;
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ClockConfig {
        #[serde(default)]
        offset: i64,
    }

    #[derive(Default)]
    struct ClockProvider {
        offset: i64,
        fail_prepare: bool,
    }

    #[async_trait]
    impl ModuleProvider for ClockProvider {
        fn module_name(&self) -> &str {
            "clock"
        }

        fn name(&self) -> &str {
            "fixed"
        }

        async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
            if self.fail_prepare {
                return Err(CoreError::InitFailed("boom".to_string()));
            }
            let config: ClockConfig = ctx.config()?;
            self.offset = config.offset;
            ctx.add_booting_parameter("clock.offset", config.offset);
            ctx.register::<ClockService>(Arc::new(FixedClock(1000 + config.offset)))
        }

        async fn start(&self, _manager: &ModuleManager) -> Result<()> {
            Ok(())
        }
    }

    fn settings(offset: i64) -> ProviderSettings {
        ProviderSettings::new().with("offset", offset)
    }

    #[tokio::test]
    async fn test_prepare_registers_and_seals() {
        let mut bound = BoundProvider::new(Box::new(ClockProvider::default()));
        let mut params = BootingParameters::new("test");

        bound.prepare(&settings(5), &mut params).await.unwrap();

        assert_eq!(bound.state().await, ProviderState::Prepared);
        assert!(bound.registry().is_sealed());
        assert_eq!(bound.get::<ClockService>().unwrap().now(), 1005);
        assert_eq!(params.get("clock.offset"), Some("5"));
    }

    #[tokio::test]
    async fn test_prepare_rejects_unknown_keys() {
        let mut bound = BoundProvider::new(Box::new(ClockProvider::default()));
        let mut params = BootingParameters::new("test");
        let bad = ProviderSettings::new().with("ofset", 5);

        let result = bound.prepare(&bad, &mut params).await;
        assert!(matches!(result, Err(CoreError::ModuleConfig { .. })));
        assert_eq!(bound.state().await, ProviderState::Failed);
    }

    #[tokio::test]
    async fn test_prepare_failure_marks_failed() {
        let provider = ClockProvider {
            fail_prepare: true,
            ..Default::default()
        };
        let mut bound = BoundProvider::new(Box::new(provider));
        let mut params = BootingParameters::new("test");

        assert!(bound.prepare(&settings(0), &mut params).await.is_err());
        assert_eq!(bound.state().await, ProviderState::Failed);
    }

    #[tokio::test]
    async fn test_prepare_twice_is_illegal() {
        let mut bound = BoundProvider::new(Box::new(ClockProvider::default()));
        let mut params = BootingParameters::new("test");

        bound.prepare(&settings(0), &mut params).await.unwrap();
        let result = bound.prepare(&settings(0), &mut params).await;
        assert!(matches!(result, Err(CoreError::IllegalState { .. })));
    }

    #[tokio::test]
    async fn test_required_check() {
        let mut bound = BoundProvider::new(Box::new(ClockProvider::default()));
        let mut params = BootingParameters::new("test");
        bound.prepare(&settings(0), &mut params).await.unwrap();

        assert!(bound.required_check(&[ClockService::ID]).is_ok());

        let missing = CapabilityId::new("test.calendar");
        let err = bound
            .required_check(&[ClockService::ID, missing])
            .unwrap_err();
        assert!(matches!(err, CoreError::ServiceNotProvided(_)));
        assert!(err.to_string().contains("test.calendar"));
        assert!(err.to_string().contains("clock.fixed"));
    }
}
