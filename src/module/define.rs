//! 模块定义
//!
//! [`ModuleDefinition`] 描述逻辑模块：名称和必须暴露的服务能力。
//! [`ModuleDefine`] 是引擎持有的包装，负责选择 provider 并驱动其 prepare。

use tracing::{debug, info};

use crate::core::config::ModuleConfiguration;
use crate::module::booting::BootingParameters;
use crate::module::capability::CapabilityId;
use crate::module::provider::{BoundProvider, ModuleProvider};
use crate::utils::{CoreError, Result};

/// 逻辑模块定义
pub trait ModuleDefinition: Send + Sync {
    /// 模块名
    fn name(&self) -> &str;

    /// 模块必须暴露的服务能力
    fn services(&self) -> Vec<CapabilityId>;
}

/// 只由名称和能力列表构成的模块定义
#[derive(Debug, Clone)]
pub struct SimpleModule {
    name: String,
    services: Vec<CapabilityId>,
}

impl SimpleModule {
    /// 创建模块定义
    pub fn new(name: impl Into<String>, services: Vec<CapabilityId>) -> Self {
        Self {
            name: name.into(),
            services,
        }
    }
}

impl ModuleDefinition for SimpleModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn services(&self) -> Vec<CapabilityId> {
        self.services.clone()
    }
}

/// 已加载的模块
///
/// prepare 之后绑定唯一的 provider，之后不再改变。
pub struct ModuleDefine {
    definition: Box<dyn ModuleDefinition>,
    services: Vec<CapabilityId>,
    provider: Option<BoundProvider>,
}

impl ModuleDefine {
    /// 包装模块定义
    pub fn new(definition: Box<dyn ModuleDefinition>) -> Self {
        let services = definition.services();
        Self {
            definition,
            services,
            provider: None,
        }
    }

    /// 模块名
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// 模块必须暴露的服务能力
    pub fn services(&self) -> &[CapabilityId] {
        &self.services
    }

    /// 已绑定的 provider
    ///
    /// # Errors
    ///
    /// prepare 之前调用返回 `ProviderNotBound`
    pub fn provider(&self) -> Result<&BoundProvider> {
        self.provider
            .as_ref()
            .ok_or_else(|| CoreError::ProviderNotBound(self.name().to_string()))
    }

    /// 是否已绑定 provider
    pub fn is_bound(&self) -> bool {
        self.provider.is_some()
    }

    /// 选择 provider 并执行其 prepare
    ///
    /// 选择规则：
    /// 1. 候选为目录中 `module_name` 等于本模块名的 provider
    /// 2. 配置了 selector 时按名称过滤
    /// 3. 未配置 selector 且只有一个候选时自动选择
    /// 4. 无候选返回 `ProviderNotFound`，多个候选且无 selector 返回 `AmbiguousProvider`
    pub async fn prepare(
        &mut self,
        configuration: &ModuleConfiguration,
        candidates: Vec<Box<dyn ModuleProvider>>,
        booting_parameters: &mut BootingParameters,
    ) -> Result<()> {
        if self.provider.is_some() {
            return Err(CoreError::IllegalState {
                owner: self.name().to_string(),
                from: "bound".to_string(),
                to: "bound".to_string(),
            });
        }

        let selected = self.select(configuration, candidates)?;
        let mut bound = BoundProvider::new(selected);
        info!(module = %self.name(), provider = %bound.name(), "选择 provider");
        booting_parameters.add_row(format!("{}.provider", self.name()), bound.name());

        let settings = configuration.selected_settings(bound.name());
        bound.prepare(&settings, booting_parameters).await?;
        debug!(module = %self.name(), services = ?bound.registry().ids(), "prepare 完成");

        self.provider = Some(bound);
        Ok(())
    }

    /// 从候选中选择 provider
    fn select(
        &self,
        configuration: &ModuleConfiguration,
        candidates: Vec<Box<dyn ModuleProvider>>,
    ) -> Result<Box<dyn ModuleProvider>> {
        let mut candidates: Vec<Box<dyn ModuleProvider>> = candidates
            .into_iter()
            .filter(|p| p.module_name() == self.name())
            .collect();

        if let Some(selector) = configuration.selector() {
            let available: Vec<String> = candidates.iter().map(|p| p.name().to_string()).collect();
            return match candidates.iter().position(|p| p.name() == selector) {
                Some(index) => Ok(candidates.swap_remove(index)),
                None => Err(CoreError::ProviderNotFound {
                    module: self.name().to_string(),
                    reason: format!(
                        "selector '{}' matches none of the providers {:?}",
                        selector, available
                    ),
                }),
            };
        }

        match candidates.len() {
            0 => Err(CoreError::ProviderNotFound {
                module: self.name().to_string(),
                reason: "no provider is registered".to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(CoreError::AmbiguousProvider {
                module: self.name().to_string(),
                candidates: candidates.iter().map(|p| p.name().to_string()).collect(),
            }),
        }
    }
}

impl std::fmt::Debug for ModuleDefine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDefine")
            .field("name", &self.name())
            .field("services", &self.services)
            .field("provider", &self.provider)
            .finish()
    }
}
