//! 模块管理器
//!
//! 引导过程的编排者：加载选中的模块、绑定 provider、执行 prepare 阶段，
//! 交由 [`BootstrapFlow`] 启动，并在引导完成后提供模块查找。

use std::collections::{HashMap, HashSet};

use tracing::{info, instrument, warn};

use super::booting::BootingParameters;
use super::bootstrap::BootstrapFlow;
use super::catalog::ModuleCatalog;
use super::define::ModuleDefine;
use super::lifecycle::ProviderState;
use crate::core::config::{ApplicationConfiguration, ModuleConfiguration};
use crate::utils::{CoreError, Result};

/// 管理器所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// prepare 阶段，禁止 find()
    Preparing,
    /// prepare 已全部完成
    Running,
}

/// 模块管理器
///
/// 负责：
/// - 按配置的模块列表加载模块定义
/// - 为每个模块选择 provider 并执行 prepare
/// - 计算启动顺序并启动所有 provider
/// - 引导完成后提供 `find()` 查找
pub struct ModuleManager {
    /// 模块目录
    catalog: ModuleCatalog,
    /// 已加载的模块，保持加载顺序
    loaded_modules: Vec<ModuleDefine>,
    /// 模块名 -> loaded_modules 下标
    index: HashMap<String, usize>,
    /// 当前阶段
    stage: Stage,
    /// 引导参数
    booting_parameters: BootingParameters,
    /// 启动顺序 `(module, provider)`
    startup_sequence: Vec<(String, String)>,
}

impl ModuleManager {
    /// 创建模块管理器
    ///
    /// # Arguments
    ///
    /// * `description` - 系统描述，用于引导参数表的表头
    /// * `catalog` - 已注册所有模块和 provider 的目录
    pub fn new(description: &str, catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            loaded_modules: Vec::new(),
            index: HashMap::new(),
            stage: Stage::Preparing,
            booting_parameters: BootingParameters::new(format!(
                "The key booting parameters of {} are listed as following.",
                description
            )),
            startup_sequence: Vec::new(),
        }
    }

    /// 执行完整的引导
    ///
    /// 1. 按配置的模块列表加载模块定义，逐个 prepare
    /// 2. 进入 running 阶段
    /// 3. 计算启动顺序，检查服务并启动
    /// 4. 广播完成通知
    #[instrument(skip_all, fields(modules = configuration.len()))]
    pub async fn init(&mut self, configuration: &ApplicationConfiguration) -> Result<()> {
        if self.stage != Stage::Preparing || !self.loaded_modules.is_empty() {
            return Err(CoreError::InitFailed(
                "module manager has already been initialized".to_string(),
            ));
        }

        let module_list = configuration.module_list();
        info!(modules = ?module_list, "初始化模块管理器");

        self.prepare_modules(configuration).await?;
        // prepare 阶段结束
        self.stage = Stage::Running;

        let missing: Vec<&str> = module_list
            .iter()
            .copied()
            .filter(|name| !self.index.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::ModuleNotFound(format!("{:?} missing.", missing)));
        }

        let this: &ModuleManager = self;
        let flow = BootstrapFlow::new(&this.loaded_modules)?;
        let sequence = flow.startup_sequence();
        flow.start(this).await?;
        flow.notify_after_completed(this).await?;

        info!(sequence = ?sequence, "所有模块启动完成");
        self.startup_sequence = sequence;
        Ok(())
    }

    /// 加载并 prepare 选中的模块
    ///
    /// 模块按配置中的顺序加载，目录中未被选中的模块被忽略。
    async fn prepare_modules(&mut self, configuration: &ApplicationConfiguration) -> Result<()> {
        let mut definitions: Vec<_> = self.catalog.take_modules().into_iter().map(Some).collect();
        let empty = ModuleConfiguration::new();
        let mut seen = HashSet::new();

        for name in configuration.module_list() {
            if !seen.insert(name) {
                continue;
            }
            let Some(definition) = definitions
                .iter_mut()
                .find(|d| d.as_ref().is_some_and(|d| d.name() == name))
                .and_then(Option::take)
            else {
                warn!(module = %name, "模块未在目录中注册");
                continue;
            };

            let module_configuration = configuration.module_configuration(name).unwrap_or(&empty);
            let candidates = self.catalog.instantiate_for(name);
            let mut module = ModuleDefine::new(definition);
            module
                .prepare(module_configuration, candidates, &mut self.booting_parameters)
                .await?;

            self.index.insert(name.to_string(), self.loaded_modules.len());
            self.loaded_modules.push(module);
        }
        Ok(())
    }

    /// 模块是否已加载，任何阶段均可调用
    pub fn has(&self, module_name: &str) -> bool {
        self.index.contains_key(module_name)
    }

    /// 查找已加载的模块
    ///
    /// # Errors
    ///
    /// - prepare 阶段调用：`StillPreparing`
    /// - 模块不存在：`ModuleNotFoundAtRuntime`
    pub fn find(&self, module_name: &str) -> Result<&ModuleDefine> {
        if self.stage == Stage::Preparing {
            return Err(CoreError::StillPreparing);
        }

        self.index
            .get(module_name)
            .map(|&i| &self.loaded_modules[i])
            .ok_or_else(|| CoreError::ModuleNotFoundAtRuntime(module_name.to_string()))
    }

    /// 当前阶段
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 已加载模块名，按加载顺序
    pub fn module_names(&self) -> Vec<&str> {
        self.loaded_modules.iter().map(|m| m.name()).collect()
    }

    /// 模块 provider 的生命周期状态
    pub async fn provider_state(&self, module_name: &str) -> Option<ProviderState> {
        let module = self.loaded_modules.get(*self.index.get(module_name)?)?;
        match module.provider() {
            Ok(provider) => Some(provider.state().await),
            Err(_) => None,
        }
    }

    /// 启动顺序，init 成功后可用
    pub fn startup_sequence(&self) -> &[(String, String)] {
        &self.startup_sequence
    }

    /// 引导参数
    pub fn booting_parameters(&self) -> &BootingParameters {
        &self.booting_parameters
    }

    /// 可写的引导参数，供配置加载器在 init 之前追加
    pub fn booting_parameters_mut(&mut self) -> &mut BootingParameters {
        &mut self.booting_parameters
    }

    /// 模块目录
    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("stage", &self.stage)
            .field("loaded_modules", &self.module_names())
            .finish()
    }
}
