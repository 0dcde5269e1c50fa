//! 服务端启动器
//!
//! 组装模块管理器，加载 `application.yml`，执行引导并决定进程退出码：
//!
//! 1. 记录运行模式和版本到引导参数
//! 2. 加载应用配置（占位符从环境变量解析）
//! 3. `ModuleManager::init`
//! 4. 在状态服务中记录引导完成时间
//! 5. init 模式下引导成功即退出
//!
//! 无论成功或失败，引导参数表都会输出到日志。

pub mod status;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{error, info};

use crate::core::config::{ApplicationConfigLoader, ApplicationConfiguration, ModuleConfiguration};
use crate::core::mode::RunningMode;
use crate::module::booting::BootingParameters;
use crate::module::catalog::ModuleCatalog;
use crate::module::manager::ModuleManager;
use crate::utils::{CoreError, Result};
use crate::VERSION;

pub use status::{ServerStatus, ServerStatusService, StatusProvider, STATUS_MODULE};

/// 默认的配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/application.yml";

/// 默认的系统描述
pub const DEFAULT_DESCRIPTION: &str = "Apache SkyWalking OAP";

/// 进程退出码：成功
pub const EXIT_SUCCESS: i32 = 0;

/// 进程退出码：引导失败
pub const EXIT_FAILURE: i32 = 1;

/// 引导结果
#[derive(Debug)]
pub struct BootReport {
    /// 模块管理器，引导失败时停留在失败时的状态
    pub manager: ModuleManager,
    /// 运行模式
    pub mode: RunningMode,
    /// 引导结果
    pub result: Result<()>,
}

impl BootReport {
    /// 进程退出码
    pub fn exit_code(&self) -> i32 {
        if self.result.is_ok() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }

    /// 引导后是否应立即退出进程
    pub fn should_exit(&self) -> bool {
        self.result.is_err() || self.mode.exits_after_boot()
    }

    /// 引导是否成功
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// 服务端启动器
pub struct OapServerBootstrap {
    description: String,
    config_path: PathBuf,
    mode: RunningMode,
    env: Option<HashMap<String, String>>,
}

impl OapServerBootstrap {
    /// 创建启动器
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            description: DEFAULT_DESCRIPTION.to_string(),
            config_path: config_path.into(),
            mode: RunningMode::Normal,
            env: None,
        }
    }

    /// 设置运行模式
    pub fn with_mode(mut self, mode: RunningMode) -> Self {
        self.mode = mode;
        self
    }

    /// 设置系统描述
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 使用固定的变量表解析占位符，替代进程环境变量
    pub fn with_env_map(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    fn loader(&self) -> ApplicationConfigLoader {
        let loader = ApplicationConfigLoader::new(self.config_path.clone());
        match self.env {
            Some(ref vars) => loader.with_env_map(vars.clone()),
            None => loader,
        }
    }

    /// 执行引导
    ///
    /// 状态模块总会被选中；目录中没有时自动注册。
    pub async fn start(self, mut catalog: ModuleCatalog) -> BootReport {
        if !catalog.has_module(STATUS_MODULE) {
            status::register(&mut catalog);
        }
        let mut manager = ModuleManager::new(&self.description, catalog);

        let params = manager.booting_parameters_mut();
        params.add_row("Running Mode", self.mode);
        params.add_row("Version", VERSION);

        let mut loader = self.loader();
        let result = Self::boot(&mut manager, &mut loader).await;

        match result {
            Ok(()) => {
                if self.mode.exits_after_boot() {
                    info!("OAP starts up in init mode successfully, exit now...");
                }
            }
            Err(ref e) => {
                error!(error_code = e.error_code(), error = %e, "引导失败");
            }
        }
        info!("\n{}", manager.booting_parameters());

        BootReport {
            manager,
            mode: self.mode,
            result,
        }
    }

    async fn boot(manager: &mut ModuleManager, loader: &mut ApplicationConfigLoader) -> Result<()> {
        let mut configuration = loader.load(manager.booting_parameters_mut()).await?;
        ensure_status_module(&mut configuration);

        manager.init(&configuration).await?;

        let status = manager
            .find(STATUS_MODULE)?
            .provider()?
            .get::<ServerStatus>()?;
        status
            .booted_now(loader.resolved_configurations().to_vec(), Utc::now())
            .await;
        Ok(())
    }

    /// 只加载并校验配置，不启动任何模块
    pub async fn check_config(&self, catalog: &ModuleCatalog) -> Result<ApplicationConfiguration> {
        let mut loader = self.loader();
        let mut params = BootingParameters::new(self.description.clone());
        let configuration = loader.load(&mut params).await?;

        let known = catalog.module_names();
        let unknown: Vec<&str> = configuration
            .module_list()
            .into_iter()
            .filter(|name| *name != STATUS_MODULE && !known.iter().any(|k| k.as_str() == *name))
            .collect();
        if !unknown.is_empty() {
            return Err(CoreError::ModuleNotFound(format!("{:?} missing.", unknown)));
        }
        Ok(configuration)
    }
}

impl std::fmt::Debug for OapServerBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OapServerBootstrap")
            .field("description", &self.description)
            .field("config_path", &self.config_path)
            .field("mode", &self.mode)
            .finish()
    }
}

/// 配置中未出现状态模块时追加
fn ensure_status_module(configuration: &mut ApplicationConfiguration) {
    if !configuration.has(STATUS_MODULE) {
        configuration.add_module(STATUS_MODULE, ModuleConfiguration::new());
    }
}
