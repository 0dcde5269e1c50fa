//! OAP 引导内核错误类型定义
//!
//! 本模块定义了模块引导过程中使用的所有错误类型。

use thiserror::Error;

/// 引导内核核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 模块定义错误 ====================

    /// 选中的模块没有定义，或 required module 未加载
    #[error("{0}")]
    ModuleNotFound(String),

    /// 运行期查找的模块不存在
    #[error("{0} missing.")]
    ModuleNotFoundAtRuntime(String),

    /// 模块没有可用的 provider
    #[error("no provider found for module '{module}': {reason}")]
    ProviderNotFound {
        /// 模块名
        module: String,
        /// 原因
        reason: String,
    },

    /// 多个 provider 候选且未配置 selector
    #[error("module '{module}' has multiple providers {candidates:?}, but no selector is configured")]
    AmbiguousProvider {
        /// 模块名
        module: String,
        /// 候选 provider
        candidates: Vec<String>,
    },

    /// prepare 之前访问 provider
    #[error("provider of module '{0}' is not bound yet")]
    ProviderNotBound(String),

    /// provider 配置不符合 schema
    #[error("invalid configuration for {module}.{provider}: {reason}")]
    ModuleConfig {
        /// 模块名
        module: String,
        /// provider 名
        provider: String,
        /// 原因
        reason: String,
    },

    // ==================== 服务注册错误 ====================

    /// 所需的 capability 未注册
    #[error("{0}")]
    ServiceNotProvided(String),

    /// capability 重复注册
    #[error("service '{capability}' is already registered by {owner}")]
    ServiceConflict {
        /// capability id
        capability: String,
        /// 所属 provider
        owner: String,
    },

    /// prepare 结束后注册
    #[error("service registry of {owner} is sealed, '{capability}' can not be registered")]
    SealedRegistry {
        /// capability id
        capability: String,
        /// 所属 provider
        owner: String,
    },

    // ==================== 启动流程错误 ====================

    /// 模块依赖存在环
    #[error("{0}")]
    CycleDependency(String),

    /// provider 启动逻辑失败
    #[error("module {module}.{provider} failed to start: {reason}")]
    ModuleStart {
        /// 模块名
        module: String,
        /// provider 名
        provider: String,
        /// 原因
        reason: String,
    },

    /// prepare 阶段调用 find()
    #[error("Still in preparing stage.")]
    StillPreparing,

    /// 生命周期状态转换非法
    #[error("illegal state transition for {owner}: {from} -> {to}")]
    IllegalState {
        /// 所属 provider
        owner: String,
        /// 当前状态
        from: String,
        /// 目标状态
        to: String,
    },

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("failed to load configuration: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("invalid configuration value '{key}': {reason}")]
    InvalidConfigValue {
        /// 配置项
        key: String,
        /// 原因
        reason: String,
    },

    /// 初始化失败
    #[error("initialization failed: {0}")]
    InitFailed(String),

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 内核操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 模块错误 (MODULE-xxx)
    /// 模块未找到
    pub const MODULE_NOT_FOUND: &str = "MODULE-001";
    /// 运行期查找的模块不存在
    pub const MODULE_NOT_FOUND_AT_RUNTIME: &str = "MODULE-002";
    /// 模块循环依赖
    pub const MODULE_CYCLE_DEPENDENCY: &str = "MODULE-003";
    /// 模块启动失败
    pub const MODULE_START_FAILED: &str = "MODULE-004";

    // Provider 错误 (PROVIDER-xxx)
    /// Provider 未找到
    pub const PROVIDER_NOT_FOUND: &str = "PROVIDER-001";
    /// Provider 不唯一
    pub const PROVIDER_AMBIGUOUS: &str = "PROVIDER-002";
    /// Provider 未绑定
    pub const PROVIDER_NOT_BOUND: &str = "PROVIDER-003";

    // 服务错误 (SERVICE-xxx)
    /// 服务未提供
    pub const SERVICE_NOT_PROVIDED: &str = "SERVICE-001";
    /// 服务重复注册
    pub const SERVICE_CONFLICT: &str = "SERVICE-002";
    /// 服务注册表已封闭
    pub const SERVICE_REGISTRY_SEALED: &str = "SERVICE-003";

    // 配置错误 (CONFIG-xxx)
    /// 配置无效
    pub const CONFIG_INVALID: &str = "CONFIG-001";
    /// 配置加载失败
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-002";

    // 引导错误 (BOOT-xxx)
    /// 仍在 prepare 阶段
    pub const BOOT_STILL_PREPARING: &str = "BOOT-001";
    /// 非法的状态转换
    pub const BOOT_ILLEGAL_STATE: &str = "BOOT-002";
    /// 初始化失败
    pub const BOOT_INIT_FAILED: &str = "BOOT-003";
}

impl CoreError {
    /// 将 provider 自身的失败包装为启动错误
    pub fn start_failed(
        module: impl Into<String>,
        provider: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        CoreError::ModuleStart {
            module: module.into(),
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            CoreError::ModuleNotFoundAtRuntime(_) => error_code::MODULE_NOT_FOUND_AT_RUNTIME,
            CoreError::CycleDependency(_) => error_code::MODULE_CYCLE_DEPENDENCY,
            CoreError::ModuleStart { .. } => error_code::MODULE_START_FAILED,
            CoreError::ProviderNotFound { .. } => error_code::PROVIDER_NOT_FOUND,
            CoreError::AmbiguousProvider { .. } => error_code::PROVIDER_AMBIGUOUS,
            CoreError::ProviderNotBound(_) => error_code::PROVIDER_NOT_BOUND,
            CoreError::ServiceNotProvided(_) => error_code::SERVICE_NOT_PROVIDED,
            CoreError::ServiceConflict { .. } => error_code::SERVICE_CONFLICT,
            CoreError::SealedRegistry { .. } => error_code::SERVICE_REGISTRY_SEALED,
            CoreError::ModuleConfig { .. } | CoreError::InvalidConfigValue { .. } => {
                error_code::CONFIG_INVALID
            }
            CoreError::ConfigLoadFailed(_) | CoreError::Yaml(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::StillPreparing => error_code::BOOT_STILL_PREPARING,
            CoreError::IllegalState { .. } => error_code::BOOT_ILLEGAL_STATE,
            CoreError::InitFailed(_) => error_code::BOOT_INIT_FAILED,
            _ => "UNKNOWN",
        }
    }

    /// 是否为用户（配置）错误
    ///
    /// `StillPreparing`、`ProviderNotBound`、`IllegalState` 属于编程错误。
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            CoreError::StillPreparing
                | CoreError::ProviderNotBound(_)
                | CoreError::IllegalState { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::ModuleNotFound(
            "Ghost module is required by A.default, but not found.".to_string(),
        );
        assert!(err.to_string().contains("Ghost"));
        assert!(err.to_string().contains("A.default"));
    }

    #[test]
    fn test_error_code() {
        let err = CoreError::CycleDependency("x".to_string());
        assert_eq!(err.error_code(), error_code::MODULE_CYCLE_DEPENDENCY);

        let err = CoreError::AmbiguousProvider {
            module: "storage".to_string(),
            candidates: vec!["h2".to_string(), "es".to_string()],
        };
        assert_eq!(err.error_code(), error_code::PROVIDER_AMBIGUOUS);
    }

    #[test]
    fn test_user_error_classification() {
        assert!(!CoreError::StillPreparing.is_user_error());
        assert!(!CoreError::ProviderNotBound("core".to_string()).is_user_error());
        assert!(CoreError::ServiceNotProvided("x".to_string()).is_user_error());
    }

    #[test]
    fn test_start_failed_wraps_anyhow() {
        let cause = anyhow::anyhow!("port 11800 in use");
        let err = CoreError::start_failed("receiver", "grpc", cause);
        assert!(matches!(err, CoreError::ModuleStart { .. }));
        assert!(err.to_string().contains("port 11800 in use"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }
}
