//! 应用配置
//!
//! 定义模块引导所消费的配置结构，以及从 `application.yml` 加载配置的逻辑。
//!
//! 配置文件的顶层是有序的 `模块名 -> 模块配置`，模块配置中 `selector`
//! 选择 provider，其余键为 provider 名称及其配置：
//!
//! ```yaml
//! core:
//!   selector: ${OAP_CORE:default}
//!   default:
//!     restPort: 12800
//! storage:
//!   selector: h2
//!   h2: {}
//!   elasticsearch: {}
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::module::booting::BootingParameters;
use crate::utils::{CoreError, Result};

/// 禁用模块的 selector
pub const DISABLE_SELECTOR: &str = "-";

/// selector 键名
const SELECTOR_KEY: &str = "selector";

// ============================================================================
// Provider 配置
// ============================================================================

/// 单个 provider 的配置
///
/// 有序的键值映射，由 provider 在 prepare 时绑定为类型化配置。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSettings(Map<String, Value>);

impl ProviderSettings {
    /// 创建空配置
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// 从 JSON 对象创建
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// 追加配置项（构建器风格）
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// 设置配置项
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// 获取配置项
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 配置项迭代器，按写入顺序
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// 配置项数量
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 底层映射
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// 绑定为类型化配置
    pub fn bind<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

// ============================================================================
// 模块配置
// ============================================================================

/// 单个模块的配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleConfiguration {
    /// 选中的 provider
    selector: Option<String>,
    /// provider 名称 -> 配置，按配置文件顺序
    providers: Vec<(String, ProviderSettings)>,
}

impl ModuleConfiguration {
    /// 创建空的模块配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 selector（构建器风格）
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// 添加 provider 配置（构建器风格）
    pub fn with_provider(mut self, name: impl Into<String>, settings: ProviderSettings) -> Self {
        self.add_provider(name, settings);
        self
    }

    /// 添加 provider 配置，同名配置被替换
    pub fn add_provider(&mut self, name: impl Into<String>, settings: ProviderSettings) {
        let name = name.into();
        match self.providers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = settings,
            None => self.providers.push((name, settings)),
        }
    }

    /// selector
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// provider 配置
    pub fn provider_settings(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, settings)| settings)
    }

    /// 配置中出现的 provider 名称
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// 选中 provider 的配置，未配置时为空
    pub fn selected_settings(&self, provider: &str) -> ProviderSettings {
        self.provider_settings(provider).cloned().unwrap_or_default()
    }
}

// ============================================================================
// 应用配置
// ============================================================================

/// 应用配置
///
/// 有序的 `模块名 -> 模块配置`，模块列表即被选中的模块集合，
/// 其顺序决定模块的加载顺序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationConfiguration {
    modules: Vec<(String, ModuleConfiguration)>,
}

impl ApplicationConfiguration {
    /// 创建空配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加模块（构建器风格）
    pub fn with_module(mut self, name: impl Into<String>, module: ModuleConfiguration) -> Self {
        self.add_module(name, module);
        self
    }

    /// 添加模块，同名模块被替换并保持原有位置
    pub fn add_module(&mut self, name: impl Into<String>, module: ModuleConfiguration) {
        let name = name.into();
        match self.modules.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = module,
            None => self.modules.push((name, module)),
        }
    }

    /// 被选中的模块列表
    pub fn module_list(&self) -> Vec<&str> {
        self.modules.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// 模块配置
    pub fn module_configuration(&self, name: &str) -> Option<&ModuleConfiguration> {
        self.modules
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, module)| module)
    }

    /// 是否包含模块
    pub fn has(&self, name: &str) -> bool {
        self.modules.iter().any(|(n, _)| n == name)
    }

    /// 模块数量
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

// ============================================================================
// 配置加载器
// ============================================================================

/// 环境变量查找函数
type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// `${NAME:default}` 占位符
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z0-9_.\-]+)(?::([^}]*))?\}").expect("placeholder pattern is valid")
    })
}

/// 应用配置加载器
///
/// 读取 `application.yml`：
/// - 解析 `${NAME:default}` 占位符
/// - `selector: "-"` 或空 selector 的模块被禁用
/// - 只保留选中 provider 的配置
/// - 所有生效的配置项记录到引导参数表
pub struct ApplicationConfigLoader {
    /// 配置文件路径
    path: PathBuf,
    /// 环境变量查找
    env: EnvLookup,
    /// 生效的配置项 `module.provider.key = value`
    resolved: Vec<(String, String)>,
}

impl ApplicationConfigLoader {
    /// 创建加载器，占位符从进程环境变量解析
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env: Box::new(|name| std::env::var(name).ok()),
            resolved: Vec::new(),
        }
    }

    /// 使用自定义的变量来源
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    /// 使用固定的变量表
    pub fn with_env_map(self, vars: HashMap<String, String>) -> Self {
        self.with_env(move |name| vars.get(name).cloned())
    }

    /// 配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取并解析配置文件
    ///
    /// # Errors
    ///
    /// - 文件不存在或无法读取：`ConfigLoadFailed`
    /// - YAML 格式错误：`Yaml`
    pub async fn load(&mut self, booting_parameters: &mut BootingParameters) -> Result<ApplicationConfiguration> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::ConfigLoadFailed(format!("{}: {}", self.path.display(), e))
        })?;
        info!(path = %self.path.display(), "加载应用配置");
        self.load_str(&content, booting_parameters)
    }

    /// 从字符串解析配置
    pub fn load_str(
        &mut self,
        content: &str,
        booting_parameters: &mut BootingParameters,
    ) -> Result<ApplicationConfiguration> {
        let root: serde_yaml::Value = serde_yaml::from_str(content)?;
        let mut configuration = ApplicationConfiguration::new();
        self.resolved.clear();

        let mapping = match root {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => return Ok(configuration),
            other => {
                return Err(CoreError::ConfigLoadFailed(format!(
                    "top level of application configuration must be a mapping, got {:?}",
                    other
                )))
            }
        };

        for (key, body) in mapping {
            let module_name = key_to_string(&key)?;
            if let Some(module) = self.load_module(&module_name, body)? {
                configuration.add_module(module_name, module);
            }
        }

        for (label, value) in &self.resolved {
            booting_parameters.add_row(label.clone(), value);
        }
        Ok(configuration)
    }

    /// 解析单个模块，模块被禁用时返回 None
    fn load_module(
        &mut self,
        module_name: &str,
        body: serde_yaml::Value,
    ) -> Result<Option<ModuleConfiguration>> {
        let mapping = match body {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => return Ok(Some(ModuleConfiguration::new())),
            other => {
                return Err(CoreError::InvalidConfigValue {
                    key: module_name.to_string(),
                    reason: format!("module configuration must be a mapping, got {:?}", other),
                })
            }
        };

        let mut selector = None;
        let mut providers = Vec::new();
        for (key, value) in mapping {
            let key = key_to_string(&key)?;
            if key == SELECTOR_KEY {
                let raw = match value {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Null => String::new(),
                    other => scalar_to_string(&other),
                };
                selector = Some(self.resolve_placeholders(&raw).trim().to_string());
            } else {
                providers.push((key, value));
            }
        }

        if let Some(selector) = selector.as_deref() {
            if selector.is_empty() || selector == DISABLE_SELECTOR {
                info!(module = %module_name, "模块已禁用");
                return Ok(None);
            }
        }

        let mut module = ModuleConfiguration::new();
        if let Some(selector) = selector.as_deref() {
            module = module.with_selector(selector);
        }

        for (provider_name, value) in providers {
            if selector.as_deref().is_some_and(|s| s != provider_name) {
                debug!(module = %module_name, provider = %provider_name, "跳过未选中的 provider");
                continue;
            }
            let settings = self.load_settings(module_name, &provider_name, value)?;
            module.add_provider(provider_name, settings);
        }
        Ok(Some(module))
    }

    /// 解析 provider 配置，解析占位符并转换为 JSON 值
    fn load_settings(
        &mut self,
        module_name: &str,
        provider_name: &str,
        value: serde_yaml::Value,
    ) -> Result<ProviderSettings> {
        let mapping = match value {
            serde_yaml::Value::Mapping(mapping) => mapping,
            serde_yaml::Value::Null => return Ok(ProviderSettings::new()),
            other => {
                return Err(CoreError::InvalidConfigValue {
                    key: format!("{}.{}", module_name, provider_name),
                    reason: format!("provider configuration must be a mapping, got {:?}", other),
                })
            }
        };

        let mut settings = ProviderSettings::new();
        for (key, value) in mapping {
            let key = key_to_string(&key)?;
            let resolved = self.resolve_value(value);
            let json = serde_json::to_value(&resolved)?;
            self.resolved.push((
                format!("{}.{}.{}", module_name, provider_name, key),
                display_value(&json),
            ));
            settings.insert(key, json);
        }
        Ok(settings)
    }

    /// 递归解析 YAML 值中的占位符
    fn resolve_value(&self, value: serde_yaml::Value) -> serde_yaml::Value {
        match value {
            serde_yaml::Value::String(s) => self.resolve_scalar(&s),
            serde_yaml::Value::Sequence(items) => serde_yaml::Value::Sequence(
                items.into_iter().map(|v| self.resolve_value(v)).collect(),
            ),
            serde_yaml::Value::Mapping(mapping) => serde_yaml::Value::Mapping(
                mapping
                    .into_iter()
                    .map(|(k, v)| (k, self.resolve_value(v)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// 解析字符串标量
    ///
    /// 整个值就是一个占位符时，替换结果按 YAML 标量重新解析，
    /// 使 `${PORT:12800}` 得到整数而不是字符串。
    fn resolve_scalar(&self, raw: &str) -> serde_yaml::Value {
        let replaced = self.resolve_placeholders(raw);
        if replaced == raw {
            return serde_yaml::Value::String(replaced);
        }

        let whole = placeholder_pattern()
            .find(raw)
            .is_some_and(|m| m.start() == 0 && m.end() == raw.len());
        if whole {
            match serde_yaml::from_str::<serde_yaml::Value>(&replaced) {
                Ok(v @ (serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_))) => return v,
                Ok(serde_yaml::Value::Null) if replaced.trim().is_empty() => {
                    return serde_yaml::Value::String(String::new())
                }
                _ => {}
            }
        }
        serde_yaml::Value::String(replaced)
    }

    /// 替换 `${NAME:default}` 占位符
    ///
    /// 变量不存在且无默认值时保留原文。
    pub fn resolve_placeholders(&self, raw: &str) -> String {
        placeholder_pattern()
            .replace_all(raw, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                match (self.env)(name) {
                    Some(value) => value,
                    None => caps
                        .get(2)
                        .map(|d| d.as_str().to_string())
                        .unwrap_or_else(|| caps[0].to_string()),
                }
            })
            .into_owned()
    }

    /// 生效的配置项 `(module.provider.key, value)`
    pub fn resolved_configurations(&self) -> &[(String, String)] {
        &self.resolved
    }
}

impl std::fmt::Debug for ApplicationConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationConfigLoader")
            .field("path", &self.path)
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

/// YAML 键转为字符串
fn key_to_string(key: &serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(_) | serde_yaml::Value::Bool(_) => Ok(scalar_to_string(key)),
        other => Err(CoreError::InvalidConfigValue {
            key: format!("{:?}", other),
            reason: "configuration keys must be scalars".to_string(),
        }),
    }
}

/// YAML 标量转为字符串
fn scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// 引导参数表中的值
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
