//! 应用配置集成测试
//!
//! 测试 application.yml 从加载到驱动引导的完整流程

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use oap_core::module::{
    BootingParameters, Capability, CapabilityId, ModuleCatalog, ModuleManager, ModuleProvider,
    PrepareContext, SimpleModule,
};
use oap_core::{ApplicationConfigLoader, CoreError, Result};
use serde::Deserialize;
use tempfile::TempDir;

const APPLICATION_YML: &str = r#"
cluster:
  selector: ${SW_CLUSTER:standalone}
  standalone:
  kubernetes:
    namespace: ${SW_CLUSTER_K8S_NAMESPACE:default}
core:
  selector: ${SW_CORE:default}
  default:
    restHost: ${SW_CORE_REST_HOST:0.0.0.0}
    restPort: ${SW_CORE_REST_PORT:12800}
    dataKeeperExecutePeriod: 5
storage:
  selector: ${SW_STORAGE:h2}
  h2:
    url: ${SW_STORAGE_H2_URL:jdbc:h2:mem:skywalking-oap-db}
    maxSizeOfBatchSql: 100
  elasticsearch:
    clusterNodes: ${SW_STORAGE_ES_CLUSTER_NODES:localhost:9200}
alarm:
  selector: ${SW_ALARM:-}
  default:
"#;

async fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("application.yml");
    tokio::fs::write(&path, content).await.unwrap();
    (temp_dir, path)
}

fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
    vars.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// 测试默认值下的完整加载
#[tokio::test]
async fn test_load_application_yml_with_defaults() {
    let (_dir, path) = write_config(APPLICATION_YML).await;
    let mut loader = ApplicationConfigLoader::new(&path).with_env_map(HashMap::new());
    let mut params = BootingParameters::new("test");

    let config = loader.load(&mut params).await.unwrap();

    // alarm 被禁用
    assert_eq!(config.module_list(), vec!["cluster", "core", "storage"]);

    let cluster = config.module_configuration("cluster").unwrap();
    assert_eq!(cluster.selector(), Some("standalone"));
    assert_eq!(cluster.provider_names(), vec!["standalone"]);

    let storage = config.module_configuration("storage").unwrap();
    assert_eq!(storage.selector(), Some("h2"));
    assert_eq!(storage.provider_names(), vec!["h2"]);
    let h2 = storage.selected_settings("h2");
    assert_eq!(
        h2.get("url").and_then(|v| v.as_str()),
        Some("jdbc:h2:mem:skywalking-oap-db")
    );
    assert_eq!(h2.get("maxSizeOfBatchSql").and_then(|v| v.as_i64()), Some(100));

    let core = config.module_configuration("core").unwrap().selected_settings("default");
    assert_eq!(core.get("restPort").and_then(|v| v.as_u64()), Some(12800));

    assert_eq!(params.get("core.default.restHost"), Some("0.0.0.0"));
    assert_eq!(params.get("storage.h2.maxSizeOfBatchSql"), Some("100"));
    assert!(loader
        .resolved_configurations()
        .iter()
        .all(|(key, _)| !key.starts_with("storage.elasticsearch")));
}

/// 测试环境变量覆盖 selector 和配置值
#[tokio::test]
async fn test_env_overrides() {
    let (_dir, path) = write_config(APPLICATION_YML).await;
    let mut loader = ApplicationConfigLoader::new(&path).with_env_map(env(&[
        ("SW_STORAGE", "elasticsearch"),
        ("SW_STORAGE_ES_CLUSTER_NODES", "es-1:9200,es-2:9200"),
        ("SW_CORE_REST_PORT", "8080"),
        ("SW_ALARM", "default"),
    ]));
    let mut params = BootingParameters::new("test");

    let config = loader.load(&mut params).await.unwrap();

    assert_eq!(config.module_list(), vec!["cluster", "core", "storage", "alarm"]);

    let storage = config.module_configuration("storage").unwrap();
    assert_eq!(storage.selector(), Some("elasticsearch"));
    assert_eq!(
        storage
            .selected_settings("elasticsearch")
            .get("clusterNodes")
            .and_then(|v| v.as_str()),
        Some("es-1:9200,es-2:9200")
    );

    let core = config.module_configuration("core").unwrap().selected_settings("default");
    assert_eq!(core.get("restPort").and_then(|v| v.as_u64()), Some(8080));

    let alarm = config.module_configuration("alarm").unwrap();
    assert!(alarm.selected_settings("default").is_empty());
}

/// 测试配置文件不存在
#[tokio::test]
async fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut loader = ApplicationConfigLoader::new(temp_dir.path().join("absent.yml"));
    let mut params = BootingParameters::new("test");

    let err = loader.load(&mut params).await.unwrap_err();
    assert!(matches!(err, CoreError::ConfigLoadFailed(_)));
    assert_eq!(err.error_code(), "CONFIG-002");
}

/// 测试 YAML 格式错误
#[tokio::test]
async fn test_malformed_yaml() {
    let (_dir, path) = write_config("core:\n  default: [unclosed\n").await;
    let mut loader = ApplicationConfigLoader::new(&path);
    let mut params = BootingParameters::new("test");

    let err = loader.load(&mut params).await.unwrap_err();
    assert!(matches!(err, CoreError::Yaml(_)));
}

// ============================================================================
// 配置驱动引导
// ============================================================================

struct RestEndpoint;

impl Capability for RestEndpoint {
    const ID: CapabilityId = CapabilityId::new("core.rest");
    type Service = String;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct CoreModuleConfig {
    rest_host: String,
    rest_port: u16,
    #[serde(default)]
    data_keeper_execute_period: u32,
}

#[derive(Default)]
struct CoreModuleProvider;

#[async_trait]
impl ModuleProvider for CoreModuleProvider {
    fn module_name(&self) -> &str {
        "core"
    }

    fn name(&self) -> &str {
        "default"
    }

    async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
        let config: CoreModuleConfig = ctx.config()?;
        ctx.add_booting_parameter("core.period", config.data_keeper_execute_period);
        ctx.register::<RestEndpoint>(Arc::new(format!(
            "{}:{}",
            config.rest_host, config.rest_port
        )))
    }

    async fn start(&self, _manager: &ModuleManager) -> Result<()> {
        Ok(())
    }
}

fn core_catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    catalog
        .register_module(SimpleModule::new("core", vec![RestEndpoint::ID]))
        .register_provider::<CoreModuleProvider>();
    catalog
}

/// 测试加载的配置绑定到 provider 的类型化配置
#[tokio::test]
async fn test_settings_bound_into_provider() {
    let yaml = r#"
core:
  default:
    restHost: ${SW_CORE_REST_HOST:0.0.0.0}
    restPort: ${SW_CORE_REST_PORT:12800}
    dataKeeperExecutePeriod: 5
"#;
    let (_dir, path) = write_config(yaml).await;
    let mut loader =
        ApplicationConfigLoader::new(&path).with_env_map(env(&[("SW_CORE_REST_PORT", "9090")]));

    let mut manager = ModuleManager::new("test", core_catalog());
    let config = loader.load(manager.booting_parameters_mut()).await.unwrap();
    manager.init(&config).await.unwrap();

    let endpoint = manager
        .find("core")
        .unwrap()
        .provider()
        .unwrap()
        .get::<RestEndpoint>()
        .unwrap();
    assert_eq!(*endpoint, "0.0.0.0:9090");

    let params = manager.booting_parameters();
    assert_eq!(params.get("core.default.restPort"), Some("9090"));
    assert_eq!(params.get("core.provider"), Some("default"));
    assert_eq!(params.get("core.period"), Some("5"));
}

/// 测试未知配置项被拒绝
#[tokio::test]
async fn test_unknown_setting_fails_module_config() {
    let yaml = r#"
core:
  default:
    restHost: 0.0.0.0
    restPort: 12800
    restPortt: 12801
"#;
    let (_dir, path) = write_config(yaml).await;
    let mut loader = ApplicationConfigLoader::new(&path);

    let mut manager = ModuleManager::new("test", core_catalog());
    let config = loader.load(manager.booting_parameters_mut()).await.unwrap();
    let err = manager.init(&config).await.unwrap_err();

    match err {
        CoreError::ModuleConfig {
            module,
            provider,
            reason,
        } => {
            assert_eq!(module, "core");
            assert_eq!(provider, "default");
            assert!(reason.contains("restPortt"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

/// 测试 selector 指向不存在的 provider
#[tokio::test]
async fn test_selector_without_matching_provider() {
    let yaml = r#"
core:
  selector: ${SW_CORE:mysql}
  mysql:
    url: localhost
"#;
    let (_dir, path) = write_config(yaml).await;
    let mut loader = ApplicationConfigLoader::new(&path).with_env_map(HashMap::new());

    let mut manager = ModuleManager::new("test", core_catalog());
    let config = loader.load(manager.booting_parameters_mut()).await.unwrap();
    let err = manager.init(&config).await.unwrap_err();

    assert!(matches!(err, CoreError::ProviderNotFound { .. }));
    assert!(err.to_string().contains("mysql"));
}
