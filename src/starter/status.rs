//! 内置的服务状态模块
//!
//! 模块 `status` 暴露 [`ServerStatusService`]，记录引导完成时间和生效的配置，
//! 供其他模块在运行期查询服务是否已完成引导。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::module::capability::{Capability, CapabilityId};
use crate::module::catalog::ModuleCatalog;
use crate::module::define::SimpleModule;
use crate::module::manager::ModuleManager;
use crate::module::provider::{ModuleProvider, PrepareContext};
use crate::utils::Result;

/// 模块名
pub const STATUS_MODULE: &str = "status";

/// provider 名
pub const STATUS_PROVIDER: &str = "default";

/// 服务状态能力
pub struct ServerStatus;

impl Capability for ServerStatus {
    const ID: CapabilityId = CapabilityId::new("status.server");
    type Service = ServerStatusService;
}

/// 状态模块配置
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StatusConfig {
    /// 服务名，出现在状态快照中
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "oap-server".to_string()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
        }
    }
}

/// 引导完成记录
#[derive(Debug, Clone, Serialize)]
pub struct BootRecord {
    /// 引导完成时间
    pub booted_at: DateTime<Utc>,
    /// 生效的配置 `(module.provider.key, value)`
    pub configurations: Vec<(String, String)>,
}

/// 状态快照
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// 服务名
    pub service_name: String,
    /// 是否已完成引导
    pub booted: bool,
    /// 引导完成时间
    pub booted_at: Option<DateTime<Utc>>,
    /// 自引导完成起的秒数
    pub uptime_secs: Option<i64>,
    /// 生效的配置
    pub configurations: Vec<(String, String)>,
}

/// 服务状态服务
#[derive(Debug)]
pub struct ServerStatusService {
    service_name: String,
    record: RwLock<Option<BootRecord>>,
}

impl ServerStatusService {
    /// 创建尚未引导的状态服务
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            record: RwLock::new(None),
        }
    }

    /// 记录引导完成
    ///
    /// 重复调用以最后一次为准。
    pub async fn booted_now(&self, configurations: Vec<(String, String)>, at: DateTime<Utc>) {
        info!(booted_at = %at, configurations = configurations.len(), "服务引导完成");
        *self.record.write().await = Some(BootRecord {
            booted_at: at,
            configurations,
        });
    }

    /// 是否已完成引导
    pub async fn is_booted(&self) -> bool {
        self.record.read().await.is_some()
    }

    /// 引导完成时间
    pub async fn boot_time(&self) -> Option<DateTime<Utc>> {
        self.record.read().await.as_ref().map(|r| r.booted_at)
    }

    /// 生效的配置
    pub async fn resolved_configurations(&self) -> Vec<(String, String)> {
        self.record
            .read()
            .await
            .as_ref()
            .map(|r| r.configurations.clone())
            .unwrap_or_default()
    }

    /// 服务名
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 当前状态快照
    pub async fn snapshot(&self) -> StatusSnapshot {
        let record = self.record.read().await;
        let booted_at = record.as_ref().map(|r| r.booted_at);
        StatusSnapshot {
            service_name: self.service_name.clone(),
            booted: record.is_some(),
            booted_at,
            uptime_secs: booted_at.map(|at| (Utc::now() - at).num_seconds()),
            configurations: record
                .as_ref()
                .map(|r| r.configurations.clone())
                .unwrap_or_default(),
        }
    }
}

/// 状态模块的 provider
#[derive(Debug, Default)]
pub struct StatusProvider {
    config: StatusConfig,
}

#[async_trait]
impl ModuleProvider for StatusProvider {
    fn module_name(&self) -> &str {
        STATUS_MODULE
    }

    fn name(&self) -> &str {
        STATUS_PROVIDER
    }

    async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
        self.config = ctx.config()?;
        ctx.add_booting_parameter("status.serviceName", &self.config.service_name);
        ctx.register::<ServerStatus>(Arc::new(ServerStatusService::new(
            self.config.service_name.clone(),
        )))
    }

    async fn start(&self, _manager: &ModuleManager) -> Result<()> {
        debug!(service = %self.config.service_name, "状态服务已就绪");
        Ok(())
    }
}

/// 状态模块定义
pub fn status_module() -> SimpleModule {
    SimpleModule::new(STATUS_MODULE, vec![ServerStatus::ID])
}

/// 向目录注册状态模块及其 provider
pub fn register(catalog: &mut ModuleCatalog) {
    catalog
        .register_module(status_module())
        .register_provider::<StatusProvider>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ApplicationConfiguration, ModuleConfiguration, ProviderSettings};
    use crate::utils::CoreError;

    #[tokio::test]
    async fn test_booted_now() {
        let service = ServerStatusService::new("oap");
        assert!(!service.is_booted().await);
        assert!(service.boot_time().await.is_none());

        let at = Utc::now();
        service
            .booted_now(vec![("core.default.restPort".into(), "12800".into())], at)
            .await;

        assert!(service.is_booted().await);
        assert_eq!(service.boot_time().await, Some(at));
        assert_eq!(service.resolved_configurations().await.len(), 1);

        let snapshot = service.snapshot().await;
        assert!(snapshot.booted);
        assert_eq!(snapshot.service_name, "oap");
        assert!(snapshot.uptime_secs.is_some_and(|s| s >= 0));
    }

    #[tokio::test]
    async fn test_status_module_boots() {
        let mut catalog = ModuleCatalog::new();
        register(&mut catalog);
        let config = ApplicationConfiguration::new().with_module(
            STATUS_MODULE,
            ModuleConfiguration::new()
                .with_provider(STATUS_PROVIDER, ProviderSettings::new().with("serviceName", "oap-test")),
        );

        let mut manager = ModuleManager::new("test", catalog);
        manager.init(&config).await.unwrap();

        let service = manager
            .find(STATUS_MODULE)
            .unwrap()
            .provider()
            .unwrap()
            .get::<ServerStatus>()
            .unwrap();
        assert_eq!(service.service_name(), "oap-test");
        assert!(!service.is_booted().await);
        assert_eq!(
            manager.booting_parameters().get("status.serviceName"),
            Some("oap-test")
        );
    }

    #[tokio::test]
    async fn test_unknown_setting_rejected() {
        let mut catalog = ModuleCatalog::new();
        register(&mut catalog);
        let config = ApplicationConfiguration::new().with_module(
            STATUS_MODULE,
            ModuleConfiguration::new()
                .with_provider(STATUS_PROVIDER, ProviderSettings::new().with("bogus", 1)),
        );

        let mut manager = ModuleManager::new("test", catalog);
        let err = manager.init(&config).await.unwrap_err();
        assert!(matches!(err, CoreError::ModuleConfig { .. }));
    }
}
