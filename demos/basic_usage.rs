//! OAP Core 基础使用示例
//!
//! 演示如何：
//! 1. 定义服务能力和模块
//! 2. 实现 provider 并在 prepare 中注册服务
//! 3. 通过配置选择 provider 并完成引导
//! 4. 在引导完成后查找其他模块的服务
//!
//! 运行方式：
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use oap_core::module::{
    Capability, CapabilityId, ModuleCatalog, ModuleManager, ModuleProvider, PrepareContext,
    SimpleModule,
};
use oap_core::{
    ApplicationConfiguration, Logger, LoggerConfig, ModuleConfiguration, ProviderSettings, Result,
};
use serde::Deserialize;

// ============================================================================
// 能力定义
// ============================================================================

/// 指标持久化接口
trait MetricsDao: Send + Sync {
    fn save(&self, name: &str, value: u64);
    fn saved(&self) -> u64;
}

struct MetricsStorage;

impl Capability for MetricsStorage {
    const ID: CapabilityId = CapabilityId::new("storage.metrics");
    type Service = dyn MetricsDao;
}

// ============================================================================
// storage 模块：两个 provider，由 selector 选择
// ============================================================================

#[derive(Default)]
struct MemoryDao {
    count: AtomicU64,
}

impl MetricsDao for MemoryDao {
    fn save(&self, name: &str, value: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        tracing::info!(metric = name, value, "保存指标");
    }

    fn saved(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct MemoryConfig {
    #[serde(default)]
    capacity: usize,
}

#[derive(Default)]
struct MemoryStorageProvider;

#[async_trait]
impl ModuleProvider for MemoryStorageProvider {
    fn module_name(&self) -> &str {
        "storage"
    }

    fn name(&self) -> &str {
        "memory"
    }

    async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
        let config: MemoryConfig = ctx.config()?;
        ctx.add_booting_parameter("storage.memory.capacity", config.capacity);
        ctx.register::<MetricsStorage>(Arc::new(MemoryDao::default()))
    }

    async fn start(&self, _manager: &ModuleManager) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct ElasticsearchStorageProvider;

#[async_trait]
impl ModuleProvider for ElasticsearchStorageProvider {
    fn module_name(&self) -> &str {
        "storage"
    }

    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn prepare(&mut self, ctx: &mut PrepareContext<'_>) -> Result<()> {
        ctx.register::<MetricsStorage>(Arc::new(MemoryDao::default()))
    }

    async fn start(&self, _manager: &ModuleManager) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// receiver 模块：依赖 storage
// ============================================================================

#[derive(Default)]
struct ReceiverProvider;

#[async_trait]
impl ModuleProvider for ReceiverProvider {
    fn module_name(&self) -> &str {
        "receiver"
    }

    fn name(&self) -> &str {
        "default"
    }

    fn required_modules(&self) -> Vec<String> {
        vec!["storage".to_string()]
    }

    async fn prepare(&mut self, _ctx: &mut PrepareContext<'_>) -> Result<()> {
        Ok(())
    }

    async fn start(&self, manager: &ModuleManager) -> Result<()> {
        let dao = manager.find("storage")?.provider()?.get::<MetricsStorage>()?;
        dao.save("service_cpm", 42);
        Ok(())
    }

    async fn notify_after_completed(&self, _manager: &ModuleManager) -> Result<()> {
        tracing::info!("receiver 开始接收数据");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = Logger::try_init(LoggerConfig::default());

    // 1. 注册所有模块和 provider
    let mut catalog = ModuleCatalog::new();
    catalog
        .register_module(SimpleModule::new("storage", vec![MetricsStorage::ID]))
        .register_module(SimpleModule::new("receiver", vec![]))
        .register_provider::<MemoryStorageProvider>()
        .register_provider::<ElasticsearchStorageProvider>()
        .register_provider::<ReceiverProvider>();

    // 2. 选择模块和 provider
    let configuration = ApplicationConfiguration::new()
        .with_module("receiver", ModuleConfiguration::new())
        .with_module(
            "storage",
            ModuleConfiguration::new()
                .with_selector("memory")
                .with_provider("memory", ProviderSettings::new().with("capacity", 1024)),
        );

    // 3. 引导
    let mut manager = ModuleManager::new("OAP Core Demo", catalog);
    manager.init(&configuration).await?;

    println!("启动顺序: {:?}", manager.startup_sequence());
    println!("{}", manager.booting_parameters());

    // 4. 引导完成后查找服务
    let dao = manager.find("storage")?.provider()?.get::<MetricsStorage>()?;
    println!("已保存指标数: {}", dao.saved());

    Ok(())
}
