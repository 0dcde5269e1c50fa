//! 引导流程性能基准测试
//!
//! 使用 Criterion 框架进行性能测试，包括：
//! - 分层依赖图的完整引导
//! - 逆序链式依赖的完整引导（排序轮次最多）

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use oap_core::module::{ModuleCatalog, ModuleManager, ModuleProvider, PrepareContext, SimpleModule};
use oap_core::{ApplicationConfiguration, ModuleConfiguration, Result};

// ============================================================================
// 测试辅助结构
// ============================================================================

/// 基准测试用的空 provider
#[derive(Clone)]
struct BenchProvider {
    module: String,
    requires: Vec<String>,
}

#[async_trait]
impl ModuleProvider for BenchProvider {
    fn module_name(&self) -> &str {
        &self.module
    }

    fn name(&self) -> &str {
        "default"
    }

    fn required_modules(&self) -> Vec<String> {
        self.requires.clone()
    }

    async fn prepare(&mut self, _ctx: &mut PrepareContext<'_>) -> Result<()> {
        Ok(())
    }

    async fn start(&self, _manager: &ModuleManager) -> Result<()> {
        Ok(())
    }
}

/// 构建目录和配置，`deps(i)` 返回第 i 个模块依赖的模块下标
fn build(count: usize, deps: impl Fn(usize) -> Vec<usize>) -> (ModuleCatalog, ApplicationConfiguration) {
    let mut catalog = ModuleCatalog::new();
    let mut config = ApplicationConfiguration::new();

    for i in 0..count {
        let name = format!("module-{}", i);
        let provider = BenchProvider {
            module: name.clone(),
            requires: deps(i).into_iter().map(|d| format!("module-{}", d)).collect(),
        };
        catalog
            .register_module(SimpleModule::new(name.clone(), vec![]))
            .register_provider_with(move || Box::new(provider.clone()) as Box<dyn ModuleProvider>);
        config.add_module(name, ModuleConfiguration::new());
    }
    (catalog, config)
}

// ============================================================================
// 引导基准测试
// ============================================================================

/// 分层依赖：每个模块依赖上一层的两个模块
fn layered_boot_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("boot_layered");

    for count in [10usize, 50, 200] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&rt).iter(|| async move {
                let (catalog, config) = build(count, |i| {
                    if i < 4 {
                        vec![]
                    } else {
                        vec![i - 4, i - 3]
                    }
                });
                let mut manager = ModuleManager::new("bench", catalog);
                manager.init(&config).await.unwrap();
                manager
            });
        });
    }
    group.finish();
}

/// 逆序链：模块 i 依赖模块 i + 1，每轮只能排定一个模块
fn reverse_chain_boot_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("boot_reverse_chain");

    for count in [10usize, 50, 200] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&rt).iter(|| async move {
                let (catalog, config) = build(count, |i| {
                    if i + 1 < count {
                        vec![i + 1]
                    } else {
                        vec![]
                    }
                });
                let mut manager = ModuleManager::new("bench", catalog);
                manager.init(&config).await.unwrap();
                manager
            });
        });
    }
    group.finish();
}

criterion_group!(benches, layered_boot_benchmark, reverse_chain_boot_benchmark);
criterion_main!(benches);
