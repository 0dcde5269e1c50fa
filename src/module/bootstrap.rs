//! 启动流程
//!
//! 根据 provider 声明的 required modules 计算启动顺序，
//! 然后按顺序检查服务、启动 provider，最后广播完成通知。
//!
//! # 排序规则
//!
//! 按轮次扫描尚未排序的 provider（扫描顺序即模块加载顺序），
//! 依赖已全部出现在序列中的 provider 立即追加到序列尾部。
//! 某一轮没有任何 provider 被追加说明存在循环依赖。

use std::collections::HashSet;

use tracing::{debug, info};

use crate::module::define::ModuleDefine;
use crate::module::manager::ModuleManager;
use crate::utils::{CoreError, Result};

/// 启动流程
#[derive(Debug)]
pub struct BootstrapFlow<'a> {
    /// 启动顺序
    startup_sequence: Vec<&'a ModuleDefine>,
}

impl<'a> BootstrapFlow<'a> {
    /// 校验依赖并计算启动顺序
    ///
    /// # Arguments
    ///
    /// * `loaded_modules` - 已完成 prepare 的模块，按加载顺序排列
    ///
    /// # Errors
    ///
    /// - 依赖的模块未加载：`ModuleNotFound`
    /// - 存在循环依赖：`CycleDependency`
    pub fn new(loaded_modules: &'a [ModuleDefine]) -> Result<Self> {
        Self::validate(loaded_modules)?;
        let startup_sequence = Self::make_sequence(loaded_modules)?;
        debug!(
            sequence = ?startup_sequence.iter().map(|m| m.name()).collect::<Vec<_>>(),
            "启动顺序"
        );
        Ok(Self { startup_sequence })
    }

    /// 检查每个 required module 都已加载
    fn validate(loaded_modules: &[ModuleDefine]) -> Result<()> {
        let names: HashSet<&str> = loaded_modules.iter().map(|m| m.name()).collect();

        for module in loaded_modules {
            let provider = module.provider()?;
            for required in provider.required_modules() {
                if !names.contains(required.as_str()) {
                    return Err(CoreError::ModuleNotFound(format!(
                        "{} module is required by {}.{}, but not found.",
                        required,
                        provider.module_name(),
                        provider.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// 按轮次生成启动顺序
    fn make_sequence(loaded_modules: &'a [ModuleDefine]) -> Result<Vec<&'a ModuleDefine>> {
        let mut pending: Vec<&'a ModuleDefine> = loaded_modules.iter().collect();
        let mut sequence: Vec<&'a ModuleDefine> = Vec::with_capacity(pending.len());
        let mut sequenced: HashSet<&'a str> = HashSet::with_capacity(pending.len());

        while !pending.is_empty() {
            let before = pending.len();
            let mut remaining = Vec::with_capacity(before);

            for module in pending {
                let ready = module
                    .provider()?
                    .required_modules()
                    .iter()
                    .all(|required| sequenced.contains(required.as_str()));

                if ready {
                    sequenced.insert(module.name());
                    sequence.push(module);
                } else {
                    remaining.push(module);
                }
            }

            if remaining.len() == before {
                return Err(Self::cycle_error(&remaining));
            }
            pending = remaining;
        }

        Ok(sequence)
    }

    /// 列出所有未能排序的 provider
    fn cycle_error(unsequenced: &[&ModuleDefine]) -> CoreError {
        let details: Vec<String> = unsequenced
            .iter()
            .map(|module| match module.provider() {
                Ok(provider) => format!("{}[provider={}]", module.name(), provider.name()),
                Err(_) => module.name().to_string(),
            })
            .collect();

        CoreError::CycleDependency(format!(
            "Exist cycle module dependencies in \n{}",
            details.join("\n")
        ))
    }

    /// 按顺序检查服务并启动 provider
    ///
    /// 任一 provider 失败即中止，已启动的 provider 不做回滚。
    pub async fn start(&self, manager: &ModuleManager) -> Result<()> {
        for module in &self.startup_sequence {
            let provider = module.provider()?;
            info!(
                module = %provider.module_name(),
                provider = %provider.name(),
                "start the provider {} in {} module.",
                provider.name(),
                provider.module_name()
            );

            if let Err(e) = provider.required_check(module.services()) {
                provider.fail().await;
                return Err(e);
            }
            provider.start(manager).await?;
        }
        Ok(())
    }

    /// 所有 provider 启动完成后，按启动顺序广播完成通知
    pub async fn notify_after_completed(&self, manager: &ModuleManager) -> Result<()> {
        for module in &self.startup_sequence {
            module.provider()?.notify_after_completed(manager).await?;
        }
        Ok(())
    }

    /// 启动顺序中的模块
    pub fn modules(&self) -> &[&'a ModuleDefine] {
        &self.startup_sequence
    }

    /// 启动顺序，元素为 `(module, provider)`
    pub fn startup_sequence(&self) -> Vec<(String, String)> {
        self.startup_sequence
            .iter()
            .filter_map(|module| {
                module
                    .provider()
                    .ok()
                    .map(|p| (module.name().to_string(), p.name().to_string()))
            })
            .collect()
    }
}
