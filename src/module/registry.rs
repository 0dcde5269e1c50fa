//! 服务注册表
//!
//! 每个 provider 私有一个注册表，在 prepare 阶段注册自身实现的服务，
//! prepare 结束后注册表被封存，只允许查询。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::module::capability::{Capability, CapabilityId};
use crate::utils::{CoreError, Result};

/// 服务注册表
///
/// 管理 capability-id 到服务实例的映射：
/// - 同一注册表中标识唯一
/// - 不支持移除
/// - 封存后拒绝注册
pub struct ServiceRegistry {
    /// 所属 provider 的标识，格式为 `module.provider`
    owner: String,

    /// 已注册服务：capability-id -> Arc<C::Service>
    services: HashMap<CapabilityId, Box<dyn Any + Send + Sync>>,

    /// 注册顺序
    order: Vec<CapabilityId>,

    /// 是否已封存
    sealed: bool,
}

impl ServiceRegistry {
    /// 创建新的服务注册表
    ///
    /// # Arguments
    ///
    /// * `owner` - 所属 provider 的标识，用于错误信息
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            services: HashMap::new(),
            order: Vec::new(),
            sealed: false,
        }
    }

    /// 注册服务实例
    ///
    /// # Errors
    ///
    /// - 注册表已封存：`SealedRegistry`
    /// - 标识已被注册：`ServiceConflict`
    pub fn register<C: Capability>(&mut self, service: Arc<C::Service>) -> Result<()> {
        if self.sealed {
            return Err(CoreError::SealedRegistry {
                capability: C::ID.into(),
                owner: self.owner.clone(),
            });
        }

        if self.services.contains_key(&C::ID) {
            return Err(CoreError::ServiceConflict {
                capability: C::ID.into(),
                owner: self.owner.clone(),
            });
        }

        self.services.insert(C::ID, Box::new(service));
        self.order.push(C::ID);
        debug!(owner = %self.owner, capability = %C::ID, "服务已注册");
        Ok(())
    }

    /// 获取服务实例
    ///
    /// # Errors
    ///
    /// 标识未注册或类型不匹配时返回 `ServiceNotProvided`
    pub fn get<C: Capability>(&self) -> Result<Arc<C::Service>> {
        let entry = self.services.get(&C::ID).ok_or_else(|| {
            CoreError::ServiceNotProvided(format!(
                "Service {} is not provided by {}.",
                C::ID,
                self.owner
            ))
        })?;

        entry
            .downcast_ref::<Arc<C::Service>>()
            .cloned()
            .ok_or_else(|| {
                CoreError::ServiceNotProvided(format!(
                    "Service {} registered by {} does not match type {}",
                    C::ID,
                    self.owner,
                    std::any::type_name::<C::Service>()
                ))
            })
    }

    /// 是否包含指定标识
    pub fn contains(&self, id: CapabilityId) -> bool {
        self.services.contains_key(&id)
    }

    /// 按注册顺序返回所有标识
    pub fn ids(&self) -> &[CapabilityId] {
        &self.order
    }

    /// 已注册服务数量
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 封存注册表
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// 是否已封存
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// 所属 provider 标识
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("owner", &self.owner)
            .field("services", &self.order)
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct GreeterService;

    impl Capability for GreeterService {
        const ID: CapabilityId = CapabilityId::new("test.greeter");
        type Service = dyn Greeter;
    }

    struct CounterService;

    impl Capability for CounterService {
        const ID: CapabilityId = CapabilityId::new("test.counter");
        type Service = std::sync::atomic::AtomicUsize;
    }

    /// 与 GreeterService 共用标识但类型不同
    struct Impostor;

    impl Capability for Impostor {
        const ID: CapabilityId = CapabilityId::new("test.greeter");
        type Service = String;
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ServiceRegistry::new("core.default");
        registry
            .register::<GreeterService>(Arc::new(English))
            .unwrap();

        let greeter = registry.get::<GreeterService>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(registry.contains(GreeterService::ID));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_conflict() {
        let mut registry = ServiceRegistry::new("core.default");
        registry.register::<GreeterService>(Arc::new(English)).unwrap();

        let result = registry.register::<GreeterService>(Arc::new(English));
        assert!(matches!(result, Err(CoreError::ServiceConflict { .. })));
    }

    #[test]
    fn test_register_after_seal() {
        let mut registry = ServiceRegistry::new("core.default");
        registry.seal();

        let result = registry.register::<GreeterService>(Arc::new(English));
        assert!(matches!(result, Err(CoreError::SealedRegistry { .. })));
        assert!(registry.is_sealed());
    }

    #[test]
    fn test_get_missing() {
        let registry = ServiceRegistry::new("core.default");
        let result = registry.get::<CounterService>();
        assert!(matches!(result, Err(CoreError::ServiceNotProvided(_))));
    }

    #[test]
    fn test_get_type_mismatch() {
        let mut registry = ServiceRegistry::new("core.default");
        registry.register::<GreeterService>(Arc::new(English)).unwrap();

        let result = registry.get::<Impostor>();
        assert!(matches!(result, Err(CoreError::ServiceNotProvided(_))));
    }

    #[test]
    fn test_lookup_after_seal() {
        let mut registry = ServiceRegistry::new("core.default");
        registry
            .register::<CounterService>(Arc::new(std::sync::atomic::AtomicUsize::new(3)))
            .unwrap();
        registry.register::<GreeterService>(Arc::new(English)).unwrap();
        registry.seal();

        let counter = registry.get::<CounterService>().unwrap();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(registry.ids(), &[CounterService::ID, GreeterService::ID]);
    }
}
