//! 服务能力标识
//!
//! 每个服务契约通过 [`Capability`] 暴露一个常量 [`CapabilityId`]，
//! 服务注册表以该标识为键，在取出时再收窄为具体的服务类型。
//!
//! # 示例
//!
//! ```rust
//! use oap_core::module::capability::{Capability, CapabilityId};
//!
//! pub trait TraceQueryService: Send + Sync {
//!     fn query(&self, trace_id: &str) -> Vec<String>;
//! }
//!
//! pub struct TraceQuery;
//!
//! impl Capability for TraceQuery {
//!     const ID: CapabilityId = CapabilityId::new("query.trace");
//!     type Service = dyn TraceQueryService;
//! }
//!
//! assert_eq!(TraceQuery::ID.as_str(), "query.trace");
//! ```

use std::fmt;

/// 服务能力标识
///
/// 值类型的令牌，唯一命名一个服务契约。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityId(&'static str);

impl CapabilityId {
    /// 创建能力标识
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    /// 标识字符串
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl From<CapabilityId> for String {
    fn from(id: CapabilityId) -> Self {
        id.0.to_string()
    }
}

/// 服务契约
///
/// 将能力标识绑定到服务类型。服务实例以 `Arc<Self::Service>` 共享，
/// 因此 `Service` 通常是一个 trait object。
pub trait Capability: 'static {
    /// 能力标识
    const ID: CapabilityId;

    /// 服务类型
    type Service: ?Sized + Send + Sync + 'static;
}
