//! Provider 生命周期
//!
//! 管理 provider 的状态转换：
//!
//! ```text
//! Created ──prepare──▶ Prepared ──start──▶ Started ──notify──▶ Completed
//!    │                    │                   │
//!    └────────────────────┴───────────────────┴──▶ Failed（终态）
//! ```
//!
//! 状态只能单调前进，`Failed` 之后不允许任何转换。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::utils::{CoreError, Result};

/// Provider 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// 已创建，可以注册服务
    #[default]
    Created,
    /// prepare 完成，注册表已封存
    Prepared,
    /// start 完成
    Started,
    /// 已收到完成广播
    Completed,
    /// 失败（终态）
    Failed,
}

impl ProviderState {
    /// 是否允许转换到目标状态
    pub fn can_advance_to(&self, next: ProviderState) -> bool {
        matches!(
            (self, next),
            (ProviderState::Created, ProviderState::Prepared)
                | (ProviderState::Prepared, ProviderState::Started)
                | (ProviderState::Started, ProviderState::Completed)
                | (ProviderState::Created, ProviderState::Failed)
                | (ProviderState::Prepared, ProviderState::Failed)
                | (ProviderState::Started, ProviderState::Failed)
        )
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProviderState::Completed | ProviderState::Failed)
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderState::Created => "created",
            ProviderState::Prepared => "prepared",
            ProviderState::Started => "started",
            ProviderState::Completed => "completed",
            ProviderState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 单个 provider 的生命周期状态机
///
/// 启动阶段 provider 只以共享引用被访问，状态放在锁内。
#[derive(Debug, Clone)]
pub struct Lifecycle {
    /// 所属 provider 标识
    owner: String,
    /// 当前状态
    state: Arc<RwLock<ProviderState>>,
}

impl Lifecycle {
    /// 创建处于 `Created` 状态的生命周期
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            state: Arc::new(RwLock::new(ProviderState::Created)),
        }
    }

    /// 当前状态
    pub async fn current(&self) -> ProviderState {
        *self.state.read().await
    }

    /// 推进到下一个状态
    ///
    /// # Errors
    ///
    /// 转换不合法时返回 `IllegalState`，状态保持不变
    pub async fn advance(&self, next: ProviderState) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.can_advance_to(next) {
            error!(owner = %self.owner, from = %*state, to = %next, "非法的状态转换");
            return Err(CoreError::IllegalState {
                owner: self.owner.clone(),
                from: state.to_string(),
                to: next.to_string(),
            });
        }

        debug!(owner = %self.owner, from = %*state, to = %next, "状态转换");
        *state = next;
        Ok(())
    }

    /// 断言当前处于指定状态
    pub async fn expect(&self, expected: ProviderState, next: ProviderState) -> Result<()> {
        let state = self.current().await;
        if state != expected {
            return Err(CoreError::IllegalState {
                owner: self.owner.clone(),
                from: state.to_string(),
                to: next.to_string(),
            });
        }
        Ok(())
    }

    /// 标记为失败
    ///
    /// 已是终态时保持原状态。
    pub async fn fail(&self) {
        let mut state = self.state.write().await;
        if state.can_advance_to(ProviderState::Failed) {
            *state = ProviderState::Failed;
        }
    }

    /// 所属 provider 标识
    pub fn owner(&self) -> &str {
        &self.owner
    }
}
