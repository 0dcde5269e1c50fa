//! 运行模式

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::CoreError;

/// 运行模式的环境变量
pub const MODE_ENV: &str = "OAP_MODE";

/// 服务端运行模式
///
/// - `Normal`：正常启动并持续运行
/// - `Init`：完成引导（例如初始化存储结构）后立即以 0 退出
/// - `NoInit`：启动但跳过初始化工作，由 provider 自行读取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunningMode {
    /// 正常模式
    #[default]
    Normal,
    /// 只初始化
    Init,
    /// 不初始化
    #[serde(rename = "no-init")]
    NoInit,
}

impl RunningMode {
    /// 从 `OAP_MODE` 读取，未设置时为 `Normal`
    pub fn from_env() -> Result<Self, CoreError> {
        match std::env::var(MODE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(RunningMode::Normal),
        }
    }

    /// 引导完成后是否立即退出
    pub fn exits_after_boot(&self) -> bool {
        matches!(self, RunningMode::Init)
    }

    /// 命令行和配置中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            RunningMode::Normal => "normal",
            RunningMode::Init => "init",
            RunningMode::NoInit => "no-init",
        }
    }
}

impl FromStr for RunningMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "normal" => Ok(RunningMode::Normal),
            "init" => Ok(RunningMode::Init),
            "no-init" | "noinit" | "no_init" => Ok(RunningMode::NoInit),
            other => Err(CoreError::InvalidConfigValue {
                key: MODE_ENV.to_string(),
                reason: format!("unknown running mode '{}'", other),
            }),
        }
    }
}

impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
