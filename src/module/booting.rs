//! 引导参数表
//!
//! 配置加载器和 provider 在引导过程中追加 `(label, value)` 行，
//! 每次引导结束（无论成功与否）都以终端友好的表格形式输出到日志。

use std::fmt;

use serde::Serialize;

/// 引导参数中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootingRow {
    /// 标签
    pub label: String,
    /// 值
    pub value: String,
}

/// 引导参数表
#[derive(Debug, Clone, Default, Serialize)]
pub struct BootingParameters {
    /// 表头描述
    description: String,
    /// 按追加顺序排列的行
    rows: Vec<BootingRow>,
}

impl BootingParameters {
    /// 创建参数表
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            rows: Vec::new(),
        }
    }

    /// 追加一行
    pub fn add_row(&mut self, label: impl Into<String>, value: impl fmt::Display) {
        self.rows.push(BootingRow {
            label: label.into(),
            value: value.to_string(),
        });
    }

    /// 所有行
    pub fn rows(&self) -> &[BootingRow] {
        &self.rows
    }

    /// 查找标签对应的第一个值
    pub fn get(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.label == label)
            .map(|row| row.value.as_str())
    }

    /// 表头描述
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 行数
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for BootingParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self
            .rows
            .iter()
            .map(|row| row.label.chars().count())
            .max()
            .unwrap_or(0)
            .max("Key".len());
        let value_width = self
            .rows
            .iter()
            .map(|row| row.value.chars().count())
            .max()
            .unwrap_or(0)
            .max("Value".len());
        let border = format!(
            "+-{}-+-{}-+",
            "-".repeat(label_width),
            "-".repeat(value_width)
        );

        writeln!(f, "{}", self.description)?;
        writeln!(f, "{}", border)?;
        writeln!(
            f,
            "| {:<lw$} | {:<vw$} |",
            "Key",
            "Value",
            lw = label_width,
            vw = value_width
        )?;
        writeln!(f, "{}", border)?;
        for row in &self.rows {
            writeln!(
                f,
                "| {:<lw$} | {:<vw$} |",
                row.label,
                row.value,
                lw = label_width,
                vw = value_width
            )?;
        }
        write!(f, "{}", border)
    }
}
