//! 规则操作符定义

use crate::error::{Result, RuleError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 比较操作符
///
/// 封闭集合，序列化形式即表达式中的符号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "!=")]
    Neq,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Gt,
        Operator::Lt,
        Operator::Eq,
        Operator::Gte,
        Operator::Lte,
        Operator::Neq,
    ];

    /// 从符号解析操作符，`==` 视为 `=` 的别名
    pub fn from_symbol(symbol: &str) -> Result<Self> {
        match symbol {
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            "=" | "==" => Ok(Self::Eq),
            ">=" => Ok(Self::Gte),
            "<=" => Ok(Self::Lte),
            "!=" => Ok(Self::Neq),
            other => Err(RuleError::InvalidOperator(other.to_string())),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Neq => "!=",
        }
    }

    /// 是否为顺序比较（仅对可排序类型有意义）
    pub fn is_ordering(&self) -> bool {
        !matches!(self, Self::Eq | Self::Neq)
    }
}

impl FromStr for Operator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_symbol(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}
