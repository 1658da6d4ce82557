//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("语法错误 (位置 {position}, 记号 '{token}'): {message}")]
    Syntax {
        message: String,
        position: usize,
        token: String,
    },

    #[error("无效的操作符: {0}")]
    InvalidOperator(String),

    #[error("类型不匹配: 字段 {attribute} 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    #[error("编码数据损坏 ({path}): {message}")]
    CorruptEncoding { path: String, message: String },

    #[error("规则编译失败: {0}")]
    CompileError(String),

    #[error("无效的记录: {0}")]
    InvalidRecord(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(i64),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
}

impl RuleError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize, token: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
            token: token.into(),
        }
    }

    pub(crate) fn corrupt(path: &str, message: impl Into<String>) -> Self {
        Self::CorruptEncoding {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SYNTAX_ERROR",
            Self::InvalidOperator(_) => "INVALID_OPERATOR",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::CorruptEncoding { .. } => "CORRUPT_ENCODING",
            Self::CompileError(_) => "COMPILE_ERROR",
            Self::InvalidRecord(_) => "INVALID_RECORD",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::JsonError(_) => "JSON_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
