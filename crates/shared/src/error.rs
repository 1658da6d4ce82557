//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum SharedError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 本库内部不做重试，由调用方依据该标志决定重试策略。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = SharedError::from(config::ConfigError::NotFound("engine.max_depth".to_string()));
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().starts_with("配置错误: "));

        assert_eq!(SharedError::Database(sqlx::Error::PoolClosed).code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = SharedError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let config_err = SharedError::Config(config::ConfigError::Message("bad".to_string()));
        assert!(!config_err.is_retryable());
        assert!(!SharedError::Database(sqlx::Error::RowNotFound).is_retryable());
    }
}
