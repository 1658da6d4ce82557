//! 规则持久化
//!
//! 持久化层只负责保存规则文本与编码后的语法树，并分配不透明的 ID；
//! 它与存储技术无关，唯一要求是编码结果能原样往返。

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

/// 持久化层中的一行规则数据
#[derive(Debug, Clone, PartialEq)]
pub struct RuleRecord {
    pub id: i64,
    pub rule_text: String,
    pub ast: Value,
    pub created_at: DateTime<Utc>,
}

/// 规则仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// 保存规则，返回新分配的 ID
    async fn store(&self, rule_text: &str, encoded_ast: &Value) -> Result<i64>;

    async fn load(&self, id: i64) -> Result<Option<RuleRecord>>;
}

/// 内存仓储，ID 从 1 开始递增
#[derive(Clone, Default)]
pub struct InMemoryRuleRepository {
    rows: Arc<DashMap<i64, RuleRecord>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn store(&self, rule_text: &str, encoded_ast: &Value) -> Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.insert(
            id,
            RuleRecord {
                id,
                rule_text: rule_text.to_string(),
                ast: encoded_ast.clone(),
                created_at: Utc::now(),
            },
        );
        debug!(id, "rule stored in memory");
        Ok(id)
    }

    async fn load(&self, id: i64) -> Result<Option<RuleRecord>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }
}

/// PostgreSQL 仓储
///
/// 每次调用从连接池借出连接并在结束时归还，不持有长期连接。
pub struct PgRuleRepository {
    pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 创建规则表（若不存在）
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS rules (
                   id BIGSERIAL PRIMARY KEY,
                   rule_text TEXT NOT NULL,
                   ast JSONB NOT NULL,
                   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
               )"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    #[instrument(skip(self, encoded_ast))]
    async fn store(&self, rule_text: &str, encoded_ast: &Value) -> Result<i64> {
        let row = sqlx::query(
            r#"INSERT INTO rules (rule_text, ast)
               VALUES ($1, $2)
               RETURNING id"#,
        )
        .bind(rule_text)
        .bind(encoded_ast)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("id")?)
    }

    #[instrument(skip(self))]
    async fn load(&self, id: i64) -> Result<Option<RuleRecord>> {
        let row = sqlx::query(
            r#"SELECT id, rule_text, ast, created_at
               FROM rules
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<RuleRecord> {
            Ok(RuleRecord {
                id: r.try_get("id")?,
                rule_text: r.try_get("rule_text")?,
                ast: r.try_get("ast")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }
}
