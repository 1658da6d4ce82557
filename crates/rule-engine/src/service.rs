//! 规则服务
//!
//! 对外的评估入口：串联解析、编码、持久化与缓存。
//!
//! ## 数据流
//!
//! - 创建：文本 -> 解析 -> 编码 -> 仓储分配 ID -> 写入缓存
//! - 加载：缓存命中直接返回，否则从仓储读取并解码
//! - 组合：按 ID 加载已有规则，以逻辑操作符折叠后作为新规则持久化

use std::sync::Arc;

use tracing::{debug, info, instrument};

use rule_shared::config::EngineConfig;

use crate::codec;
use crate::combinators::combine_all;
use crate::compiler::RuleCompiler;
use crate::error::{Result, RuleError};
use crate::executor::RuleExecutor;
use crate::models::{EvaluationResult, Record, RuleNode, StoredRule};
use crate::operators::LogicalOperator;
use crate::parser::Parser;
use crate::repository::RuleRepository;
use crate::store::RuleStore;

/// 规则服务
pub struct RuleService<R: RuleRepository> {
    repository: Arc<R>,
    store: RuleStore,
    parser: Parser,
    executor: RuleExecutor,
}

impl<R: RuleRepository> RuleService<R> {
    pub fn new(repository: Arc<R>, config: &EngineConfig) -> Self {
        Self {
            repository,
            store: RuleStore::with_compiler(RuleCompiler::from_config(config)),
            parser: Parser::with_limits(config.into()),
            executor: RuleExecutor::from_config(config),
        }
    }

    /// 已编译规则缓存
    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    /// 解析并持久化一条规则
    #[instrument(skip(self))]
    pub async fn create_rule(&self, rule_text: &str) -> Result<StoredRule> {
        let ast = self.parser.parse(rule_text)?;
        self.persist(rule_text.to_string(), ast).await
    }

    /// 按 ID 加载规则，优先读取缓存
    #[instrument(skip(self))]
    pub async fn load_rule(&self, id: i64) -> Result<StoredRule> {
        if let Some(compiled) = self.store.get(id) {
            debug!(id, "rule cache hit");
            return Ok(StoredRule {
                id,
                rule_text: compiled.source().to_string(),
                ast: compiled.root,
            });
        }

        let record = self
            .repository
            .load(id)
            .await?
            .ok_or(RuleError::RuleNotFound(id))?;

        let max_depth = self.parser.limits().max_tree_depth;
        let ast = codec::decode_with_max_depth(&record.ast, max_depth)?;
        self.store.load_node(id, &record.rule_text, ast.clone())?;

        Ok(StoredRule {
            id,
            rule_text: record.rule_text,
            ast,
        })
    }

    /// 评估已存储的规则
    #[instrument(skip(self, record))]
    pub async fn evaluate_rule(&self, id: i64, record: &Record) -> Result<EvaluationResult> {
        let rule = self.load_rule(id).await?;
        self.executor.execute(&rule.ast, record)
    }

    /// 直接评估规则文本，不经过持久化
    #[instrument(skip(self, record))]
    pub fn evaluate_text(&self, rule_text: &str, record: &Record) -> Result<EvaluationResult> {
        let ast = self.parser.parse(rule_text)?;
        self.executor.execute(&ast, record)
    }

    /// 组合多条已存储的规则并作为新规则持久化
    ///
    /// 新规则的文本形如 `(r1) AND (r2)`，原有规则保持不变。
    #[instrument(skip(self))]
    pub async fn combine_rules(&self, ids: &[i64], operator: LogicalOperator) -> Result<StoredRule> {
        let mut texts = Vec::with_capacity(ids.len());
        let mut nodes = Vec::with_capacity(ids.len());
        for &id in ids {
            let rule = self.load_rule(id).await?;
            texts.push(format!("({})", rule.rule_text));
            nodes.push(rule.ast);
        }

        let ast = combine_all(nodes, operator)
            .ok_or_else(|| RuleError::CompileError("组合规则至少需要一条规则".to_string()))?;
        let rule_text = texts.join(&format!(" {} ", operator));

        self.persist(rule_text, ast).await
    }

    async fn persist(&self, rule_text: String, ast: RuleNode) -> Result<StoredRule> {
        self.store.validate(&ast)?;

        let encoded = codec::encode(&ast);
        let id = self.repository.store(&rule_text, &encoded).await?;
        self.store.load_node(id, &rule_text, ast.clone())?;

        info!(id, conditions = ast.condition_count(), "规则已保存");
        Ok(StoredRule { id, rule_text, ast })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::repository::{InMemoryRuleRepository, MockRuleRepository, RuleRecord};
    use chrono::Utc;
    use mockall::predicate::eq;
    use rule_shared::config::TypeMismatchPolicy;
    use serde_json::json;

    fn service() -> RuleService<InMemoryRuleRepository> {
        RuleService::new(
            Arc::new(InMemoryRuleRepository::new()),
            &EngineConfig::default(),
        )
    }

    fn employee() -> Record {
        Record::new()
            .with("age", 35)
            .with("salary", 60000)
            .with("department", "Sales")
    }

    #[tokio::test]
    async fn test_create_and_evaluate() {
        let service = service();
        let rule = service
            .create_rule("age > 30 AND salary > 50000")
            .await
            .unwrap();

        assert_eq!(rule.id, 1);
        assert!(service.store().contains(rule.id));

        let result = service.evaluate_rule(rule.id, &employee()).await.unwrap();
        assert!(result.matched);
    }

    #[tokio::test]
    async fn test_create_rule_rejects_invalid_text() {
        let service = service();
        let err = service.create_rule("age > 30 AND").await.unwrap_err();
        assert!(matches!(err, RuleError::Syntax { .. }));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_load_rule_not_found() {
        let service = service();
        assert!(matches!(
            service.load_rule(404).await,
            Err(RuleError::RuleNotFound(404))
        ));
    }

    #[tokio::test]
    async fn test_load_rule_after_cache_cleared() {
        let service = service();
        let created = service.create_rule("age > 30 OR vip = true").await.unwrap();

        service.store().clear();
        let loaded = service.load_rule(created.id).await.unwrap();

        assert_eq!(loaded, created);
        assert!(service.store().contains(created.id));
    }

    #[tokio::test]
    async fn test_combine_rules() {
        let service = service();
        let age = service.create_rule("age > 30").await.unwrap();
        let dept = service
            .create_rule("department = 'Sales' OR department = 'Marketing'")
            .await
            .unwrap();

        let combined = service
            .combine_rules(&[age.id, dept.id], LogicalOperator::And)
            .await
            .unwrap();

        assert_eq!(
            combined.rule_text,
            "(age > 30) AND (department = 'Sales' OR department = 'Marketing')"
        );
        assert_eq!(combined.ast, RuleNode::and(age.ast.clone(), dept.ast.clone()));
        assert!(service.evaluate_rule(combined.id, &employee()).await.unwrap().matched);

        // 原规则不受影响
        assert_eq!(service.load_rule(age.id).await.unwrap(), age);
    }

    #[tokio::test]
    async fn test_combine_rules_requires_input() {
        let service = service();
        assert!(matches!(
            service.combine_rules(&[], LogicalOperator::Or).await,
            Err(RuleError::CompileError(_))
        ));
    }

    #[tokio::test]
    async fn test_combine_rules_respects_condition_limit() {
        let config = EngineConfig {
            max_conditions: 2,
            ..Default::default()
        };
        let service = RuleService::new(Arc::new(InMemoryRuleRepository::new()), &config);
        let first = service.create_rule("a = 1 AND b = 2").await.unwrap();
        let second = service.create_rule("c = 3").await.unwrap();

        assert!(matches!(
            service
                .combine_rules(&[first.id, second.id], LogicalOperator::Or)
                .await,
            Err(RuleError::CompileError(_))
        ));
    }

    #[tokio::test]
    async fn test_combine_rules_respects_tree_depth_limit() {
        let config = EngineConfig {
            max_tree_depth: 3,
            ..Default::default()
        };
        let service = RuleService::new(Arc::new(InMemoryRuleRepository::new()), &config);
        let first = service.create_rule("a = 1 AND b = 2 AND c = 3").await.unwrap();
        let second = service.create_rule("d = 4").await.unwrap();

        let err = service
            .combine_rules(&[first.id, second.id], LogicalOperator::Or)
            .await
            .unwrap_err();
        assert!(matches!(err, RuleError::CompileError(ref m) if m.contains("语法树深度")));
    }

    #[tokio::test]
    async fn test_load_rule_rejects_row_deeper_than_limit() {
        let deep = parse("a = 1 AND b = 2 AND c = 3").unwrap();
        let mut repo = MockRuleRepository::new();
        repo.expect_load().returning(move |id| {
            Ok(Some(RuleRecord {
                id,
                rule_text: deep.to_string(),
                ast: codec::encode(&deep),
                created_at: Utc::now(),
            }))
        });

        let config = EngineConfig {
            max_tree_depth: 2,
            ..Default::default()
        };
        let service = RuleService::new(Arc::new(repo), &config);
        assert!(matches!(
            service.load_rule(3).await,
            Err(RuleError::CorruptEncoding { .. })
        ));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_text_uses_policy() {
        let config = EngineConfig {
            type_mismatch_policy: TypeMismatchPolicy::TreatAsFalse,
            ..Default::default()
        };
        let service = RuleService::new(Arc::new(InMemoryRuleRepository::new()), &config);
        let record = employee().with("name", "alice");

        let result = service.evaluate_text("name > 1 OR age > 30", &record).unwrap();
        assert!(result.matched);
    }

    #[tokio::test]
    async fn test_create_rule_stores_encoded_tree() {
        let mut repo = MockRuleRepository::new();
        repo.expect_store()
            .times(1)
            .withf(|text, ast| text.to_string() == "age > 30" && ast["node_type"] == "condition")
            .returning(|_, _| Ok(42));

        let service = RuleService::new(Arc::new(repo), &EngineConfig::default());
        let rule = service.create_rule("age > 30").await.unwrap();

        assert_eq!(rule.id, 42);
        assert_eq!(rule.ast, parse("age > 30").unwrap());
    }

    #[tokio::test]
    async fn test_load_rule_decodes_legacy_row() {
        let mut repo = MockRuleRepository::new();
        repo.expect_load().with(eq(7)).times(1).returning(|id| {
            Ok(Some(RuleRecord {
                id,
                rule_text: "age > 30".to_string(),
                ast: json!({"node_type": "condition", "left": null, "right": null, "value": "age > 30"}),
                created_at: Utc::now(),
            }))
        });

        let service = RuleService::new(Arc::new(repo), &EngineConfig::default());
        let rule = service.load_rule(7).await.unwrap();
        assert_eq!(rule.ast, parse("age > 30").unwrap());

        // 第二次命中缓存，不再访问仓储
        service.load_rule(7).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_rule_reports_corrupt_row() {
        let mut repo = MockRuleRepository::new();
        repo.expect_load().returning(|id| {
            Ok(Some(RuleRecord {
                id,
                rule_text: "broken".to_string(),
                ast: json!({"node_type": "XOR"}),
                created_at: Utc::now(),
            }))
        });

        let service = RuleService::new(Arc::new(repo), &EngineConfig::default());
        assert!(matches!(
            service.load_rule(1).await,
            Err(RuleError::CorruptEncoding { .. })
        ));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_repository_failure_is_not_cached() {
        let mut repo = MockRuleRepository::new();
        repo.expect_store()
            .returning(|_, _| Err(RuleError::Database(sqlx::Error::PoolTimedOut)));

        let service = RuleService::new(Arc::new(repo), &EngineConfig::default());
        assert!(matches!(
            service.create_rule("age > 30").await,
            Err(RuleError::Database(_))
        ));
        assert!(service.store().is_empty());
    }
}
