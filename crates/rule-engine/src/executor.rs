//! 规则执行器
//!
//! 对语法树做短路求值，返回匹配结果和评估追踪信息。
//! 求值是纯函数：相同的语法树与记录总是得到相同结果。

use crate::error::{Result, RuleError};
use crate::evaluator::ConditionEvaluator;
use crate::models::{Condition, EvaluationResult, Record, RuleNode};
use rule_shared::config::{EngineConfig, TypeMismatchPolicy};
use std::time::Instant;
use tracing::{debug, warn};

/// 规则执行器
#[derive(Debug, Clone, Default)]
pub struct RuleExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
    type_mismatch_policy: TypeMismatchPolicy,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            trace_enabled: config.trace,
            type_mismatch_policy: config.type_mismatch_policy,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_type_mismatch_policy(mut self, policy: TypeMismatchPolicy) -> Self {
        self.type_mismatch_policy = policy;
        self
    }

    /// 执行规则评估
    pub fn execute(&self, root: &RuleNode, record: &Record) -> Result<EvaluationResult> {
        let start = Instant::now();
        let mut result = EvaluationResult::new();

        let matched = self.evaluate_node(root, record, &mut result, "root")?;

        result.matched = matched;
        result.evaluation_time_ms = start.elapsed().as_millis() as i64;

        debug!(matched, conditions = result.matched_conditions.len(), "rule evaluated");
        Ok(result)
    }

    /// 只返回布尔结果
    pub fn evaluate(&self, root: &RuleNode, record: &Record) -> Result<bool> {
        self.execute(root, record).map(|r| r.matched)
    }

    fn evaluate_node(
        &self,
        node: &RuleNode,
        record: &Record,
        result: &mut EvaluationResult,
        path: &str,
    ) -> Result<bool> {
        match node {
            RuleNode::Condition(cond) => self.evaluate_condition(cond, record, result, path),
            RuleNode::And(left, right) => {
                let left_path = format!("{}.left", path);
                if !self.evaluate_node(left, record, result, &left_path)? {
                    self.trace(result, || format!("{}: AND 短路 - 左子树不匹配", path));
                    return Ok(false);
                }
                let right_path = format!("{}.right", path);
                let matched = self.evaluate_node(right, record, result, &right_path)?;
                self.trace(result, || format!("{}: AND => {}", path, matched));
                Ok(matched)
            }
            RuleNode::Or(left, right) => {
                let left_path = format!("{}.left", path);
                if self.evaluate_node(left, record, result, &left_path)? {
                    self.trace(result, || format!("{}: OR 短路 - 左子树匹配", path));
                    return Ok(true);
                }
                let right_path = format!("{}.right", path);
                let matched = self.evaluate_node(right, record, result, &right_path)?;
                self.trace(result, || format!("{}: OR => {}", path, matched));
                Ok(matched)
            }
        }
    }

    fn evaluate_condition(
        &self,
        cond: &Condition,
        record: &Record,
        result: &mut EvaluationResult,
        path: &str,
    ) -> Result<bool> {
        let field_value = record.get(cond.attribute());

        let matched = match ConditionEvaluator::evaluate(field_value, cond) {
            Ok(matched) => matched,
            Err(err @ RuleError::TypeMismatch { .. })
                if self.type_mismatch_policy == TypeMismatchPolicy::TreatAsFalse =>
            {
                warn!(path, condition = %cond, error = %err, "type mismatch treated as false");
                false
            }
            Err(err) => return Err(err),
        };

        self.trace(result, || {
            let outcome = match (field_value.is_some(), matched) {
                (false, _) => "MISSING",
                (true, true) => "MATCHED",
                (true, false) => "NOT_MATCHED",
            };
            format!("{}: {} => {}", path, cond, outcome)
        });

        if matched {
            result.matched_conditions.push(cond.to_string());
        }

        Ok(matched)
    }

    fn trace<F>(&self, result: &mut EvaluationResult, message: F)
    where
        F: FnOnce() -> String,
    {
        if self.trace_enabled {
            result.evaluation_trace.push(message());
        }
    }
}

/// 使用默认执行器评估规则（类型不匹配作为错误返回）
pub fn evaluate(root: &RuleNode, record: &Record) -> Result<bool> {
    RuleExecutor::new().evaluate(root, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn record() -> Record {
        Record::new().with("age", 35).with("salary", 60000)
    }

    #[test]
    fn test_simple_condition() {
        assert!(evaluate(&parse("age > 30").unwrap(), &record()).unwrap());
        assert!(!evaluate(&parse("age > 40").unwrap(), &record()).unwrap());
    }

    #[test]
    fn test_and_short_circuit_skips_right() {
        // 右子树类型不匹配，但左子树已为 false，不应评估右子树
        let ast = parse("age > 40 AND name > 1").unwrap();
        let record = record().with("name", "alice");
        assert!(!evaluate(&ast, &record).unwrap());

        let ast = parse("age > 30 AND name > 1").unwrap();
        assert!(matches!(
            evaluate(&ast, &record),
            Err(RuleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_or_short_circuit_skips_right() {
        let ast = parse("age > 30 OR name > 1").unwrap();
        let record = record().with("name", "alice");
        assert!(evaluate(&ast, &record).unwrap());
    }

    #[test]
    fn test_type_mismatch_policy_treat_as_false() {
        let ast = parse("name > 1 OR age > 30").unwrap();
        let record = record().with("name", "alice");
        let executor =
            RuleExecutor::new().with_type_mismatch_policy(TypeMismatchPolicy::TreatAsFalse);
        assert!(executor.evaluate(&ast, &record).unwrap());

        let ast = parse("name > 1").unwrap();
        assert!(!executor.evaluate(&ast, &record).unwrap());
    }

    #[test]
    fn test_trace_records_short_circuit() {
        let ast = parse("age > 100 AND salary > 50000").unwrap();
        let executor = RuleExecutor::new().with_trace();
        let result = executor.execute(&ast, &record()).unwrap();

        assert!(!result.matched);
        assert_eq!(result.evaluation_trace.len(), 2);
        assert_eq!(result.evaluation_trace[0], "root.left: age > 100 => NOT_MATCHED");
        assert!(result.evaluation_trace[1].contains("AND 短路"));
    }

    #[test]
    fn test_trace_marks_missing_attribute() {
        let ast = parse("height > 5").unwrap();
        let result = RuleExecutor::new()
            .with_trace()
            .execute(&ast, &record())
            .unwrap();
        assert_eq!(result.evaluation_trace, vec!["root: height > 5 => MISSING"]);
    }

    #[test]
    fn test_matched_conditions() {
        let ast = parse("age > 30 AND salary > 50000").unwrap();
        let result = RuleExecutor::new().execute(&ast, &record()).unwrap();
        assert!(result.matched);
        assert_eq!(
            result.matched_conditions,
            vec!["age > 30".to_string(), "salary > 50000".to_string()]
        );
        assert!(result.evaluation_trace.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = EngineConfig {
            trace: true,
            type_mismatch_policy: TypeMismatchPolicy::TreatAsFalse,
            ..Default::default()
        };
        let executor = RuleExecutor::from_config(&config);
        let result = executor
            .execute(&parse("age = 'x'").unwrap(), &record())
            .unwrap();
        assert!(!result.matched);
        assert_eq!(result.evaluation_trace.len(), 1);
    }
}
