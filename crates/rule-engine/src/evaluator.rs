//! 条件评估器
//!
//! 将记录中的字段值与条件字面量按操作符语义比较。
//! 不做跨类型的隐式转换：数值字面量只与 JSON 数值比较，文本只与字符串比较。

use crate::error::{Result, RuleError};
use crate::models::{json_type_name, Condition, Literal};
use crate::operators::Operator;
use serde_json::Value;
use std::cmp::Ordering;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `field_value` - 从记录中获取的字段值
    /// * `condition` - 待评估的条件
    ///
    /// 字段缺失或为 null 时返回 `Ok(false)`：缺失属性视为条件不满足而非错误。
    pub fn evaluate(field_value: Option<&Value>, condition: &Condition) -> Result<bool> {
        let field_value = match field_value {
            None | Some(Value::Null) => return Ok(false),
            Some(v) => v,
        };

        let operator = condition.operator();
        let ordering = match condition.value() {
            Literal::Number(expected) => {
                let actual = field_value
                    .as_f64()
                    .ok_or_else(|| Self::mismatch(condition, field_value))?;
                return Ok(Self::compare_numbers(actual, *expected, operator));
            }
            Literal::Text(expected) => {
                let actual = field_value
                    .as_str()
                    .ok_or_else(|| Self::mismatch(condition, field_value))?;
                actual.cmp(expected.as_str())
            }
            Literal::Bool(expected) => {
                let actual = field_value
                    .as_bool()
                    .ok_or_else(|| Self::mismatch(condition, field_value))?;
                if operator.is_ordering() {
                    return Err(RuleError::TypeMismatch {
                        attribute: condition.attribute().to_string(),
                        expected: "number or string (ordering comparison)".to_string(),
                        actual: "boolean".to_string(),
                    });
                }
                actual.cmp(expected)
            }
        };

        Ok(Self::apply(ordering, operator))
    }

    /// 数值精确比较；记录与字面量都以 f64 表示，100 与 100.0 相等
    fn compare_numbers(actual: f64, expected: f64, operator: Operator) -> bool {
        match operator {
            Operator::Eq => actual == expected,
            Operator::Neq => actual != expected,
            Operator::Gt => actual > expected,
            Operator::Gte => actual >= expected,
            Operator::Lt => actual < expected,
            Operator::Lte => actual <= expected,
        }
    }

    fn apply(ordering: Ordering, operator: Operator) -> bool {
        match operator {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Neq => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
        }
    }

    fn mismatch(condition: &Condition, actual: &Value) -> RuleError {
        RuleError::TypeMismatch {
            attribute: condition.attribute().to_string(),
            expected: condition.value().type_name().to_string(),
            actual: json_type_name(actual).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(field: Option<Value>, op: Operator, literal: impl Into<Literal>) -> Result<bool> {
        let condition = Condition::new("field", op, literal);
        ConditionEvaluator::evaluate(field.as_ref(), &condition)
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(eval(Some(json!(35)), Operator::Gt, 30).unwrap());
        assert!(!eval(Some(json!(20)), Operator::Gt, 30).unwrap());
        assert!(!eval(Some(json!(30)), Operator::Gt, 30).unwrap());
        assert!(eval(Some(json!(30)), Operator::Gte, 30).unwrap());
        assert!(eval(Some(json!(29.5)), Operator::Lt, 30).unwrap());
        assert!(eval(Some(json!(30)), Operator::Lte, 30).unwrap());
        assert!(eval(Some(json!(7)), Operator::Neq, 8).unwrap());
    }

    #[test]
    fn test_eq_integer_and_float() {
        assert!(eval(Some(json!(100.0)), Operator::Eq, 100).unwrap());
        assert!(eval(Some(json!(100)), Operator::Eq, 100.0).unwrap());
    }

    #[test]
    fn test_numeric_comparison_is_exact() {
        assert!(!eval(Some(json!(0)), Operator::Eq, 1e-16).unwrap());
        assert!(eval(Some(json!(1e-16)), Operator::Gt, 0).unwrap());
        assert!(eval(Some(json!(0.1 + 0.2)), Operator::Neq, 0.3).unwrap());
        assert!(eval(Some(json!(1e20)), Operator::Eq, 1e20).unwrap());
        assert!(eval(Some(json!(1e20)), Operator::Lte, 1e20).unwrap());
    }

    #[test]
    fn test_text_comparisons() {
        assert!(eval(Some(json!("Sales")), Operator::Eq, "Sales").unwrap());
        assert!(!eval(Some(json!("Sales")), Operator::Eq, "Marketing").unwrap());
        assert!(eval(Some(json!("b")), Operator::Gt, "a").unwrap());
    }

    #[test]
    fn test_bool_comparisons() {
        assert!(eval(Some(json!(true)), Operator::Eq, true).unwrap());
        assert!(eval(Some(json!(false)), Operator::Neq, true).unwrap());
        assert!(matches!(
            eval(Some(json!(true)), Operator::Gt, false),
            Err(RuleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_field_is_false() {
        assert!(!eval(None, Operator::Gt, 30).unwrap());
        assert!(!eval(None, Operator::Neq, 30).unwrap());
        assert!(!eval(Some(Value::Null), Operator::Eq, 30).unwrap());
    }

    #[test]
    fn test_no_string_to_number_coercion() {
        let err = eval(Some(json!("35")), Operator::Gt, 30).unwrap_err();
        match err {
            RuleError::TypeMismatch {
                attribute,
                expected,
                actual,
            } => {
                assert_eq!(attribute, "field");
                assert_eq!(expected, "number");
                assert_eq!(actual, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_number_against_text_literal() {
        assert!(matches!(
            eval(Some(json!(1)), Operator::Eq, "1"),
            Err(RuleError::TypeMismatch { .. })
        ));
    }
}
