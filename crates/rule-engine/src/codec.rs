//! 语法树编解码
//!
//! 将语法树与 JSON 树结构互相转换，供持久化层存储。每个节点编码为：
//!
//! ```json
//! {
//!   "node_type": "AND" | "OR" | "condition",
//!   "left": <node> | null,
//!   "right": <node> | null,
//!   "value": null | {"attribute": "age", "operator": ">", "literal": 30}
//! }
//! ```
//!
//! 编码总是写出全部四个字段，缺失的子节点与值显式写为 null。
//! 解码严格依据 `node_type` 还原节点形状，满足 `decode(encode(ast)) == ast`。
//! 该等式仅对数值字面量均为有限数的语法树成立，
//! 经 [`RuleCompiler`](crate::compiler::RuleCompiler) 校验过的语法树总是满足。
//!
//! 解码时限制嵌套深度，超限的输入视为数据损坏而不是继续递归。

use crate::error::{Result, RuleError};
use crate::models::{json_type_name, Condition, Literal, RuleNode};
use crate::operators::Operator;
use crate::parser::{MAX_TREE_DEPTH_CEILING, Parser};
use serde_json::{json, Map, Number, Value};

const NODE_TYPE: &str = "node_type";
const LEFT: &str = "left";
const RIGHT: &str = "right";
const VALUE: &str = "value";

const TYPE_AND: &str = "AND";
const TYPE_OR: &str = "OR";
const TYPE_CONDITION: &str = "condition";

/// 可精确表示为 JSON 整数的上限（2^53）
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// 将语法树编码为 JSON 值
///
/// 含非有限数值字面量的语法树编码后无法解码，持久化前应先经编译器校验。
pub fn encode(node: &RuleNode) -> Value {
    match node {
        RuleNode::And(left, right) => encode_group(TYPE_AND, left, right),
        RuleNode::Or(left, right) => encode_group(TYPE_OR, left, right),
        RuleNode::Condition(cond) => json!({
            NODE_TYPE: TYPE_CONDITION,
            LEFT: Value::Null,
            RIGHT: Value::Null,
            VALUE: {
                "attribute": cond.attribute(),
                "operator": cond.operator().symbol(),
                "literal": encode_literal(cond.value()),
            },
        }),
    }
}

fn encode_group(node_type: &str, left: &RuleNode, right: &RuleNode) -> Value {
    json!({
        NODE_TYPE: node_type,
        LEFT: encode(left),
        RIGHT: encode(right),
        VALUE: Value::Null,
    })
}

/// 非有限数值无法表示为 JSON，编码为 null，解码时报告数据损坏
fn encode_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
            Value::Number(Number::from(*n as i64))
        }
        Literal::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Literal::Text(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
    }
}

/// 从 JSON 值解码语法树，深度上限为 [`MAX_TREE_DEPTH_CEILING`]
pub fn decode(value: &Value) -> Result<RuleNode> {
    decode_with_max_depth(value, MAX_TREE_DEPTH_CEILING)
}

/// 从 JSON 值解码语法树，节点嵌套超过 `max_depth` 层时返回 `CorruptEncoding`
pub fn decode_with_max_depth(value: &Value, max_depth: usize) -> Result<RuleNode> {
    Decoder { max_depth }.node(value, "$", 1)
}

/// 编码并序列化为 JSON 字符串
pub fn to_json_string(node: &RuleNode) -> Result<String> {
    Ok(serde_json::to_string(&encode(node))?)
}

/// 反序列化 JSON 字符串并解码
pub fn from_json_str(json: &str) -> Result<RuleNode> {
    let value: Value = serde_json::from_str(json)?;
    decode(&value)
}

struct Decoder {
    max_depth: usize,
}

impl Decoder {
    /// `depth` 为当前节点所在层数，根节点为 1
    fn node(&self, value: &Value, path: &str, depth: usize) -> Result<RuleNode> {
        if depth > self.max_depth {
            return Err(RuleError::corrupt(
                path,
                format!("节点嵌套深度超过上限 {}", self.max_depth),
            ));
        }

        let obj = value.as_object().ok_or_else(|| {
            RuleError::corrupt(path, format!("节点必须是对象, 实际为 {}", json_type_name(value)))
        })?;

        let node_type = obj
            .get(NODE_TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| RuleError::corrupt(path, "缺少字符串类型的 node_type"))?;

        match node_type {
            TYPE_AND | TYPE_OR => {
                if present(obj, VALUE).is_some() {
                    return Err(RuleError::corrupt(path, format!("{} 节点不能携带 value", node_type)));
                }
                let left = self.child(obj, LEFT, path, depth)?;
                let right = self.child(obj, RIGHT, path, depth)?;
                Ok(if node_type == TYPE_AND {
                    RuleNode::and(left, right)
                } else {
                    RuleNode::or(left, right)
                })
            }
            TYPE_CONDITION => {
                for child in [LEFT, RIGHT] {
                    if present(obj, child).is_some() {
                        return Err(RuleError::corrupt(
                            path,
                            format!("condition 节点不能携带子节点 {}", child),
                        ));
                    }
                }
                let value = present(obj, VALUE)
                    .ok_or_else(|| RuleError::corrupt(path, "condition 节点缺少 value"))?;
                decode_condition(value, &format!("{}.{}", path, VALUE)).map(RuleNode::Condition)
            }
            other => Err(RuleError::corrupt(path, format!("未知的 node_type '{}'", other))),
        }
    }

    fn child(&self, obj: &Map<String, Value>, key: &str, path: &str, depth: usize) -> Result<RuleNode> {
        let child_path = format!("{}.{}", path, key);
        let child = present(obj, key)
            .ok_or_else(|| RuleError::corrupt(&child_path, "组合节点缺少子节点"))?;
        self.node(child, &child_path, depth + 1)
    }
}

/// 字段存在且不为 null
fn present<'v>(obj: &'v Map<String, Value>, key: &str) -> Option<&'v Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn decode_condition(value: &Value, path: &str) -> Result<Condition> {
    match value {
        // 旧格式：条件以文本存储，如 "age > 30"
        Value::String(text) => Parser::new()
            .parse_condition(text)
            .map_err(|e| RuleError::corrupt(path, format!("无法解析条件文本 '{}': {}", text, e))),
        Value::Object(obj) => {
            let attribute = obj
                .get("attribute")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| RuleError::corrupt(path, "缺少 attribute"))?;

            let symbol = obj
                .get("operator")
                .and_then(Value::as_str)
                .ok_or_else(|| RuleError::corrupt(path, "缺少 operator"))?;
            let operator = Operator::from_symbol(symbol)
                .map_err(|_| RuleError::corrupt(path, format!("未知的操作符 '{}'", symbol)))?;

            let literal = match obj.get("literal") {
                Some(Value::Number(n)) => n
                    .as_f64()
                    .map(Literal::Number)
                    .ok_or_else(|| RuleError::corrupt(path, "数值字面量超出范围"))?,
                Some(Value::String(s)) => Literal::Text(s.clone()),
                Some(Value::Bool(b)) => Literal::Bool(*b),
                Some(other) => {
                    return Err(RuleError::corrupt(
                        path,
                        format!("不支持的字面量类型 {}", json_type_name(other)),
                    ));
                }
                None => return Err(RuleError::corrupt(path, "缺少 literal")),
            };

            Ok(Condition::new(attribute, operator, literal))
        }
        other => Err(RuleError::corrupt(
            path,
            format!("value 必须是对象或条件文本, 实际为 {}", json_type_name(other)),
        )),
    }
}
