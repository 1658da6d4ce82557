//! 规则引擎领域模型

use crate::error::{Result, RuleError};
use crate::operators::{LogicalOperator, Operator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// 条件字面量
///
/// 数值是当前规则的主要取值类型，文本与布尔值为扩展类型。
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Literal {
    /// NaN 与无穷大无法写入 JSON
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            Self::Text(_) | Self::Bool(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "string",
            Self::Bool(_) => "boolean",
        }
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => {
                f.write_str("'")?;
                for c in s.chars() {
                    if c == '\'' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("'")
            }
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// 条件节点：属性、比较操作符与字面量构成的原子比较
///
/// 构造后不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    attribute: String,
    operator: Operator,
    value: Literal,
}

impl Condition {
    pub fn new(attribute: impl Into<String>, operator: Operator, value: impl Into<Literal>) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: value.into(),
        }
    }

    /// 以符号形式的操作符构造，未知符号返回 `InvalidOperator`
    pub fn parse_operator(
        attribute: impl Into<String>,
        symbol: &str,
        value: impl Into<Literal>,
    ) -> Result<Self> {
        let operator = Operator::from_symbol(symbol)?;
        Ok(Self::new(attribute, operator, value))
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Literal {
        &self.value
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.operator, self.value)
    }
}

/// 规则语法树节点
///
/// 组合节点总是同时拥有左右子树，条件节点没有子节点。
/// 节点独占子树，组合操作总是生成新节点而不修改已有节点。
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    And(Box<RuleNode>, Box<RuleNode>),
    Or(Box<RuleNode>, Box<RuleNode>),
    Condition(Condition),
}

impl RuleNode {
    pub fn and(left: RuleNode, right: RuleNode) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: RuleNode, right: RuleNode) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn condition(condition: Condition) -> Self {
        Self::Condition(condition)
    }

    pub fn group(operator: LogicalOperator, left: RuleNode, right: RuleNode) -> Self {
        match operator {
            LogicalOperator::And => Self::and(left, right),
            LogicalOperator::Or => Self::or(left, right),
        }
    }

    /// 组合节点的逻辑操作符，条件节点返回 None
    pub fn logical_operator(&self) -> Option<LogicalOperator> {
        match self {
            Self::And(..) => Some(LogicalOperator::And),
            Self::Or(..) => Some(LogicalOperator::Or),
            Self::Condition(_) => None,
        }
    }

    /// 规则引用的全部属性名，调用方可据此预先校验记录
    pub fn required_attributes(&self) -> BTreeSet<String> {
        let mut attributes = BTreeSet::new();
        self.collect_attributes(&mut attributes);
        attributes
    }

    fn collect_attributes(&self, attributes: &mut BTreeSet<String>) {
        match self {
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_attributes(attributes);
                right.collect_attributes(attributes);
            }
            Self::Condition(cond) => {
                attributes.insert(cond.attribute.clone());
            }
        }
    }

    /// 按从左到右的顺序列出全部条件
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut conditions = Vec::new();
        self.collect_conditions(&mut conditions);
        conditions
    }

    fn collect_conditions<'a>(&'a self, conditions: &mut Vec<&'a Condition>) {
        match self {
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_conditions(conditions);
                right.collect_conditions(conditions);
            }
            Self::Condition(cond) => conditions.push(cond),
        }
    }

    /// 树深度，单个条件为 1
    pub fn depth(&self) -> usize {
        match self {
            Self::And(left, right) | Self::Or(left, right) => 1 + left.depth().max(right.depth()),
            Self::Condition(_) => 1,
        }
    }

    pub fn condition_count(&self) -> usize {
        match self {
            Self::And(left, right) | Self::Or(left, right) => {
                left.condition_count() + right.condition_count()
            }
            Self::Condition(_) => 1,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => 1,
            Self::And(..) => 2,
            Self::Condition(_) => 3,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// 以最少括号渲染为表达式文本，重新解析后与原树结构相等
impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(left, right) | Self::Or(left, right) => {
                let own = self.precedence();
                let operator = match self {
                    Self::And(..) => LogicalOperator::And,
                    _ => LogicalOperator::Or,
                };
                left.fmt_child(f, left.precedence() < own)?;
                write!(f, " {} ", operator)?;
                // 左结合：同级的右子树必须加括号
                right.fmt_child(f, right.precedence() <= own)
            }
            Self::Condition(cond) => write!(f, "{}", cond),
        }
    }
}

/// 评估输入：属性名到取值的扁平映射
///
/// 每次评估调用时提供，不归规则树所有。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(attribute.into(), value.into());
    }

    /// 从 JSON 对象创建
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            other => Err(RuleError::InvalidRecord(format!(
                "记录必须是 JSON 对象，实际为 {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.values.contains_key(attribute)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 已持久化的规则：原始文本仅用于展示和审计，语法树是可评估的规范形式
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRule {
    pub id: i64,
    pub rule_text: String,
    pub ast: RuleNode,
}

/// 评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_ms: i64,
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self {
            matched: false,
            matched_conditions: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_ms: 0,
        }
    }
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// 获取 JSON 值的类型名称
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
