//! 规则表达式引擎
//!
//! 将 `age > 30 AND (department = 'Sales' OR department = 'Marketing')`
//! 这样的文本规则解析为语法树，并对扁平记录求值。支持：
//! - 文本规则解析（AND 优先级高于 OR，左结合，括号分组）
//! - 短路求值执行
//! - 语法树与 JSON 树结构互相转换，用于持久化
//! - 规则组合与编译缓存

pub mod codec;
pub mod combinators;
pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod lexer;
pub mod models;
pub mod operators;
pub mod parser;
pub mod repository;
pub mod service;
pub mod store;

pub use codec::{decode, decode_with_max_depth, encode};
pub use combinators::{combine, combine_all, combine_or};
pub use compiler::{CompiledRule, RuleCompiler};
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use executor::{evaluate, RuleExecutor};
pub use models::{Condition, EvaluationResult, Literal, Record, RuleNode, StoredRule};
pub use operators::{LogicalOperator, Operator};
pub use parser::{parse, Parser, ParserLimits, MAX_TREE_DEPTH_CEILING};
pub use repository::{InMemoryRuleRepository, PgRuleRepository, RuleRecord, RuleRepository};
pub use service::RuleService;
pub use store::{RuleStore, RuleStoreStats};
