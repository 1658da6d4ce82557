//! 规则编译器
//!
//! 将规则文本解析为语法树，并预提取规则依赖的属性集合。

use crate::error::{Result, RuleError};
use crate::models::RuleNode;
use crate::parser::{Parser, ParserLimits};
use rule_shared::config::EngineConfig;
use std::collections::BTreeSet;

/// 编译后的规则
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    /// 原始规则文本
    pub source: String,
    pub root: RuleNode,
    /// 规则中引用的全部属性（用于调用方预校验记录）
    pub required_attributes: BTreeSet<String>,
    /// 编译版本号（用于缓存失效）
    pub compile_version: u64,
}

impl CompiledRule {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &RuleNode {
        &self.root
    }

    /// 记录中缺失的规则属性
    pub fn missing_attributes<'a>(&'a self, record: &crate::models::Record) -> Vec<&'a str> {
        self.required_attributes
            .iter()
            .filter(|attr| !record.contains(attr))
            .map(String::as_str)
            .collect()
    }
}

/// 规则编译器
#[derive(Debug, Default)]
pub struct RuleCompiler {
    parser: Parser,
    compile_version: u64,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            parser: Parser::with_limits(limits),
            compile_version: 0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_limits(ParserLimits::from(config))
    }

    /// 从规则文本编译
    pub fn compile(&mut self, source: &str) -> Result<CompiledRule> {
        let root = self.parser.parse(source)?;
        self.finish(source.to_string(), root)
    }

    /// 编译已构建的语法树（例如从存储解码或由多条规则组合而来）
    pub fn compile_node(&mut self, source: impl Into<String>, root: RuleNode) -> Result<CompiledRule> {
        self.validate_node(&root)?;
        self.finish(source.into(), root)
    }

    fn finish(&mut self, source: String, root: RuleNode) -> Result<CompiledRule> {
        let required_attributes = root.required_attributes();

        self.compile_version += 1;

        Ok(CompiledRule {
            source,
            root,
            required_attributes,
            compile_version: self.compile_version,
        })
    }

    /// 校验语法树规模与字面量；深度上限保证编码后的 JSON 可被重新读取
    pub(crate) fn validate_node(&self, root: &RuleNode) -> Result<()> {
        let limits = self.parser.limits();
        let count = root.condition_count();
        if count > limits.max_conditions {
            return Err(RuleError::CompileError(format!(
                "条件数量 {} 超过上限 {}",
                count, limits.max_conditions
            )));
        }

        let depth = root.depth();
        if depth > limits.max_tree_depth {
            return Err(RuleError::CompileError(format!(
                "语法树深度 {} 超过上限 {}",
                depth, limits.max_tree_depth
            )));
        }

        if let Some(cond) = root.conditions().into_iter().find(|c| !c.value().is_finite()) {
            return Err(RuleError::CompileError(format!(
                "条件 {} 的数值字面量必须是有限数",
                cond.attribute()
            )));
        }
        Ok(())
    }
}
