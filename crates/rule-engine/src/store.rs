//! 规则缓存
//!
//! 使用 DashMap 提供线程安全的已编译规则缓存。语法树不可变，
//! 多线程可并发读取同一规则而无需加锁。

use crate::compiler::{CompiledRule, RuleCompiler};
use crate::error::{Result, RuleError};
use crate::models::RuleNode;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 规则缓存
#[derive(Clone)]
pub struct RuleStore {
    /// 编译后的规则缓存，以持久化层分配的 ID 为键
    rules: Arc<DashMap<i64, CompiledRule>>,
    compiler: Arc<parking_lot::Mutex<RuleCompiler>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::with_compiler(RuleCompiler::new())
    }

    pub fn with_compiler(compiler: RuleCompiler) -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            compiler: Arc::new(parking_lot::Mutex::new(compiler)),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 编译规则文本并放入缓存
    #[instrument(skip(self, source))]
    pub fn load(&self, id: i64, source: &str) -> Result<CompiledRule> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile(source)?
        };

        self.rules.insert(id, compiled.clone());
        info!("规则已加载: {}", id);
        Ok(compiled)
    }

    /// 放入已构建的语法树（来自存储解码或规则组合）
    #[instrument(skip(self, source, root))]
    pub fn load_node(&self, id: i64, source: &str, root: RuleNode) -> Result<CompiledRule> {
        let compiled = {
            let mut compiler = self.compiler.lock();
            compiler.compile_node(source, root)?
        };

        self.rules.insert(id, compiled.clone());
        info!("规则已加载: {}", id);
        Ok(compiled)
    }

    /// 按编译器限制校验语法树，不写入缓存
    pub fn validate(&self, root: &RuleNode) -> Result<()> {
        self.compiler.lock().validate_node(root)
    }

    #[instrument(skip(self))]
    pub fn delete(&self, id: i64) -> Result<()> {
        if self.rules.remove(&id).is_some() {
            info!("规则已删除: {}", id);
            Ok(())
        } else {
            warn!("删除不存在的规则: {}", id);
            Err(RuleError::RuleNotFound(id))
        }
    }

    pub fn get(&self, id: i64) -> Option<CompiledRule> {
        self.rules.get(&id).map(|r| r.clone())
    }

    pub fn contains(&self, id: i64) -> bool {
        self.rules.contains_key(&id)
    }

    pub fn list_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.rules.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        ids
    }

    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rules.len();
        self.rules.clear();
        info!("已清空 {} 条规则", count);
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> RuleStoreStats {
        let rules_count = self.rules.len();
        let total_conditions: usize = self
            .rules
            .iter()
            .map(|r| r.root.condition_count())
            .sum();

        RuleStoreStats {
            rules_count,
            total_conditions,
            avg_conditions_per_rule: if rules_count > 0 {
                total_conditions as f64 / rules_count as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 规则缓存统计信息
#[derive(Debug, Clone)]
pub struct RuleStoreStats {
    pub rules_count: usize,
    pub total_conditions: usize,
    pub avg_conditions_per_rule: f64,
}
