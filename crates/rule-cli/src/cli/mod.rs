//! CLI 模块
//!
//! - `parse` - 解析规则并输出规范化文本或 JSON 树
//! - `eval` - 对记录评估规则
//! - `encode` / `decode` - 语法树与 JSON 树结构互转
//! - `combine` - 以 AND/OR 组合多条规则
//! - `store` / `load` / `check` - 基于 PostgreSQL 的规则持久化与评估
//!
//! # 使用示例
//!
//! ```bash
//! rules eval "age > 30 AND salary > 50000" -r '{"age": 35, "salary": 60000}'
//! rules combine "age > 30" "department = 'Sales'" -o or
//! rules store "age > 30"
//! rules check 1 -r '{"age": 35}'
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;
