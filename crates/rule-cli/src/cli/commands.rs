//! CLI 命令定义
//!
//! 使用 clap derive 宏定义命令行接口结构。
//! 离线子命令只做解析、求值与编解码；`store`/`load`/`check` 需要数据库。

use clap::{Parser, Subcommand, ValueEnum};
use rule_engine::LogicalOperator;

/// 规则表达式命令行工具
#[derive(Parser, Debug)]
#[command(name = "rules")]
#[command(version, about = "规则表达式解析与评估工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// 输出每个节点的评估追踪
    #[arg(long, global = true)]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 组合方式
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl From<Combinator> for LogicalOperator {
    fn from(value: Combinator) -> Self {
        match value {
            Combinator::And => LogicalOperator::And,
            Combinator::Or => LogicalOperator::Or,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 解析规则并输出规范化文本
    Parse {
        /// 规则文本
        rule: String,

        /// 以 JSON 树结构输出
        #[arg(long)]
        json: bool,
    },

    /// 对记录评估规则
    Eval {
        /// 规则文本
        rule: String,

        /// 记录（JSON 对象）
        #[arg(short, long, conflicts_with = "file")]
        record: Option<String>,

        /// 从文件读取记录
        #[arg(short, long)]
        file: Option<String>,
    },

    /// 将规则编码为 JSON 树结构
    Encode {
        /// 规则文本
        rule: String,
    },

    /// 将 JSON 树结构解码为规则文本
    Decode {
        /// 编码后的 JSON
        json: String,
    },

    /// 组合多条规则
    Combine {
        /// 规则文本（至少两条）
        #[arg(required = true, num_args = 2..)]
        rules: Vec<String>,

        /// 组合方式
        #[arg(short, long, value_enum, default_value = "and")]
        operator: Combinator,
    },

    /// 保存规则到数据库
    Store {
        /// 规则文本
        rule: String,
    },

    /// 从数据库加载规则
    Load {
        /// 规则 ID
        id: i64,
    },

    /// 对记录评估已保存的规则
    Check {
        /// 规则 ID
        id: i64,

        /// 记录（JSON 对象）
        #[arg(short, long)]
        record: String,
    },
}
