//! 命令执行器
//!
//! 将命令行参数转化为规则引擎调用。离线命令不访问数据库，
//! 需要持久化的命令按需建立连接池。

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use rule_engine::{
    LogicalOperator, Parser, PgRuleRepository, Record, RuleCompiler, RuleExecutor, RuleService,
    codec, combine_all,
};
use rule_shared::config::AppConfig;
use rule_shared::database::Database;

/// 命令执行器
pub struct CommandRunner {
    config: AppConfig,
    parser: Parser,
    executor: RuleExecutor,
}

impl CommandRunner {
    pub fn new(config: AppConfig) -> Self {
        let parser = Parser::with_limits((&config.engine).into());
        let executor = RuleExecutor::from_config(&config.engine);
        Self {
            config,
            parser,
            executor,
        }
    }

    /// 执行 parse 命令
    pub fn run_parse(&self, rule: &str, json: bool) -> Result<()> {
        let ast = self.parser.parse(rule)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&codec::encode(&ast))?);
        } else {
            println!("{}", ast);
        }
        Ok(())
    }

    /// 执行 eval 命令
    pub fn run_eval(&self, rule: &str, record: Option<&str>, file: Option<&str>) -> Result<()> {
        let record = match (record, file) {
            (Some(json), _) => Record::from_json(json)?,
            (None, Some(path)) => {
                let content =
                    fs::read_to_string(path).with_context(|| format!("无法读取记录文件 {}", path))?;
                Record::from_json(&content)?
            }
            (None, None) => bail!("需要通过 --record 或 --file 提供记录"),
        };

        let ast = self.parser.parse(rule)?;
        let result = self.executor.execute(&ast, &record)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }

    /// 执行 encode 命令
    pub fn run_encode(&self, rule: &str) -> Result<()> {
        let ast = self.parser.parse(rule)?;
        println!("{}", codec::to_json_string(&ast)?);
        Ok(())
    }

    /// 执行 decode 命令
    pub fn run_decode(&self, json: &str) -> Result<()> {
        let ast = codec::from_json_str(json)?;
        println!("{}", ast);
        Ok(())
    }

    /// 执行 combine 命令
    pub fn run_combine(&self, rules: &[String], operator: LogicalOperator) -> Result<()> {
        let nodes = rules
            .iter()
            .map(|rule| self.parser.parse(rule))
            .collect::<rule_engine::Result<Vec<_>>>()?;

        let Some(combined) = combine_all(nodes, operator) else {
            bail!("至少需要一条规则");
        };
        // 组合结果可能超出单条规则各自满足的限制
        let mut compiler = RuleCompiler::from_config(&self.config.engine);
        let compiled = compiler.compile_node(combined.to_string(), combined)?;
        println!("{}", compiled.root());
        Ok(())
    }

    /// 执行 store 命令
    pub async fn run_store(&self, rule: &str) -> Result<()> {
        let service = self.connect().await?;
        let stored = service.create_rule(rule).await?;
        info!(id = stored.id, "规则已保存");
        println!("{}", stored.id);
        Ok(())
    }

    /// 执行 load 命令
    pub async fn run_load(&self, id: i64) -> Result<()> {
        let service = self.connect().await?;
        let stored = service.load_rule(id).await?;
        println!("{}", stored.rule_text);
        println!("{}", serde_json::to_string_pretty(&codec::encode(&stored.ast))?);
        Ok(())
    }

    /// 执行 check 命令
    pub async fn run_check(&self, id: i64, record: &str) -> Result<()> {
        let record = Record::from_json(record)?;
        let service = self.connect().await?;
        let result = service.evaluate_rule(id, &record).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }

    async fn connect(&self) -> Result<RuleService<PgRuleRepository>> {
        let db = Database::connect(&self.config.database)
            .await
            .context("无法连接数据库")?;
        if let Err(e) = db.health_check().await {
            warn!(code = e.code(), retryable = e.is_retryable(), "数据库健康检查失败");
            return Err(e).context("数据库不可用");
        }
        let repository = PgRuleRepository::new(db.pool().clone());
        repository.ensure_schema().await?;
        Ok(RuleService::new(Arc::new(repository), &self.config.engine))
    }
}
