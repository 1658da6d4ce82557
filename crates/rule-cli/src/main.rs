//! 规则表达式命令行入口

mod cli;

use clap::Parser;
use cli::{Cli, CommandRunner, Commands};
use rule_shared::config::AppConfig;
use rule_shared::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load("rule-cli")?;
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    config.engine.trace |= cli.trace;

    let observability_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&observability_config)?;

    let runner = CommandRunner::new(config);

    match cli.command {
        Commands::Parse { rule, json } => runner.run_parse(&rule, json)?,
        Commands::Eval { rule, record, file } => {
            runner.run_eval(&rule, record.as_deref(), file.as_deref())?
        }
        Commands::Encode { rule } => runner.run_encode(&rule)?,
        Commands::Decode { json } => runner.run_decode(&json)?,
        Commands::Combine { rules, operator } => runner.run_combine(&rules, operator.into())?,
        Commands::Store { rule } => runner.run_store(&rule).await?,
        Commands::Load { id } => runner.run_load(id).await?,
        Commands::Check { id, record } => runner.run_check(id, &record).await?,
    }

    Ok(())
}
