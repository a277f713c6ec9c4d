use anyhow::Result;
use clap::Parser;
use log::{debug, error};
use std::io::Write;

use tstat_util::cli::{execute, run_locked, CliArgs, CommandContext, Operation};
use tstat_util::config::Config;
use tstat_util::devices::ProfileRegistry;
use tstat_util::modbus::SerialConnector;
use tstat_util::output::formatter_for;
use tstat_util::services::StdinConfirm;

const INTERRUPTED_EXIT_CODE: i32 = 130;

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.debug);

    let config = Config::from_args(&args)?;
    let profiles = ProfileRegistry::builtin();
    let operation = Operation::from_args(&args, &config, &profiles)?;
    debug!("Resolved operation: {:?}", operation);

    let formatter = formatter_for(config.format);
    let connector = SerialConnector;
    let confirm = StdinConfirm;
    let ctx = CommandContext {
        connector: &connector,
        confirm: &confirm,
        profiles: &profiles,
        formatter: formatter.as_ref(),
    };

    if !operation.needs_bus() {
        print!("{}", execute(&operation, &config, &ctx).await?);
        return Ok(());
    }

    let result = run_locked(&operation, &config, &ctx, tokio::signal::ctrl_c()).await;

    let output = match result {
        Ok(Some(output)) => output,
        // A pending confirmation prompt holds a blocking stdin read that cannot be cancelled.
        Ok(None) => std::process::exit(INTERRUPTED_EXIT_CODE),
        Err(e) => {
            error!("{} failed: {}", operation.name(), e);
            return Err(e.into());
        }
    };

    print!("{}", output);
    Ok(())
}
