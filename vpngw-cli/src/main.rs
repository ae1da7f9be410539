//! vpngw -- VPN gateway module scenario runner

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;

use vpngw_core::config::{GeneralConfig, HarnessConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 설정 파일이 없거나 잘못되어도 로깅은 기본값으로 시작 (에러는 명령에서 보고)
    let mut general: GeneralConfig = HarnessConfig::load(&cli.config)
        .await
        .map(|config| config.general)
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("warning: {e}");
    }

    vpngw_core::metrics::describe_all();
    tracing::debug!(config = %cli.config.display(), "vpngw starting");

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.config, &writer).await,
        Commands::List => commands::list::execute(&writer),
        Commands::Destroy(args) => commands::destroy::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}
