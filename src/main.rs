mod cli;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use parley_config::Config;
use parley_core::{Pipeline, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Commands::Completions { shell } = &cli.command {
        cli::print_completions(*shell);
        return Ok(());
    }

    let base = parley_config::load(cli.config.as_deref())?;
    let overrides = cli.overrides();

    match &cli.command {
        Commands::ShowConfig => {
            let config = base.layered([&overrides]);
            let yaml = serde_yaml::to_string(&config).context("serializing config")?;
            println!("{yaml}");
            Ok(())
        }
        Commands::Chat { file } => {
            let outcome = pipeline(base, &cli)?.chat(file).await?;
            if let Some(log) = &outcome.call_log {
                info!(path = %log.display(), "call logged");
            }
            eprintln!("{}", outcome.report);
            Ok(())
        }
        Commands::Process { file } => {
            let report = pipeline(base, &cli)?.process(file).await?;
            eprintln!("{report}");
            Ok(())
        }
        Commands::Prompt { file } => {
            let report = pipeline(base, &cli)?.prompt(file).await?;
            eprintln!("{report}");
            Ok(())
        }
        Commands::Tokens { file } => {
            let report = pipeline(base, &cli)?.tokens(file).await?;
            println!("{report}");
            println!("{}", report.bar());
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn pipeline(base: Config, cli: &Cli) -> anyhow::Result<Pipeline> {
    let services = Services::local().context("initialising HTTP client")?;
    Ok(Pipeline::new(services, base, cli.overrides()))
}

/// Initialise the tracing subscriber.  `RUST_LOG` wins over `-v`.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
