mod cli;

use anyhow::Result;
use clap::Parser;
use clusterboot::FatalError;
use clusterboot::config::NodeConfig;
use cli::commands::{self, PartitionsArgs};
use cli::{Cli, Command};
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let node = NodeConfig::from_env()?;
    init_tracing(&node.log_filter);

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Compile {
            deployment,
            roles,
            connectors,
            halt_on_error,
        } => commands::compile(&node, &deployment, &roles, &connectors, halt_on_error)?,
        Command::Partitions {
            topology,
            hosts,
            sites_per_host,
            kfactor,
            host_id,
            rejoin,
            live,
            store,
        } => {
            commands::partitions(
                &node,
                PartitionsArgs {
                    topology: topology.as_deref(),
                    hosts: &hosts,
                    sites_per_host,
                    kfactor,
                    host_id,
                    rejoin,
                    live: live.as_deref(),
                    store: store.as_deref(),
                },
            )
            .await?
        }
        Command::VersionCheck { version } => commands::version_check(&node, &version)?,
    };

    if let Err(fatal) = outcome {
        halt(&fatal);
    }
    Ok(())
}

/// The node cannot continue; report and terminate.
fn halt(fatal: &FatalError) -> ! {
    error!(error = %fatal, "fatal bootstrap condition");
    eprintln!("FATAL: {}", fatal);
    std::process::exit(fatal.exit_code())
}

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
