pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "clusterboot")]
#[command(about = "Compile deployment descriptors and resolve partition ownership")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a deployment descriptor and print the resulting catalog config.
    Compile {
        #[arg(long)]
        deployment: PathBuf,
        /// Roles defined by the schema, in addition to the built-in ones.
        #[arg(long = "role")]
        roles: Vec<String>,
        /// Custom export connector classes this node can load.
        #[arg(long = "connector")]
        connectors: Vec<String>,
        /// Halt with the deployment exit code on a compile failure instead of
        /// reporting it as an ordinary error.
        #[arg(long)]
        halt_on_error: bool,
    },
    /// Resolve the partition count and the partitions this host owns.
    Partitions {
        /// Agreed topology document to use directly.
        #[arg(long)]
        topology: Option<PathBuf>,
        /// Hosts taking part in cluster creation, e.g. `0,1,2`.
        #[arg(long, value_delimiter = ',')]
        hosts: Vec<u32>,
        #[arg(long, default_value_t = 8)]
        sites_per_host: u32,
        #[arg(long, default_value_t = 0)]
        kfactor: u32,
        /// Overrides CLUSTERBOOT_HOST_ID.
        #[arg(long)]
        host_id: Option<u32>,
        /// Rejoin a running cluster. The agreed topology comes from
        /// `--topology`, `--store`, or the local topology cache.
        #[arg(long, requires = "live")]
        rejoin: bool,
        /// Live replica counts of the running cluster (JSON).
        #[arg(long)]
        live: Option<PathBuf>,
        /// Agreed topology held by the coordination store (JSON).
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Check whether a catalog version is loadable by this build.
    VersionCheck { version: String },
}
