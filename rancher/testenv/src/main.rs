/*!

`testenv` provisions, configures and removes the nodes of a Rancher test environment. Each
subcommand is one step of a CI pipeline. Settings are read from environment variables, and files
handed from one step to the next are kept in `--output-dir`.

!*/

mod agents;
mod server;
mod tools;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use rancher_types::Environment;
use std::path::PathBuf;

/// Provision and tear down Rancher server and agent nodes for validation tests.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. Without either, `DEBUG` set to
    /// anything but `false` selects debug. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level")]
    log_level: Option<LevelFilter>,
    /// Where to write and read the files passed between steps.
    #[clap(long = "output-dir", default_value = ".")]
    output_dir: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Manage the node running the Rancher server.
    Server(server::Server),
    /// Manage the nodes running Rancher agents.
    Agents(agents::Agents),
}

fn main() {
    let args = Args::parse();
    agent_utils::init_agent_logger(env!("CARGO_CRATE_NAME"), args.log_level);
    if let Err(e) = run(args) {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let env = Environment::from_process();
    match args.command {
        Command::Server(server) => server.run(&env, &args.output_dir),
        Command::Agents(agents) => agents.run(&env, &args.output_dir),
    }
}
