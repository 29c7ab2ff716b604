use crate::tools::Production;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rancher_agents::AgentsController;
use rancher_types::{Environment, ProvisioningConfig};
use std::path::Path;

/// The agents subcommand creates and removes the Rancher agent nodes.
#[derive(Debug, Parser)]
pub(crate) struct Agents {
    #[clap(subcommand)]
    action: Action,
}

#[derive(Debug, Parser)]
enum Action {
    /// Create the agent nodes and register them with the Rancher server.
    Provision,
    /// Remove the agent nodes and anything they left behind.
    Deprovision,
}

impl Agents {
    pub(crate) fn run(self, env: &Environment, output_dir: &Path) -> Result<()> {
        let config = ProvisioningConfig::for_agents(env)
            .context("Unable to read the Rancher agent configuration")?;
        let tools = Production::new(&config)?;
        let mut agents = AgentsController::new(&config, tools.toolkit(), output_dir);
        match self.action {
            Action::Provision => {
                agents.provision()?;
                info!("{} Rancher agents are provisioned", config.agent_count);
            }
            Action::Deprovision => {
                agents.deprovision()?;
                info!("{} Rancher agents are deprovisioned", config.agent_count);
            }
        }
        Ok(())
    }
}
