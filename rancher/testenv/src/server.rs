use crate::tools::Production;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rancher_agents::ServerController;
use rancher_types::{Environment, ProvisioningConfig};
use std::path::Path;

/// The server subcommand creates, configures and removes the Rancher server node.
#[derive(Debug, Parser)]
pub(crate) struct Server {
    #[clap(subcommand)]
    action: Action,
}

#[derive(Debug, Parser)]
enum Action {
    /// Create the node and start `rancher/server` on it.
    Provision,
    /// Wait for the API and prepare it for agent registration.
    Configure,
    /// Remove the node and anything it left behind.
    Deprovision,
}

impl Server {
    pub(crate) fn run(self, env: &Environment, output_dir: &Path) -> Result<()> {
        let config = ProvisioningConfig::for_server(env)
            .context("Unable to read the Rancher server configuration")?;
        let tools = Production::new(&config)?;
        let mut server = ServerController::new(&config, tools.toolkit(), output_dir);
        match self.action {
            Action::Provision => {
                server.provision()?;
                info!("Rancher server '{}' is provisioned", server.name());
            }
            Action::Configure => {
                let registration = server.configure()?;
                info!(
                    "Rancher server '{}' is configured, agents register with '{}'",
                    server.name(),
                    registration.registration_url
                );
            }
            Action::Deprovision => {
                server.deprovision()?;
                info!("Rancher server '{}' is deprovisioned", server.name());
            }
        }
        Ok(())
    }
}
