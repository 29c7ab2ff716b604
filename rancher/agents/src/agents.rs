use crate::docker_machine::NodeSpec;
use crate::error::{self, Result};
use crate::node::{self, NodeState};
use crate::Toolkit;
use log::info;
use rancher_types::constants::REGISTRATION_FILE;
use rancher_types::{NodeIdentity, ProvisioningConfig, Registration};
use snafu::{OptionExt, ResultExt};
use std::path::PathBuf;

/// Agent nodes, numbered from one. Every agent goes through the same lifecycle as the server
/// node, but ends by running the agent container against the server's registration.
pub struct AgentsController<'t> {
    config: &'t ProvisioningConfig,
    toolkit: Toolkit<'t>,
    output_dir: PathBuf,
    states: Vec<NodeState>,
}

impl<'t> AgentsController<'t> {
    pub fn new<P: Into<PathBuf>>(
        config: &'t ProvisioningConfig,
        toolkit: Toolkit<'t>,
        output_dir: P,
    ) -> Self {
        Self {
            config,
            toolkit,
            output_dir: output_dir.into(),
            states: vec![NodeState::default(); config.agent_count as usize],
        }
    }

    pub fn names(&self) -> Vec<NodeIdentity> {
        (1..=self.config.agent_count)
            .map(|index| NodeIdentity::agent(self.config, index))
            .collect()
    }

    /// The state of agent `index`, counting from one.
    pub fn state(&self, index: u32) -> Option<NodeState> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.states.get(position).copied()
    }

    /// An explicit registration URL wins over the registration written by the server's
    /// configuration step.
    pub fn registration(&self) -> Result<Registration> {
        if let Some(url) = &self.config.registration_url {
            return Ok(Registration::from_url(url.as_str()));
        }
        let path = self.output_dir.join(REGISTRATION_FILE);
        Registration::read_from(&path)
            .context(error::RegistrationSnafu)?
            .context(error::MissingServerRegistrationSnafu {
                path: path.display().to_string(),
            })
    }

    /// Provision every agent in order, stopping at the first failure.
    pub fn provision(&mut self) -> Result<()> {
        let registration = self.registration()?;
        info!(
            "Registering {} agents with '{}'",
            self.config.agent_count, registration.registration_url
        );
        let spec = NodeSpec::from_config(self.config);
        for (position, name) in self.names().into_iter().enumerate() {
            self.provision_agent(position, &name, &spec, &registration)
                .context(error::ProvisionFailedSnafu {
                    name: name.as_str(),
                })?;
        }
        Ok(())
    }

    fn provision_agent(
        &mut self,
        position: usize,
        name: &NodeIdentity,
        spec: &NodeSpec,
        registration: &Registration,
    ) -> Result<()> {
        let state = &mut self.states[position];
        node::prepare_node(&self.toolkit, name, spec, self.config.platform, state)?;

        info!("Starting Rancher agent on '{}'...", name);
        node::run(
            &self.toolkit,
            name,
            &format!(
                "docker run -d --privileged -v /var/run/docker.sock:/var/run/docker.sock \
                 -v /var/lib/rancher:/var/lib/rancher {} {}",
                registration.image, registration.registration_url
            ),
        )?;
        *state = NodeState::Bootstrapped;
        Ok(())
    }

    /// Remove every agent, stopping at the first agent that cannot be removed.
    pub fn deprovision(&mut self) -> Result<()> {
        for (position, name) in self.names().into_iter().enumerate() {
            node::teardown_node(&self.toolkit, &name, &self.config.aws.region).context(
                error::DeprovisionFailedSnafu {
                    name: name.as_str(),
                },
            )?;
            self.states[position] = NodeState::Deprovisioned;
        }
        Ok(())
    }
}
