use agent_utils::aws::Ec2Accessor;
use agent_utils::retry::ThreadSleeper;
use anyhow::{Context, Result};
use rancher_agents::control_plane::HttpControlPlane;
use rancher_agents::docker_machine::DockerMachine;
use rancher_agents::puppet::PuppetReaper;
use rancher_agents::Toolkit;
use rancher_types::ProvisioningConfig;

/// The real collaborators: `docker-machine`, EC2, the control plane over HTTP and Puppet.
pub(crate) struct Production {
    machine: DockerMachine,
    cloud: Ec2Accessor,
    control_plane: HttpControlPlane,
    reaper: PuppetReaper,
    sleeper: ThreadSleeper,
}

impl Production {
    pub(crate) fn new(config: &ProvisioningConfig) -> Result<Self> {
        Ok(Self {
            machine: DockerMachine::new(config),
            cloud: Ec2Accessor::new(&config.aws).context("Unable to create the EC2 client")?,
            control_plane: HttpControlPlane::new().context("Unable to create the HTTP client")?,
            reaper: PuppetReaper::new(),
            sleeper: ThreadSleeper,
        })
    }

    pub(crate) fn toolkit(&self) -> Toolkit<'_> {
        Toolkit {
            machine: &self.machine,
            cloud: &self.cloud,
            control_plane: &self.control_plane,
            reaper: &self.reaper,
            sleeper: &self.sleeper,
        }
    }
}
