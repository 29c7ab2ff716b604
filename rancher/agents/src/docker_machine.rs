/*!

Nodes are created, reached and removed with `docker-machine` and its `amazonec2` driver.
`docker-machine` reads its EC2 settings from `AMAZONEC2_*` environment variables, which are built
once by [`translate_network_environment`] and passed to every invocation.

!*/

use agent_utils::aws::translate_network_environment;
use agent_utils::process::{run_checked, CommandRunner, Invocation, ProcessRunner};
use agent_utils::retry::{RetryError, RetryPolicy, RetryRunner, Sleeper, ThreadSleeper};
use log::{debug, info};
use rancher_types::{NodeIdentity, ProvisioningConfig};
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;
use std::net::IpAddr;

const DOCKER_MACHINE: &str = "docker-machine";
const DRIVER: &str = "amazonec2";
/// `docker-machine rm` prints this when asked to remove a machine it does not know.
const NOT_FOUND: &str = "does not exist";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MachineError {
    #[snafu(display("Failed to create node '{}': {}", name, source))]
    Create {
        name: String,
        source: agent_utils::Error,
    },

    #[snafu(display("Failed to resolve IP addr for '{}'! : {}", name, source))]
    NodeUnreachable {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Failed to run '{}' on '{}': {}", command, name, source))]
    RemoteCommand {
        name: String,
        command: String,
        source: RetryError<agent_utils::Error>,
    },

    #[snafu(display("Failed to remove node '{}': {}", name, source))]
    Destroy {
        name: String,
        source: agent_utils::Error,
    },
}

/// The launch parameters of a node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeSpec {
    pub image_id: String,
    pub remote_user: String,
    pub instance_type: String,
}

impl NodeSpec {
    pub fn from_config(config: &ProvisioningConfig) -> Self {
        let settings = config.platform.settings();
        Self {
            image_id: settings.image_id.to_string(),
            remote_user: settings.remote_user.to_string(),
            instance_type: config.instance_type.clone(),
        }
    }
}

/// The outcome of [`RemoteNodeAgent::destroy`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Removal {
    Removed,
    AlreadyAbsent,
}

/// Creates nodes, finds their addresses, runs commands on them and removes them.
pub trait RemoteNodeAgent {
    fn create(&self, name: &NodeIdentity, spec: &NodeSpec) -> Result<(), MachineError>;

    /// The address is looked up every time it is needed.
    fn resolve_address(&self, name: &NodeIdentity) -> Result<IpAddr, MachineError>;

    /// Run `command` in the node's login shell and return its stdout.
    fn run_command(&self, name: &NodeIdentity, command: &str) -> Result<String, MachineError>;

    fn destroy(&self, name: &NodeIdentity) -> Result<Removal, MachineError>;
}

pub struct DockerMachine<R = ProcessRunner, S = ThreadSleeper> {
    runner: R,
    retry: RetryRunner<S>,
    policy: RetryPolicy,
    environment: BTreeMap<String, String>,
}

impl DockerMachine {
    pub fn new(config: &ProvisioningConfig) -> Self {
        Self::with_runner(
            ProcessRunner,
            ThreadSleeper,
            translate_network_environment(config),
        )
    }
}

impl<R, S> DockerMachine<R, S>
where
    R: CommandRunner,
    S: Sleeper,
{
    pub fn with_runner(runner: R, sleeper: S, environment: BTreeMap<String, String>) -> Self {
        Self {
            runner,
            retry: RetryRunner::new(sleeper),
            policy: RetryPolicy::default(),
            environment,
        }
    }

    fn invocation<'a, I>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = &'a str>,
    {
        Invocation::new(DOCKER_MACHINE)
            .args(args)
            .envs(&self.environment)
    }

    fn run_with_retries(
        &self,
        invocation: &Invocation,
    ) -> Result<String, RetryError<agent_utils::Error>> {
        self.retry.execute(
            &invocation.to_string(),
            &self.policy,
            agent_utils::Error::is_transient,
            || run_checked(&self.runner, invocation, &[0]),
        )
    }
}

impl<R, S> RemoteNodeAgent for DockerMachine<R, S>
where
    R: CommandRunner,
    S: Sleeper,
{
    fn create(&self, name: &NodeIdentity, spec: &NodeSpec) -> Result<(), MachineError> {
        info!("Creating node '{}' with docker-machine...", name);
        let invocation = self.invocation([
            "create",
            "--driver",
            DRIVER,
            "--amazonec2-ami",
            spec.image_id.as_str(),
            "--amazonec2-ssh-user",
            spec.remote_user.as_str(),
            "--amazonec2-instance-type",
            spec.instance_type.as_str(),
            name.as_str(),
        ]);
        run_checked(&self.runner, &invocation, &[0]).context(CreateSnafu { name: name.as_str() })?;
        Ok(())
    }

    fn resolve_address(&self, name: &NodeIdentity) -> Result<IpAddr, MachineError> {
        let invocation = self.invocation(["ip", name.as_str()]);
        let stdout = self
            .run_with_retries(&invocation)
            .map_err(|e| MachineError::NodeUnreachable {
                name: name.to_string(),
                source: e.into(),
            })?;
        let address = stdout
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| MachineError::NodeUnreachable {
                name: name.to_string(),
                source: format!("'{}' is not an IP address: {}", stdout.trim(), e).into(),
            })?;
        debug!("Node '{}' is at '{}'", name, address);
        Ok(address)
    }

    fn run_command(&self, name: &NodeIdentity, command: &str) -> Result<String, MachineError> {
        let invocation = self.invocation(["ssh", name.as_str(), command]);
        self.run_with_retries(&invocation)
            .context(RemoteCommandSnafu {
                name: name.as_str(),
                command,
            })
    }

    fn destroy(&self, name: &NodeIdentity) -> Result<Removal, MachineError> {
        let invocation = self.invocation(["rm", "-y", name.as_str()]);
        match run_checked(&self.runner, &invocation, &[0]) {
            Ok(_) => {
                info!("Removed node '{}'", name);
                Ok(Removal::Removed)
            }
            Err(agent_utils::Error::CommandFailed { stdout, stderr, .. })
                if stdout.contains(NOT_FOUND) || stderr.contains(NOT_FOUND) =>
            {
                info!("Node '{}' does not exist, nothing to remove", name);
                Ok(Removal::AlreadyAbsent)
            }
            Err(e) => Err(e).context(DestroySnafu { name: name.as_str() }),
        }
    }
}
