use crate::docker_machine::{NodeSpec, Removal};
use crate::error::{self, Result};
use crate::Toolkit;
use log::info;
use rancher_types::constants::SSH_KEY_URLS;
use rancher_types::{NodeIdentity, Platform};
use serde::{Deserialize, Serialize};
use serde_plain::derive_display_from_serialize;
use snafu::ResultExt;
use std::net::IpAddr;

const AUTHORIZED_KEYS: &str = "~/.ssh/authorized_keys";

/// How far a node has come. Deprovisioning can start from any state.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeState {
    #[default]
    Unconfigured,
    Created,
    Reachable,
    Bootstrapped,
    Configured,
    Deprovisioned,
}

derive_display_from_serialize!(NodeState);

/// Create a node and get it ready to run containers. `state` follows each step so a failure
/// leaves it at the last state reached. Returns the node's address.
pub(crate) fn prepare_node(
    toolkit: &Toolkit<'_>,
    name: &NodeIdentity,
    spec: &NodeSpec,
    platform: Platform,
    state: &mut NodeState,
) -> Result<IpAddr> {
    toolkit
        .machine
        .create(name, spec)
        .context(error::MachineSnafu)?;
    *state = NodeState::Created;

    let address = toolkit
        .machine
        .resolve_address(name)
        .context(error::MachineSnafu)?;
    info!("Node '{}' is available for SSH at '{}'...", name, address);
    *state = NodeState::Reachable;

    if platform.is_redhat_family() {
        run(toolkit, name, "sudo yum install -y wget")?;
    }

    info!("Populating {} with Rancher Labs ssh keys...", name);
    // Commands can be retried after a partial success, so duplicate keys are dropped.
    for url in SSH_KEY_URLS {
        run(
            toolkit,
            name,
            &format!(
                "wget {url} -O - >> {keys} && sort -u {keys} -o {keys} && chmod 0600 {keys}",
                url = url,
                keys = AUTHORIZED_KEYS
            ),
        )?;
    }

    run(toolkit, name, r#"echo "usermod -a -G docker $USER" | sudo -E -s"#)?;
    Ok(address)
}

pub(crate) fn run(toolkit: &Toolkit<'_>, name: &NodeIdentity, command: &str) -> Result<String> {
    toolkit
        .machine
        .run_command(name, command)
        .context(error::MachineSnafu)
}

/// Remove a node politely through the node provisioning tool, then forcefully. Only the polite
/// attempt may fail without failing the teardown.
pub(crate) fn teardown_node(toolkit: &Toolkit<'_>, name: &NodeIdentity, region: &str) -> Result<()> {
    info!("Deprovisioning '{}' via Docker Machine...", name);
    match toolkit.machine.destroy(name) {
        Ok(Removal::Removed) | Ok(Removal::AlreadyAbsent) => {}
        Err(e) => info!(
            "Failed to deprovision '{}'. This is not an error.: {}",
            name, e
        ),
    }

    info!("Deprovisioning '{}' via Puppet...", name);
    toolkit
        .reaper
        .ensure_absent(name, region)
        .context(error::ForcefulRemovalSnafu { name: name.as_str() })?;

    info!("Removing any AWS keypairs for node '{}'...", name);
    toolkit
        .cloud
        .delete_key_pair(name.as_str())
        .context(error::KeyPairSnafu { name: name.as_str() })
}
