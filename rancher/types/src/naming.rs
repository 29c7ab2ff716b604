use crate::config::ProvisioningConfig;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The name of a node. It is derived from configuration only, so the same configuration always
/// produces the same name, which is what lets a later pipeline step find (or remove) the node an
/// earlier step created.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeIdentity(String);

impl NodeIdentity {
    /// The name of the single control-plane node.
    pub fn server(config: &ProvisioningConfig) -> Self {
        Self::derive(config, "server0")
    }

    /// The name of agent `index`, counting from one.
    pub fn agent(config: &ProvisioningConfig, index: u32) -> Self {
        Self::derive(config, &format!("agent{}", index))
    }

    fn derive(config: &ProvisioningConfig, suffix: &str) -> Self {
        let mut name = String::new();
        if let Some(prefix) = &config.aws.prefix {
            name.push_str(&prefix.replace('.', "-"));
            name.push('-');
        }
        name.push_str(&format!(
            "{}-{}-d{}-{}-{}",
            config.rancher_version.replace('.', ""),
            config.orchestration,
            config.docker_version.replace(['.', '~'], ""),
            config.os,
            suffix
        ));
        Self(name.trim_end().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
