use crate::constants::DEFAULT_AGENT_COUNT;
use crate::error::{self, Result};
use crate::platform::Platform;
use log::debug;
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;
use std::ffi::OsString;

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const AWS_TAGS: &str = "AWS_TAGS";
pub const AWS_VPC_ID: &str = "AWS_VPC_ID";
pub const AWS_SUBNET_ID: &str = "AWS_SUBNET_ID";
pub const AWS_SECURITY_GROUP: &str = "AWS_SECURITY_GROUP";
pub const AWS_ZONE: &str = "AWS_ZONE";
pub const AWS_PREFIX: &str = "AWS_PREFIX";
pub const RANCHER_VERSION: &str = "RANCHER_VERSION";
pub const RANCHER_DOCKER_VERSION: &str = "RANCHER_DOCKER_VERSION";
pub const RANCHER_ORCHESTRATION: &str = "RANCHER_ORCHESTRATION";
pub const RANCHER_SERVER_OPERATINGSYSTEM: &str = "RANCHER_SERVER_OPERATINGSYSTEM";
pub const RANCHER_SERVER_AWS_INSTANCE_TYPE: &str = "RANCHER_SERVER_AWS_INSTANCE_TYPE";
pub const RANCHER_AGENT_OPERATINGSYSTEM: &str = "RANCHER_AGENT_OPERATINGSYSTEM";
pub const RANCHER_AGENT_AWS_INSTANCE_TYPE: &str = "RANCHER_AGENT_AWS_INSTANCE_TYPE";
pub const RANCHER_AGENTS_COUNT: &str = "RANCHER_AGENTS_COUNT";
pub const RANCHER_AGENT_REGISTRATION_URL: &str = "RANCHER_AGENT_REGISTRATION_URL";

/// Every `AWS_*` variable shares this prefix.
pub const AWS_PREFIX_PATTERN: &str = "AWS_";

/// A snapshot of key/value configuration, normally taken from the process environment once at
/// startup. Nothing in this repository reads the process environment after the snapshot is taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Entries whose key or value is not valid unicode are skipped.
    pub fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        vars.into_iter()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    debug!("Skipping non-unicode environment variable {:?}", key);
                    None
                }
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.vars.insert(key.into(), value.into());
    }

    /// Iterate over all entries whose key starts with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.vars
            .iter()
            .filter(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Which kind of node a [`ProvisioningConfig`] describes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeRole {
    Server,
    Agent,
}

impl NodeRole {
    fn os_key(&self) -> &'static str {
        match self {
            NodeRole::Server => RANCHER_SERVER_OPERATINGSYSTEM,
            NodeRole::Agent => RANCHER_AGENT_OPERATINGSYSTEM,
        }
    }

    fn instance_type_key(&self) -> &'static str {
        match self {
            NodeRole::Server => RANCHER_SERVER_AWS_INSTANCE_TYPE,
            NodeRole::Agent => RANCHER_AGENT_AWS_INSTANCE_TYPE,
        }
    }

    /// The keys that must be present for this role, in the order they are reported.
    pub fn required_keys(&self) -> Vec<&'static str> {
        vec![
            AWS_ACCESS_KEY_ID,
            AWS_SECRET_ACCESS_KEY,
            AWS_DEFAULT_REGION,
            AWS_TAGS,
            AWS_VPC_ID,
            AWS_SUBNET_ID,
            AWS_SECURITY_GROUP,
            AWS_ZONE,
            self.os_key(),
            RANCHER_VERSION,
            RANCHER_DOCKER_VERSION,
            RANCHER_ORCHESTRATION,
            self.instance_type_key(),
        ]
    }
}

/// Cloud account and network settings shared by every node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
    pub tags: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub security_group: String,
    pub zone: String,
    pub prefix: Option<String>,
    /// Every `AWS_*` entry of the environment, including the ones above. These are handed to the
    /// node provisioning tool after translation.
    pub settings: BTreeMap<String, String>,
}

/// The validated configuration for one lifecycle operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisioningConfig {
    pub role: NodeRole,
    pub aws: AwsConfig,
    pub os: String,
    pub platform: Platform,
    pub rancher_version: String,
    pub docker_version: String,
    pub orchestration: String,
    pub instance_type: String,
    pub agent_count: u32,
    pub registration_url: Option<String>,
}

impl ProvisioningConfig {
    pub fn for_server(env: &Environment) -> Result<Self> {
        Self::new(NodeRole::Server, env)
    }

    pub fn for_agents(env: &Environment) -> Result<Self> {
        Self::new(NodeRole::Agent, env)
    }

    /// Validate `env` for `role`. All missing keys are collected and reported together.
    pub fn new(role: NodeRole, env: &Environment) -> Result<Self> {
        let mut lookup = Lookup::new(env);
        let aws = AwsConfig {
            access_key_id: lookup.required(AWS_ACCESS_KEY_ID),
            secret_access_key: lookup.required(AWS_SECRET_ACCESS_KEY),
            session_token: lookup.optional(AWS_SESSION_TOKEN),
            region: lookup.required(AWS_DEFAULT_REGION),
            tags: lookup.required(AWS_TAGS),
            vpc_id: lookup.required(AWS_VPC_ID),
            subnet_id: lookup.required(AWS_SUBNET_ID),
            security_group: lookup.required(AWS_SECURITY_GROUP),
            zone: lookup.required(AWS_ZONE),
            prefix: lookup.optional(AWS_PREFIX),
            settings: env
                .with_prefix(AWS_PREFIX_PATTERN)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let os = lookup.required(role.os_key());
        let rancher_version = lookup.required(RANCHER_VERSION);
        let docker_version = lookup.required(RANCHER_DOCKER_VERSION);
        let orchestration = lookup.required(RANCHER_ORCHESTRATION);
        let instance_type = lookup.required(role.instance_type_key());
        lookup.finish()?;

        let agent_count = match env.get(RANCHER_AGENTS_COUNT) {
            Some(count) => parse_agent_count(count)?,
            None => DEFAULT_AGENT_COUNT,
        };

        Ok(Self {
            role,
            aws,
            platform: Platform::from_os_tag(&os)?,
            os,
            rancher_version,
            docker_version,
            orchestration,
            instance_type,
            agent_count,
            registration_url: lookup.optional(RANCHER_AGENT_REGISTRATION_URL),
        })
    }
}

fn parse_agent_count(value: &str) -> Result<u32> {
    let count = value
        .trim()
        .parse::<u32>()
        .context(error::InvalidNumberSnafu {
            key: RANCHER_AGENTS_COUNT,
            value,
        })?;
    ensure!(
        count > 0,
        error::InvalidValueSnafu {
            key: RANCHER_AGENTS_COUNT,
            value,
            reason: "at least one agent is required",
        }
    );
    Ok(count)
}

/// Reads keys out of an [`Environment`] while remembering every required key that was absent.
struct Lookup<'a> {
    env: &'a Environment,
    missing: Vec<String>,
}

impl<'a> Lookup<'a> {
    fn new(env: &'a Environment) -> Self {
        Self {
            env,
            missing: Vec::new(),
        }
    }

    fn value(&self, key: &str) -> Option<String> {
        self.env
            .get(key)
            .map(|v| v.trim_end().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &str) -> String {
        match self.value(key) {
            Some(value) => value,
            None => {
                debug!("Missing envvar '{}'!", key);
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.value(key)
    }

    fn finish(&self) -> Result<()> {
        ensure!(
            self.missing.is_empty(),
            error::MissingConfigurationSnafu {
                keys: self.missing.clone(),
            }
        );
        Ok(())
    }
}

/// Used by tests throughout the workspace to build a complete, valid environment.
#[cfg(any(test, feature = "test-fixtures"))]
pub fn example_environment() -> Environment {
    [
        (AWS_ACCESS_KEY_ID, "AKIDEXAMPLE"),
        (AWS_SECRET_ACCESS_KEY, "secret"),
        (AWS_DEFAULT_REGION, "us-west-2"),
        (AWS_TAGS, "owner,ci"),
        (AWS_VPC_ID, "vpc-1234"),
        (AWS_SUBNET_ID, "subnet-1234"),
        (AWS_SECURITY_GROUP, "ci-nodes"),
        (AWS_ZONE, "a"),
        (RANCHER_SERVER_OPERATINGSYSTEM, "ubuntu-1604"),
        (RANCHER_AGENT_OPERATINGSYSTEM, "centos-7"),
        (RANCHER_VERSION, "v1.6.10"),
        (RANCHER_DOCKER_VERSION, "17.03.2~ce"),
        (RANCHER_ORCHESTRATION, "cattle"),
        (RANCHER_SERVER_AWS_INSTANCE_TYPE, "m4.large"),
        (RANCHER_AGENT_AWS_INSTANCE_TYPE, "m4.xlarge"),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    fn without(keys: &[&str]) -> Environment {
        example_environment()
            .vars
            .into_iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .collect()
    }

    #[test]
    fn valid_server_config() {
        let config = ProvisioningConfig::for_server(&example_environment()).unwrap();
        assert_eq!(config.role, NodeRole::Server);
        assert_eq!(config.os, "ubuntu-1604");
        assert_eq!(config.platform, Platform::Ubuntu1604);
        assert_eq!(config.instance_type, "m4.large");
        assert_eq!(config.aws.region, "us-west-2");
        assert_eq!(config.agent_count, DEFAULT_AGENT_COUNT);
        assert!(config.aws.settings.contains_key(AWS_VPC_ID));
        assert!(!config.aws.settings.contains_key(RANCHER_VERSION));
    }

    #[test]
    fn agent_config_uses_agent_keys() {
        let config = ProvisioningConfig::for_agents(&example_environment()).unwrap();
        assert_eq!(config.platform, Platform::Centos7);
        assert_eq!(config.instance_type, "m4.xlarge");
    }

    #[test]
    fn every_missing_key_is_reported() {
        let env = without(&[AWS_ACCESS_KEY_ID, AWS_ZONE, RANCHER_ORCHESTRATION]);
        let err = ProvisioningConfig::for_server(&env).unwrap_err();
        match &err {
            Error::MissingConfiguration { keys } => assert_eq!(
                keys,
                &vec![
                    AWS_ACCESS_KEY_ID.to_string(),
                    AWS_ZONE.to_string(),
                    RANCHER_ORCHESTRATION.to_string()
                ]
            ),
            other => panic!("unexpected error: {}", other),
        }
        let message = err.to_string();
        assert!(message.contains("AWS_ACCESS_KEY_ID, AWS_ZONE, RANCHER_ORCHESTRATION"));
    }

    #[test]
    fn empty_environment_reports_all_required_keys() {
        let err = ProvisioningConfig::for_agents(&Environment::default()).unwrap_err();
        match err {
            Error::MissingConfiguration { keys } => {
                assert_eq!(keys, NodeRole::Agent.required_keys())
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut env = example_environment();
        env.vars.insert(AWS_TAGS.to_string(), "\n".to_string());
        let err = ProvisioningConfig::for_server(&env).unwrap_err();
        assert!(matches!(err, Error::MissingConfiguration { ref keys } if keys == &vec![AWS_TAGS.to_string()]));
    }

    #[test]
    fn unsupported_os() {
        let mut env = example_environment();
        env.vars
            .insert(RANCHER_SERVER_OPERATINGSYSTEM.to_string(), "beos".to_string());
        let err = ProvisioningConfig::for_server(&env).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform { .. }));
    }

    #[test]
    fn agent_count() {
        let mut env = example_environment();
        env.vars
            .insert(RANCHER_AGENTS_COUNT.to_string(), "5".to_string());
        assert_eq!(ProvisioningConfig::for_agents(&env).unwrap().agent_count, 5);

        env.vars
            .insert(RANCHER_AGENTS_COUNT.to_string(), "zero".to_string());
        assert!(matches!(
            ProvisioningConfig::for_agents(&env).unwrap_err(),
            Error::InvalidNumber { .. }
        ));

        env.vars
            .insert(RANCHER_AGENTS_COUNT.to_string(), "0".to_string());
        assert!(matches!(
            ProvisioningConfig::for_agents(&env).unwrap_err(),
            Error::InvalidValue { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn process_snapshot_skips_non_unicode_entries() {
        use std::os::unix::ffi::OsStringExt;

        let env = Environment::from_os_vars(vec![
            (OsString::from(AWS_ZONE), OsString::from("a")),
            (
                OsString::from("UNRELATED_CI_VAR"),
                OsString::from_vec(vec![0x66, 0xff, 0x6f]),
            ),
            (OsString::from_vec(vec![0xff]), OsString::from("value")),
        ]);
        assert_eq!(env.get(AWS_ZONE), Some("a"));
        assert_eq!(env.get("UNRELATED_CI_VAR"), None);
        assert_eq!(env.with_prefix("").count(), 1);
    }
}
