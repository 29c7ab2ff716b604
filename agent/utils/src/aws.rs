use crate::constants::AWS_SDK_MAX_ATTEMPTS;
use crate::error::{self, Result};
use aws_config::retry::RetryConfig;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_smithy_types::retry::RetryMode;
use aws_types::region::Region;
use log::{debug, info};
use rancher_types::config::AWS_PREFIX_PATTERN;
use rancher_types::ProvisioningConfig;
use snafu::ResultExt;
use std::collections::BTreeMap;
use tokio::runtime::Runtime;

/// The prefix the node provisioning tool expects on its EC2 settings.
pub const AMAZONEC2_PREFIX: &str = "AMAZONEC2_";
const AMAZONEC2_ACCESS_KEY: &str = "AMAZONEC2_ACCESS_KEY";
const AMAZONEC2_SECRET_KEY: &str = "AMAZONEC2_SECRET_KEY";
const AMAZONEC2_REGION: &str = "AMAZONEC2_REGION";
const AMAZONEC2_TAGS: &str = "AMAZONEC2_TAGS";
const DOCKER_VERSION_TAG: &str = "rancher.docker.version";

/// Direct calls to the cloud provider, for the cleanup the node provisioning tool leaves behind.
pub trait CloudAccessor {
    /// Delete the SSH key pair named `name`. Deleting a key pair that does not exist succeeds.
    fn delete_key_pair(&self, name: &str) -> Result<()>;
}

/// A blocking EC2 client. It owns a single-threaded tokio runtime that drives the SDK's futures.
pub struct Ec2Accessor {
    runtime: Runtime,
    client: aws_sdk_ec2::Client,
}

impl Ec2Accessor {
    pub fn new(aws: &rancher_types::AwsConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context(error::AwsRuntimeSnafu)?;
        info!(
            "Creating a custom region provider for '{}' to be used in the aws config.",
            aws.region
        );
        let credentials = Credentials::new(
            aws.access_key_id.clone(),
            aws.secret_access_key.clone(),
            aws.session_token.clone(),
            None,
            "rancher_environment",
        );
        let shared_config = runtime.block_on(
            aws_config::from_env()
                .region(Region::new(aws.region.clone()))
                .credentials_provider(SharedCredentialsProvider::new(credentials))
                .retry_config(
                    RetryConfig::standard()
                        .with_retry_mode(RetryMode::Adaptive)
                        .with_max_attempts(AWS_SDK_MAX_ATTEMPTS),
                )
                .load(),
        );
        Ok(Self {
            client: aws_sdk_ec2::Client::new(&shared_config),
            runtime,
        })
    }
}

impl CloudAccessor for Ec2Accessor {
    fn delete_key_pair(&self, name: &str) -> Result<()> {
        debug!("Deleting key pair '{}'", name);
        self.runtime
            .block_on(self.client.delete_key_pair().key_name(name).send())
            .context(error::DeleteKeyPairSnafu { name })?;
        Ok(())
    }
}

/// Build the environment handed to the node provisioning tool. Every `AWS_X` setting becomes
/// `AMAZONEC2_X`, the credentials and region are mapped to the names the tool uses, and the tags
/// carry the configured docker version. Values are trimmed of trailing whitespace. Applying the
/// translation to its own output changes nothing.
pub fn translate_network_environment(config: &ProvisioningConfig) -> BTreeMap<String, String> {
    let mut translated: BTreeMap<String, String> = config
        .aws
        .settings
        .iter()
        .map(|(key, value)| {
            let key = match key.strip_prefix(AWS_PREFIX_PATTERN) {
                Some(suffix) => format!("{}{}", AMAZONEC2_PREFIX, suffix),
                None => key.clone(),
            };
            (key, value.trim_end().to_string())
        })
        .collect();

    translated.insert(
        AMAZONEC2_ACCESS_KEY.to_string(),
        config.aws.access_key_id.clone(),
    );
    translated.insert(
        AMAZONEC2_SECRET_KEY.to_string(),
        config.aws.secret_access_key.clone(),
    );
    translated.insert(AMAZONEC2_REGION.to_string(), config.aws.region.clone());
    translated.insert(
        AMAZONEC2_TAGS.to_string(),
        tags_with_docker_version(&config.aws.tags, &config.docker_version),
    );
    translated
}

/// Tags are a flat `key,value,key,value` list.
fn tags_with_docker_version(tags: &str, docker_version: &str) -> String {
    let tags = tags.trim_end();
    let already_tagged = tags
        .split(',')
        .collect::<Vec<_>>()
        .chunks(2)
        .any(|pair| pair.first() == Some(&DOCKER_VERSION_TAG));
    if already_tagged {
        tags.to_string()
    } else if tags.is_empty() {
        format!("{},{}", DOCKER_VERSION_TAG, docker_version)
    } else {
        format!("{},{},{}", tags, DOCKER_VERSION_TAG, docker_version)
    }
}
