/*!

The server node runs the `rancher/server` container. Provisioning a server is split over two
pipeline steps: `provision` creates and bootstraps the node, `configure` waits for the control
plane API and prepares it for agents. Each step ends by writing a file to the output directory for
the steps after it: the control plane URL and the agent [`Registration`].

!*/

use crate::docker_machine::NodeSpec;
use crate::error::{self, Result};
use crate::node::{self, NodeState};
use crate::Toolkit;
use agent_utils::json_display;
use agent_utils::retry::{RetryPolicy, RetryRunner};
use log::{debug, info};
use rancher_types::constants::{
    CONTROL_PLANE_PORT, DEFAULT_AGENT_IMAGE, DEFAULT_PROJECT_ID, READINESS_PROVIDER,
    REGISTRATION_FILE, SERVER_URL_FILE,
};
use rancher_types::{NodeIdentity, ProvisioningConfig, Registration};
use serde_json::{json, Value};
use snafu::{OptionExt, ResultExt};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// A freshly started server can take most of an hour to serve its API.
pub const READINESS_POLICY: RetryPolicy = RetryPolicy::new(60, Duration::from_secs(60));
pub const TOKEN_POLICY: RetryPolicy = RetryPolicy::new(20, Duration::from_secs(20));
/// Each listing of the registration tokens is a single request; [`TOKEN_POLICY`] paces the
/// listings instead.
const SINGLE_ATTEMPT: RetryPolicy = RetryPolicy::new(1, Duration::ZERO);
/// The API answers before it is able to handle configuration calls.
pub const SETTLE_DELAY: Duration = Duration::from_secs(30);

pub struct ServerController<'t> {
    config: &'t ProvisioningConfig,
    toolkit: Toolkit<'t>,
    output_dir: PathBuf,
    name: NodeIdentity,
    state: NodeState,
}

impl<'t> ServerController<'t> {
    pub fn new<P: Into<PathBuf>>(
        config: &'t ProvisioningConfig,
        toolkit: Toolkit<'t>,
        output_dir: P,
    ) -> Self {
        Self {
            name: NodeIdentity::server(config),
            config,
            toolkit,
            output_dir: output_dir.into(),
            state: NodeState::default(),
        }
    }

    pub fn name(&self) -> &NodeIdentity {
        &self.name
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    /// The server's current address, looked up on every call.
    pub fn address(&self) -> Result<IpAddr> {
        self.toolkit
            .machine
            .resolve_address(&self.name)
            .context(error::MachineSnafu)
    }

    pub fn provision(&mut self) -> Result<()> {
        self.provision_steps()
            .context(error::ProvisionFailedSnafu {
                name: self.name.as_str(),
            })
    }

    fn provision_steps(&mut self) -> Result<()> {
        let spec = NodeSpec::from_config(self.config);
        let address = node::prepare_node(
            &self.toolkit,
            &self.name,
            &spec,
            self.config.platform,
            &mut self.state,
        )?;

        info!("Starting Rancher server...");
        let version = &self.config.rancher_version;
        node::run(
            &self.toolkit,
            &self.name,
            &format!(
                "docker rm -f rancher_server_{} 2>/dev/null; \
                 docker run -d --restart=always --name=rancher_server_{} -p {}:{} rancher/server:{}",
                version, version, CONTROL_PLANE_PORT, CONTROL_PLANE_PORT, version
            ),
        )?;
        self.state = NodeState::Bootstrapped;

        let url = base_url(address);
        info!(
            "Rancher node hosting rancher/server will soon be available at {}",
            url
        );
        write_output(&self.output_dir.join(SERVER_URL_FILE), &url)
    }

    /// Wait for the control plane API, create the first agent registration token and point the
    /// API at the server's own address. The resulting registration is written to the output
    /// directory and returned.
    pub fn configure(&mut self) -> Result<Registration> {
        self.configure_steps()
            .context(error::ConfigureFailedSnafu {
                name: self.name.as_str(),
            })
    }

    fn configure_steps(&mut self) -> Result<Registration> {
        let base = base_url(self.address()?);
        let control_plane = self.toolkit.control_plane;

        let readiness = parse_url(&format!(
            "{}/v1/schemas/{}Config",
            base, READINESS_PROVIDER
        ))?;
        info!("Polling '{}' for active API provider...", readiness);
        control_plane
            .poll_until_ready(&readiness, &READINESS_POLICY)
            .context(error::ControlPlaneSnafu {
                what: "waiting for the API provider to become available",
            })?;

        info!(
            "The API provider is available, waiting {}s before configuring it...",
            SETTLE_DELAY.as_secs()
        );
        self.toolkit.sleeper.sleep(SETTLE_DELAY);

        info!("Setting the initial agent reg token...");
        let tokens = parse_url(&format!(
            "{}/v2-beta/projects/{}/registrationtokens",
            base, DEFAULT_PROJECT_ID
        ))?;
        let token_response = control_plane
            .post(&tokens, &json!({}), &TOKEN_POLICY)
            .context(error::ControlPlaneSnafu {
                what: "creating the initial agent registration token",
            })?;
        debug!("reg token response: {}", token_response);

        info!("Setting the agent registration URL...");
        let api_host = parse_url(&format!("{}/v2-beta/settings/api.host", base))?;
        let response = control_plane
            .put(&api_host, &api_host_setting(&base), &RetryPolicy::default())
            .context(error::ControlPlaneSnafu {
                what: "setting the agent registration URL",
            })?;
        debug!("reg url response: {}", response);

        let registration = match registration_from_token(&base, &token_response) {
            Some(registration) => registration,
            None => self.await_active_token(&base, &tokens)?,
        };
        debug!("Agent registration: {}", json_display(&registration));
        registration
            .write_to(&self.output_dir.join(REGISTRATION_FILE))
            .context(error::RegistrationSnafu)?;
        self.state = NodeState::Configured;
        Ok(registration)
    }

    /// A new token is still registering when the POST answers, so list the project's tokens
    /// until one is active.
    fn await_active_token(&self, base: &str, tokens: &Url) -> Result<Registration> {
        info!("Waiting for the agent registration token to become active...");
        let control_plane = self.toolkit.control_plane;
        RetryRunner::new(self.toolkit.sleeper)
            .execute(
                "waiting for an active agent registration token",
                &TOKEN_POLICY,
                |_: &error::Error| true,
                || {
                    let listing = control_plane.get(tokens, &SINGLE_ATTEMPT).context(
                        error::ControlPlaneSnafu {
                            what: "listing the agent registration tokens",
                        },
                    )?;
                    active_registration(base, &listing).context(error::RegistrationTokenSnafu {
                        url: tokens.as_str(),
                    })
                },
            )
            .context(error::RegistrationTokenTimeoutSnafu)
    }

    /// Remove the server node. Safe to call when the node is partly or entirely gone.
    pub fn deprovision(&mut self) -> Result<()> {
        node::teardown_node(&self.toolkit, &self.name, &self.config.aws.region).context(
            error::DeprovisionFailedSnafu {
                name: self.name.as_str(),
            },
        )?;
        self.state = NodeState::Deprovisioned;
        Ok(())
    }
}

fn base_url(address: IpAddr) -> String {
    format!("http://{}:{}", address, CONTROL_PLANE_PORT)
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).context(error::UrlSnafu { url })
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).context(error::OutputWriteSnafu {
        path: path.display().to_string(),
    })
}

fn api_host_setting(base: &str) -> Value {
    json!({
        "type": "activeSetting",
        "name": "api.host",
        "activeValue": "",
        "inDb": false,
        "source": "",
        "value": base,
    })
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Prefer the URL and image the control plane reports, falling back to the scripts endpoint for
/// the token and the default agent image. A token that has neither is not usable yet.
fn registration_from_token(base: &str, token: &Value) -> Option<Registration> {
    let value = non_empty_str(token, "token").map(str::to_string);
    let registration_url = match non_empty_str(token, "registrationUrl") {
        Some(url) => url.to_string(),
        None => format!("{}/v1/scripts/{}", base, value.as_deref()?),
    };
    Some(Registration {
        registration_url,
        image: non_empty_str(token, "image")
            .unwrap_or(DEFAULT_AGENT_IMAGE)
            .to_string(),
        token: value,
    })
}

/// The first active token of a token collection.
fn active_registration(base: &str, listing: &Value) -> Option<Registration> {
    listing
        .get("data")?
        .as_array()?
        .iter()
        .filter(|token| token.get("state").and_then(Value::as_str) == Some("active"))
        .find_map(|token| registration_from_token(base, token))
}
