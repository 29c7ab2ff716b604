use crate::control_plane::ApiError;
use crate::docker_machine::MachineError;
use crate::puppet::PuppetError;
use agent_utils::retry::RetryError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to provision '{}'!: {}", name, source))]
    ProvisionFailed {
        name: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("Failed while configuring Rancher server '{}'!: {}", name, source))]
    ConfigureFailed {
        name: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("Failed to deprovision '{}'!: {}", name, source))]
    DeprovisionFailed {
        name: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display(
        "No agent registration found at '{}'. Configure the server first or set \
         RANCHER_AGENT_REGISTRATION_URL.",
        path
    ))]
    MissingServerRegistration { path: String },

    #[snafu(display("{}", source))]
    Machine { source: MachineError },

    #[snafu(display("Failed while {}: {}", what, source))]
    ControlPlane { what: String, source: ApiError },

    #[snafu(display("Forceful removal of '{}' failed: {}", name, source))]
    ForcefulRemoval { name: String, source: PuppetError },

    #[snafu(display("Unable to remove the key pair of '{}': {}", name, source))]
    KeyPair {
        name: String,
        source: agent_utils::Error,
    },

    #[snafu(display("Unable to write '{}': {}", path, source))]
    OutputWrite {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("{}", source))]
    Registration { source: rancher_types::Error },

    #[snafu(display("No active agent registration token is listed at '{}'", url))]
    RegistrationToken { url: String },

    #[snafu(display("The agent registration token never became active: {}", source))]
    RegistrationTokenTimeout {
        #[snafu(source(from(RetryError<Error>, Box::new)))]
        source: Box<RetryError<Error>>,
    },

    #[snafu(display("Invalid URL '{}': {}", url, source))]
    Url {
        url: String,
        source: url::ParseError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
