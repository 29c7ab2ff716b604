/*!

`rancher-types` holds the data model shared by the Rancher test environment crates: the validated
provisioning configuration, node naming, the supported platforms and the agent registration
handed from the server configuration step to the agent provisioning step.

!*/

pub mod config;
pub mod constants;
mod error;
pub mod naming;
pub mod platform;
mod registration;

pub use config::{AwsConfig, Environment, NodeRole, ProvisioningConfig};
pub use error::{Error, Result};
pub use naming::NodeIdentity;
pub use platform::{os_to_platform_settings, Platform, PlatformSettings};
pub use registration::Registration;
