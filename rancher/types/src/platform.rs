use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use serde_plain::derive_display_from_serialize;
use snafu::OptionExt;

/// The operating systems a node can be launched with. Each one maps to exactly one AMI and one
/// remote login user, see [`Platform::settings`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "ubuntu-1604")]
    Ubuntu1604,
    #[serde(rename = "ubuntu-1404")]
    Ubuntu1404,
    #[serde(rename = "centos-7")]
    Centos7,
    #[serde(rename = "rhel-7")]
    Rhel7,
    #[serde(rename = "rancheros-v06")]
    RancherOsV06,
    #[serde(rename = "coreos-stable")]
    CoreOsStable,
}

derive_display_from_serialize!(Platform);

/// The values needed to launch and log into a node of a given [`Platform`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PlatformSettings {
    pub image_id: &'static str,
    pub remote_user: &'static str,
}

impl Platform {
    /// Lookup order for OS tags. An OS tag is matched by substring and the first entry that
    /// matches wins.
    pub const ALL: [Platform; 6] = [
        Platform::Ubuntu1604,
        Platform::Ubuntu1404,
        Platform::Centos7,
        Platform::Rhel7,
        Platform::RancherOsV06,
        Platform::CoreOsStable,
    ];

    /// The substring that identifies this platform inside an OS tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Platform::Ubuntu1604 => "ubuntu-1604",
            Platform::Ubuntu1404 => "ubuntu-1404",
            Platform::Centos7 => "centos-7",
            Platform::Rhel7 => "rhel-7",
            Platform::RancherOsV06 => "rancheros-v06",
            Platform::CoreOsStable => "coreos-stable",
        }
    }

    /// Resolve an OS tag such as `ubuntu-1604-hvm` to a platform.
    pub fn from_os_tag(os: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|platform| os.contains(platform.tag()))
            .copied()
            .context(error::UnsupportedPlatformSnafu { os })
    }

    pub fn settings(&self) -> PlatformSettings {
        let (image_id, remote_user) = match self {
            Platform::Ubuntu1604 => ("ami-a9d276c9", "ubuntu"),
            Platform::Ubuntu1404 => ("ami-01f05461", "ubuntu"),
            Platform::Centos7 => ("ami-d2c924b2", "centos"),
            Platform::Rhel7 => ("ami-99bef1a9", "ec2-user"),
            Platform::RancherOsV06 => ("ami-1ed3007e", "rancher"),
            Platform::CoreOsStable => ("ami-06af7f66", "core"),
        };
        PlatformSettings {
            image_id,
            remote_user,
        }
    }

    /// Red Hat derived images ship without the tools we need to bootstrap a node.
    pub fn is_redhat_family(&self) -> bool {
        matches!(self, Platform::Centos7 | Platform::Rhel7)
    }
}

/// Return the image and remote user for an OS tag.
pub fn os_to_platform_settings(os: &str) -> Result<PlatformSettings> {
    Ok(Platform::from_os_tag(os)?.settings())
}
