use crate::constants::DEFAULT_AGENT_IMAGE;
use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Everything an agent node needs to join the control plane.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// The URL the agent container registers against, e.g.
    /// `http://10.0.0.1:8080/v1/scripts/<token>`.
    pub registration_url: String,
    /// The agent container image, including its tag.
    pub image: String,
    pub token: Option<String>,
}

impl Registration {
    /// A registration built from a URL alone, using the default agent image.
    pub fn from_url<S: Into<String>>(registration_url: S) -> Self {
        Self {
            registration_url: registration_url.into(),
            image: DEFAULT_AGENT_IMAGE.to_string(),
            token: None,
        }
    }

    /// Read a registration previously written with [`Registration::write_to`]. A missing file is
    /// `Ok(None)`.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read_to_string(path) {
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            result => result.context(error::RegistrationReadSnafu {
                path: path.display().to_string(),
            })?,
        };
        serde_json::from_str(&data)
            .context(error::RegistrationParseSnafu {
                path: path.display().to_string(),
            })
            .map(Some)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context(error::RegistrationSerializeSnafu)?;
        fs::write(path, data).context(error::RegistrationWriteSnafu {
            path: path.display().to_string(),
        })
    }
}
