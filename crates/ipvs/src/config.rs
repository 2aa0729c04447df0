//! Client configuration.

use std::path::Path;

use common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::commands::{IPVS_GENL_NAME, IPVS_GENL_VERSION};

/// Longest generic netlink family name the kernel accepts, without the NUL.
const GENL_NAMSIZ: usize = 15;

/// Settings for reaching the IPVS generic netlink family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Family name to resolve through nlctrl
    #[serde(default = "default_family_name")]
    pub family_name: String,

    /// Version written into every generic netlink header
    #[serde(default = "default_genl_version")]
    pub genl_version: u8,
}

fn default_family_name() -> String {
    IPVS_GENL_NAME.to_string()
}

fn default_genl_version() -> u8 {
    IPVS_GENL_VERSION
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            family_name: default_family_name(),
            genl_version: default_genl_version(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.family_name.is_empty() {
            return Err(Error::config("family_name must not be empty"));
        }
        if self.family_name.len() > GENL_NAMSIZ {
            return Err(Error::config(format!(
                "family_name {:?} longer than {} bytes",
                self.family_name, GENL_NAMSIZ
            )));
        }
        if self.family_name.contains('\0') {
            return Err(Error::config("family_name must not contain NUL"));
        }
        if self.genl_version == 0 {
            return Err(Error::config("genl_version must be non-zero"));
        }
        Ok(())
    }
}
