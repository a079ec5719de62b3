//! Camera roster configuration.
//!
//! The bridge is configured from a TOML file listing one `[[cameras]]`
//! table per camera. Validation happens once at load time; a bad roster
//! is fatal before any connection is attempted.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

fn default_port() -> u16 {
    80
}

/// One camera entry from the roster.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Unique name, used as the routing key for all per-camera state.
    pub name: String,
    /// Hostname or IP of the camera's HTTP interface.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Base topic for published events.
    pub topic: String,
    /// Event codes to subscribe to, joined into the attach request.
    pub events: Vec<String>,
}

impl CameraConfig {
    /// The long-poll attach URL for this camera.
    ///
    /// The bracket delimiters around the code list are sent
    /// percent-encoded, which is what the cameras expect on the wire.
    pub fn attach_url(&self) -> String {
        format!(
            "http://{}:{}/cgi-bin/eventManager.cgi?action=attach&codes=%5B{}%5D",
            self.host,
            self.port,
            self.events.join(",")
        )
    }
}

/// The full bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub cameras: Vec<CameraConfig>,
}

impl BridgeConfig {
    /// Reads and validates a roster from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        info!(
            path = %path.display(),
            cameras = config.cameras.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates a roster from a TOML string.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(Error::Config("camera roster is empty".into()));
        }

        let mut seen = HashSet::new();
        for camera in &self.cameras {
            if camera.name.is_empty() {
                return Err(Error::Config("camera name must not be empty".into()));
            }
            if !seen.insert(camera.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate camera name: {}",
                    camera.name
                )));
            }
            if camera.host.is_empty() {
                return Err(Error::Config(format!(
                    "camera {}: host must not be empty",
                    camera.name
                )));
            }
            if camera.port == 0 {
                return Err(Error::Config(format!(
                    "camera {}: port must not be zero",
                    camera.name
                )));
            }
            if camera.username.is_empty() {
                return Err(Error::Config(format!(
                    "camera {}: username must not be empty",
                    camera.name
                )));
            }
            if camera.topic.is_empty() {
                return Err(Error::Config(format!(
                    "camera {}: topic must not be empty",
                    camera.name
                )));
            }
            if camera.events.is_empty() {
                return Err(Error::Config(format!(
                    "camera {}: event list must not be empty",
                    camera.name
                )));
            }
            if camera.events.iter().any(|code| code.is_empty()) {
                return Err(Error::Config(format!(
                    "camera {}: event codes must not be empty",
                    camera.name
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
