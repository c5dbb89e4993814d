//! The job file of a party.
//!
//! ```toml
//! party_index = 0
//! timeout_secs = 60
//!
//! [[parties]]
//! address = "127.0.0.1"
//! port = 8100
//! certificate = "keys/p0.pem"
//! private_key = "keys/p0.key"
//! # two more [[parties]] entries, in party order
//!
//! [roles]
//! feature_senders = [0, 2]
//! label_sender = 1
//!
//! [training]
//! penalty = "l2"
//! exponentiation = ["approx"]
//! ```
//! Certificate and key paths are relative to the directory of the job file.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::assembly::roles::RoleAssignment;
use crate::error::SessionError;
use crate::network::{Config, SerializedPartyConfig};
use crate::session::SessionParams;
use crate::training::TrainingConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid job file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid network configuration: {0}")]
    Network(io::Error),
    #[error(transparent)]
    Roles(#[from] SessionError),
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_feature_senders() -> Vec<usize> {
    vec![0, 2]
}

fn default_label_sender() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    #[serde(default = "default_feature_senders")]
    pub feature_senders: Vec<usize>,
    #[serde(default = "default_label_sender")]
    pub label_sender: usize,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            feature_senders: default_feature_senders(),
            label_sender: default_label_sender(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub party_index: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Plain TCP without TLS, for local testing only.
    #[serde(default)]
    pub insecure: bool,
    /// Worker threads for local computation, 0 for one per core.
    #[serde(default)]
    pub threads: Option<usize>,
    pub parties: Vec<SerializedPartyConfig>,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    /// Directory against which relative paths are resolved.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl JobConfig {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.base_dir = PathBuf::from("./");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;
        if let Some(parent) = path.parent() {
            config.base_dir = parent.to_path_buf();
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn network_config(&self) -> Result<Config, ConfigError> {
        Config::from_serialized(self.party_index, &self.parties, self.insecure, &self.base_dir)
            .map_err(ConfigError::Network)
    }

    pub fn session_params(&self) -> Result<SessionParams, ConfigError> {
        let roles = RoleAssignment::new(
            self.roles.feature_senders.iter().copied(),
            self.roles.label_sender,
        )?;
        Ok(SessionParams {
            roles,
            training: self.training.clone(),
            timeout: Some(self.timeout()),
            threads: self.threads,
        })
    }
}
