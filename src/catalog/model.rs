use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterStatus {
    Up,
    OutOfService,
    Terminated,
}

impl ClusterStatus {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "UP" => Ok(ClusterStatus::Up),
            "OUT_OF_SERVICE" => Ok(ClusterStatus::OutOfService),
            "TERMINATED" => Ok(ClusterStatus::Terminated),
            other => Err(MeshError::InvalidRequest(format!(
                "unknown cluster status: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Up => "UP",
            ClusterStatus::OutOfService => "OUT_OF_SERVICE",
            ClusterStatus::Terminated => "TERMINATED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Active,
    Deprecated,
    Inactive,
}

impl CommandStatus {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(CommandStatus::Active),
            "DEPRECATED" => Ok(CommandStatus::Deprecated),
            "INACTIVE" => Ok(CommandStatus::Inactive),
            other => Err(MeshError::InvalidRequest(format!(
                "unknown command status: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Active => "ACTIVE",
            CommandStatus::Deprecated => "DEPRECATED",
            CommandStatus::Inactive => "INACTIVE",
        }
    }
}

/// A compute cluster jobs can be dispatched to.
///
/// `commands` lists attached command ids in priority order: position 0 is
/// preferred over position 1 when several attached commands satisfy a
/// command criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: ClusterStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub commands: Vec<String>,
}

/// An executable configuration attached to one or more clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: CommandStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub executable: String,
    #[serde(default = "default_check_delay_ms")]
    pub check_delay_ms: u64,
}

fn default_check_delay_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_status_parse() {
        assert_eq!(ClusterStatus::parse("up").unwrap(), ClusterStatus::Up);
        assert_eq!(
            ClusterStatus::parse("OUT_OF_SERVICE").unwrap(),
            ClusterStatus::OutOfService
        );
        assert!(ClusterStatus::parse("DOWN").is_err());
    }

    #[test]
    fn command_status_parse() {
        assert_eq!(
            CommandStatus::parse("active").unwrap(),
            CommandStatus::Active
        );
        assert!(CommandStatus::parse("RETIRED").is_err());
    }

    #[test]
    fn status_round_trips_through_as_str() {
        for status in [
            ClusterStatus::Up,
            ClusterStatus::OutOfService,
            ClusterStatus::Terminated,
        ] {
            assert_eq!(ClusterStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
