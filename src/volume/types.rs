//! Volume record types

use crate::common::{validate_volume_name, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// How a volume's bricks are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeType {
    Distribute,
    Replicate,
    Disperse,
    DistReplicate,
    DistDisperse,
}

impl VolumeType {
    /// Replicate, Disperse and their distributed compositions
    pub fn is_replicating(&self) -> bool {
        matches!(
            self,
            VolumeType::Replicate
                | VolumeType::Disperse
                | VolumeType::DistReplicate
                | VolumeType::DistDisperse
        )
    }
}

impl std::fmt::Display for VolumeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeType::Distribute => write!(f, "Distribute"),
            VolumeType::Replicate => write!(f, "Replicate"),
            VolumeType::Disperse => write!(f, "Disperse"),
            VolumeType::DistReplicate => write!(f, "Distributed-Replicate"),
            VolumeType::DistDisperse => write!(f, "Distributed-Disperse"),
        }
    }
}

/// Volume lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeState {
    Created,
    Started,
    Stopped,
}

impl std::fmt::Display for VolumeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeState::Created => write!(f, "Created"),
            VolumeState::Started => write!(f, "Started"),
            VolumeState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// One physical storage contribution to a volume
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Brick {
    pub hostname: String,
    pub path: String,
}

impl Brick {
    pub fn new(hostname: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for Brick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.path)
    }
}

/// A volume record, always persisted whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub vol_type: VolumeType,
    pub state: VolumeState,
    #[serde(default)]
    pub bricks: Vec<Brick>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Volume {
    /// New volume in the `Created` state with a fresh UUID
    pub fn new(name: impl Into<String>, vol_type: VolumeType, bricks: Vec<Brick>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            vol_type,
            state: VolumeState::Created,
            bricks,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn bricks(&self) -> &[Brick] {
        &self.bricks
    }

    pub fn is_replicating(&self) -> bool {
        self.vol_type.is_replicating()
    }

    pub fn is_started(&self) -> bool {
        self.state == VolumeState::Started
    }

    /// Check the record invariants: valid name, no duplicate brick.
    pub fn validate(&self) -> Result<()> {
        validate_volume_name(&self.name)?;

        let mut seen = HashSet::with_capacity(self.bricks.len());
        for brick in &self.bricks {
            if brick.hostname.is_empty() || brick.path.is_empty() {
                return Err(Error::InvalidVolume(format!(
                    "volume {} has a brick with an empty host or path",
                    self.name
                )));
            }
            if !seen.insert((brick.hostname.as_str(), brick.path.as_str())) {
                return Err(Error::InvalidVolume(format!(
                    "volume {} lists brick {} more than once",
                    self.name, brick
                )));
            }
        }

        Ok(())
    }

    /// Verify that `hostname:path` is one of this volume's bricks.
    ///
    /// `UnknownHost` when no brick lives on `hostname`, `UnknownBrickPath`
    /// when the host is part of the volume but not at `path`.
    pub fn validate_brick_location(&self, hostname: &str, path: &str) -> Result<()> {
        let mut host_found = false;
        for brick in &self.bricks {
            if brick.hostname == hostname {
                if brick.path == path {
                    return Ok(());
                }
                host_found = true;
            }
        }

        if host_found {
            Err(Error::UnknownBrickPath {
                volume: self.name.clone(),
                host: hostname.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(Error::UnknownHost {
                volume: self.name.clone(),
                host: hostname.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_host_volume() -> Volume {
        Volume::new(
            "gv0",
            VolumeType::Replicate,
            vec![Brick::new("host1", "/data/b1"), Brick::new("host2", "/data/b2")],
        )
    }

    #[test]
    fn test_validate_brick_location() {
        let vol = two_host_volume();

        assert!(vol.validate_brick_location("host1", "/data/b1").is_ok());
        assert!(vol.validate_brick_location("host2", "/data/b2").is_ok());

        assert!(matches!(
            vol.validate_brick_location("host3", "/data/b1"),
            Err(Error::UnknownHost { .. })
        ));
        assert!(matches!(
            vol.validate_brick_location("host1", "/data/wrong"),
            Err(Error::UnknownBrickPath { .. })
        ));
        // path of another host's brick is still the wrong path for host1
        assert!(matches!(
            vol.validate_brick_location("host1", "/data/b2"),
            Err(Error::UnknownBrickPath { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_bricks() {
        let mut vol = two_host_volume();
        assert!(vol.validate().is_ok());

        vol.bricks.push(Brick::new("host1", "/data/b1"));
        assert!(matches!(vol.validate(), Err(Error::InvalidVolume(_))));
    }

    #[test]
    fn test_same_path_on_different_hosts_is_allowed() {
        let vol = Volume::new(
            "gv1",
            VolumeType::Distribute,
            vec![Brick::new("host1", "/data/b"), Brick::new("host2", "/data/b")],
        );
        assert!(vol.validate().is_ok());
    }

    #[test]
    fn test_replicating_types() {
        assert!(!VolumeType::Distribute.is_replicating());
        assert!(VolumeType::Replicate.is_replicating());
        assert!(VolumeType::Disperse.is_replicating());
        assert!(VolumeType::DistReplicate.is_replicating());
        assert!(VolumeType::DistDisperse.is_replicating());
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = r#"{
            "id": "6f1b1c57-1d0a-4a55-9f0e-0c2b7e2f1a10",
            "name": "gv0",
            "type": "Disperse",
            "state": "Started",
            "bricks": [{"hostname": "host1", "path": "/b1", "port": 49152}],
            "snapshot_count": 3
        }"#;
        let vol: Volume = serde_json::from_str(json).unwrap();
        assert_eq!(vol.vol_type, VolumeType::Disperse);
        assert!(vol.is_started());
        assert!(vol.metadata.is_empty());
        assert_eq!(vol.bricks()[0], Brick::new("host1", "/b1"));
    }
}
