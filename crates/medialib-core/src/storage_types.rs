use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Disk driver types
///
/// Closed set of drivers a configured disk can be backed by. Lives in core
/// because both configuration and the storage factory read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskDriver {
    Local,
    Memory,
}

impl FromStr for DiskDriver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(DiskDriver::Local),
            "memory" => Ok(DiskDriver::Memory),
            _ => Err(anyhow::anyhow!("Invalid disk driver: {}", s)),
        }
    }
}

impl Display for DiskDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DiskDriver::Local => write!(f, "local"),
            DiskDriver::Memory => write!(f, "memory"),
        }
    }
}
