use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Status of a device as recorded by the registry.
///
/// The register copies this value from every fresh detection onto the tracked device;
/// only [`DeviceStatus::Claimed`] changes supervision behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// No status reported.
    #[default]
    None,
    /// Attached and waiting for work.
    Idle,
    /// Executing a job.
    Busy,
    /// Held externally; its worker must not poll for jobs.
    Claimed,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::None => "none",
            DeviceStatus::Idle => "idle",
            DeviceStatus::Busy => "busy",
            DeviceStatus::Claimed => "claimed",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(DeviceStatus::None),
            "idle" => Ok(DeviceStatus::Idle),
            "busy" => Ok(DeviceStatus::Busy),
            "claimed" => Ok(DeviceStatus::Claimed),
            _ => Err(ModelError::InvalidStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!("claimed".parse::<DeviceStatus>(), Ok(DeviceStatus::Claimed));
        assert_eq!(" Idle ".parse::<DeviceStatus>(), Ok(DeviceStatus::Idle));
        assert_eq!("".parse::<DeviceStatus>(), Ok(DeviceStatus::None));
        assert!("lost".parse::<DeviceStatus>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&DeviceStatus::Busy).unwrap();
        assert_eq!(json, r#""busy""#);
        let back: DeviceStatus = serde_json::from_str(r#""claimed""#).unwrap();
        assert_eq!(back, DeviceStatus::Claimed);
    }
}
