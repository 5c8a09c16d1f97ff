use serde::{Deserialize, Serialize};

/// Connection state reported by a platform's device enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevicePresence {
    Device,
    Unauthorized,
    NoPermissions,
    Unknown,
    Offline,
    /// Any other state string; treated as present.
    #[serde(untagged)]
    Other(String),
}

impl DevicePresence {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "device" => DevicePresence::Device,
            "unauthorized" => DevicePresence::Unauthorized,
            "no_permissions" => DevicePresence::NoPermissions,
            "unknown" => DevicePresence::Unknown,
            "offline" => DevicePresence::Offline,
            other => DevicePresence::Other(other.to_string()),
        }
    }

    /// Returns `false` for states that are never part of a present-device set.
    pub fn is_present(&self) -> bool {
        !matches!(
            self,
            DevicePresence::Unauthorized
                | DevicePresence::NoPermissions
                | DevicePresence::Unknown
                | DevicePresence::Offline
        )
    }
}
