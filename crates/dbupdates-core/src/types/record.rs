use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-partition sequence number
pub type Position = i64;

/// One unit of an ingested batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Selects the apply routine within the namespace
    pub key: String,

    /// Stream partition the record was read from
    #[serde(default)]
    pub partition: u32,

    /// Monotonic within a partition; also written to the target row
    pub position: Position,

    pub payload: EventPayload,
}

impl EventRecord {
    pub fn new(key: impl Into<String>, position: Position, payload: EventPayload) -> Self {
        Self {
            key: key.into(),
            partition: 0,
            position,
            payload,
        }
    }

    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = partition;
        self
    }
}

/// Change bodies carried by event records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    RoomStateUpdate(RoomStateUpdate),
    ProfileUpdate(ProfileUpdate),
    DeviceUpsert(DeviceUpsert),
    DeviceDelete(DeviceDelete),
    SettingUpdate(SettingUpdate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStateUpdate {
    pub room_id: String,
    pub event_id: String,
    /// Serialized event body, stored verbatim
    pub event_json: String,
    pub event_type: String,
    pub state_key: String,
    #[serde(default)]
    pub membership: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpsert {
    pub user_id: String,
    pub device_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_seen_ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDelete {
    pub user_id: String,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingUpdate {
    pub user_id: String,
    pub setting_key: String,
    pub value: serde_json::Value,
}

impl EventPayload {
    /// Variant name, as it appears in the `kind` tag
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::RoomStateUpdate(_) => "room_state_update",
            EventPayload::ProfileUpdate(_) => "profile_update",
            EventPayload::DeviceUpsert(_) => "device_upsert",
            EventPayload::DeviceDelete(_) => "device_delete",
            EventPayload::SettingUpdate(_) => "setting_update",
        }
    }

    /// Keys of the row this payload mutates, for log context
    pub fn target(&self) -> Target<'_> {
        Target(self)
    }
}

/// Display adapter naming the mutation target of a payload
pub struct Target<'a>(&'a EventPayload);

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            EventPayload::RoomStateUpdate(u) => write!(
                f,
                "room_id={} event_id={} type={} state_key={:?}",
                u.room_id, u.event_id, u.event_type, u.state_key
            ),
            EventPayload::ProfileUpdate(u) => write!(f, "user_id={}", u.user_id),
            EventPayload::DeviceUpsert(u) => {
                write!(f, "user_id={} device_id={}", u.user_id, u.device_id)
            }
            EventPayload::DeviceDelete(u) => {
                write!(f, "user_id={} device_id={}", u.user_id, u.device_id)
            }
            EventPayload::SettingUpdate(u) => {
                write!(f, "user_id={} setting_key={}", u.user_id, u.setting_key)
            }
        }
    }
}
