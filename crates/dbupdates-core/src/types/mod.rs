pub mod keys;
pub mod record;

pub use record::{
    DeviceDelete, DeviceUpsert, EventPayload, EventRecord, Position, ProfileUpdate,
    RoomStateUpdate, SettingUpdate, Target,
};
