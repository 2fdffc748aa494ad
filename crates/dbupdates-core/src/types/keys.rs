//! Event keys: the namespace-scoped tags that select an apply routine

/// Upsert of a room's current state entry
pub const ROOM_STATE_UPDATE: &str = "room-state-update";

/// Display name / avatar change for a user
pub const PROFILE_UPDATE: &str = "profile-update";

/// Device created or refreshed
pub const DEVICE_UPSERT: &str = "device-upsert";

/// Device removed
pub const DEVICE_DELETE: &str = "device-delete";

/// Per-user setting written
pub const SETTING_UPDATE: &str = "setting-update";
