//! Domain mutations and readers
//!
//! All writers take a plain `&Connection` so they run the same way inside a
//! coordinator transaction or in autocommit mode. Every writer is an upsert
//! guarded by `position`: a row is only replaced by a record whose position
//! is at least the stored one, which makes replaying a batch harmless.
//! Writers return `true` when a row was written and `false` when the record
//! was older than the stored row.

pub mod devices;
pub mod profiles;
pub mod room_state;
pub mod settings;

pub use devices::{active_devices, delete_device, device, upsert_device, DeviceRow};
pub use profiles::{profile, sync_profile, upsert_profile, upsert_sync_profile, ProfileRow};
pub use room_state::{current_room_state, room_state_entry, upsert_room_state, RoomStateRow};
pub use settings::{setting, settings_for_user, upsert_setting, SettingRow};
