pub mod apply;
pub mod processors;
pub mod room_state;
