pub mod events;
pub mod hub;
pub mod presence;

pub use events::RealtimeEvent;
pub use hub::{RealtimeHub, UserFeed};
