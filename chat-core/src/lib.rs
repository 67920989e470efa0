pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod object_store;
pub mod redis;
pub mod schema;
pub mod types;

pub use config::Config;
pub use context::ChatContext;
pub use db::DbPool;
pub use error::ChatError;
pub use object_store::ObjectStore;
pub use redis::RedisPool;
pub use types::{Conversation, ConversationKey, DeviceToken, Message, MessageType, Profile};
