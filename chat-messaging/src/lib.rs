pub mod content;
pub mod service;

pub use content::{NewMessageInput, ReplySnapshot};
pub use service::{ConversationSummary, LastMessage, MessagePage, MessageService, PublicUser};
