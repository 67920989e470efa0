pub mod dispatcher;
pub mod fcm;
pub mod tokens;

pub use dispatcher::{PushDispatcher, PushNotification, PushOutcome};
pub use fcm::{FcmClient, FcmError};
pub use tokens::Platform;
