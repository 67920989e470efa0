pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod websocket;

pub use server::{run, ApiState};
