//! HTTP signaling server and reference viewer page

pub mod handlers;
pub mod server;

pub use server::{router, serve, AppState};
