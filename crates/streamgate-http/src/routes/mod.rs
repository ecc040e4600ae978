//! HTTP API route handlers.

pub mod admin;
pub mod messages;
pub mod stream;
pub mod system;
