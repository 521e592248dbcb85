// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod room;
pub mod types;
pub mod validation;
pub mod ws;
