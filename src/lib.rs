// Public API for integration tests and potential library usage

pub mod channel;
pub mod config;
pub mod deck;
pub mod host;
pub mod player;
pub mod protocol;
pub mod state;
pub mod sync;
pub mod types;
pub mod ws;
