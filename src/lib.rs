// Public API for the relay binary and integration tests

pub mod config;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod replica;
pub mod state;
pub mod timer;
pub mod transport;
pub mod types;
