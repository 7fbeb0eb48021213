pub mod client;
pub mod config;
pub mod error;
pub mod kv;
pub mod legacy;
pub mod mapping;
pub mod migration;
pub mod rooms;
pub mod state;
pub mod telemetry;
pub mod types;
