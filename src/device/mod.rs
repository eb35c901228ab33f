pub mod btle;
pub mod connection;
pub mod constants;
pub mod monitor;
pub mod permission;
pub mod transport;
pub mod types;
